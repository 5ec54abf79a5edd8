use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskwait::{Deadline, Semaphore, WaitResult};

#[test]
fn negative_initial_value_rejected() {
    assert!(Semaphore::new(-1).is_none());
    assert!(Semaphore::new(isize::MIN).is_none());
}

#[test]
fn zero_value_blocks_until_signaled() {
    let sem = Arc::new(Semaphore::new(0).unwrap());
    let sem2 = Arc::clone(&sem);

    let waiter = thread::spawn(move || sem2.wait(Deadline::Forever));

    thread::sleep(Duration::from_millis(30));
    sem.signal();

    assert_eq!(waiter.join().unwrap(), WaitResult::Signaled);
}

#[test]
fn immediate_wait_on_empty_semaphore_times_out() {
    let sem = Semaphore::new(0).unwrap();
    assert_eq!(sem.wait(Deadline::Immediate), WaitResult::TimedOut);
}

#[test]
fn timed_wait_expires_when_never_signaled() {
    let sem = Semaphore::new(0).unwrap();
    let result = sem.wait(Deadline::after(Duration::from_millis(60)));
    assert_eq!(result, WaitResult::TimedOut);
}

#[test]
fn timed_wait_succeeds_when_signaled_before_deadline() {
    let sem = Arc::new(Semaphore::new(0).unwrap());
    let sem2 = Arc::clone(&sem);

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        sem2.signal();
    });

    let result = sem.wait(Deadline::after(Duration::from_secs(2)));
    assert_eq!(result, WaitResult::Signaled);
}

#[test]
fn many_signals_allow_many_waits() {
    let sem = Semaphore::new(0).unwrap();
    for _ in 0..5 {
        sem.signal();
    }
    for _ in 0..5 {
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
    }
    assert_eq!(sem.wait(Deadline::Immediate), WaitResult::TimedOut);
}

#[test]
fn acts_as_a_bounded_resource_pool() {
    const PERMITS: usize = 3;
    let sem = Arc::new(Semaphore::new(PERMITS as isize).unwrap());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let sem = Arc::clone(&sem);
            let in_flight = Arc::clone(&in_flight);
            let max_observed = Arc::clone(&max_observed);
            thread::spawn(move || {
                sem.wait(Deadline::Forever);
                let cur = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(cur, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                sem.signal();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(max_observed.load(Ordering::SeqCst) <= PERMITS);
}

#[test]
fn dispose_after_balanced_use_does_not_abort() {
    let sem = Semaphore::new(1).unwrap();
    sem.wait(Deadline::Immediate);
    sem.signal();
    sem.dispose();
}
