use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskwait::{Deadline, Group, InlineQueue, WaitResult};

#[test]
fn new_group_is_immediately_quiescent() {
    let group = Group::new();
    assert_eq!(group.wait(Deadline::Immediate), WaitResult::Signaled);
}

#[test]
fn single_entry_blocks_wait_until_leave() {
    let group = Arc::new(Group::new());
    group.enter();

    let g2 = Arc::clone(&group);
    let waiter = thread::spawn(move || g2.wait(Deadline::Forever));

    thread::sleep(Duration::from_millis(30));
    assert!(!waiter.is_finished());

    group.leave();
    assert_eq!(waiter.join().unwrap(), WaitResult::Signaled);
}

#[test]
fn wait_only_returns_once_every_entry_has_left() {
    const WORKERS: usize = 8;
    let group = Arc::new(Group::new());
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..WORKERS {
        group.enter();
    }

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let group = Arc::clone(&group);
            let completed = Arc::clone(&completed);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                completed.fetch_add(1, Ordering::SeqCst);
                group.leave();
            })
        })
        .collect();

    assert_eq!(group.wait(Deadline::Forever), WaitResult::Signaled);
    assert_eq!(completed.load(Ordering::SeqCst), WORKERS);

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn immediate_wait_with_outstanding_work_times_out() {
    let group = Group::new();
    group.enter();
    assert_eq!(group.wait(Deadline::Immediate), WaitResult::TimedOut);
    group.leave();
}

#[test]
fn timed_wait_expires_before_leave() {
    let group = Group::new();
    group.enter();
    let result = group.wait(Deadline::after(Duration::from_millis(50)));
    assert_eq!(result, WaitResult::TimedOut);
    group.leave();
}

#[test]
fn notify_fires_once_group_drains() {
    let group = Arc::new(Group::new());
    group.enter();
    group.enter();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);
    group.notify(
        Box::new(InlineQueue),
        Box::new(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        }),
    );

    group.leave();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    group.leave();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn multiple_notifications_all_fire() {
    let group = Arc::new(Group::new());
    group.enter();

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let fired = Arc::clone(&fired);
        group.notify(
            Box::new(InlineQueue),
            Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    group.leave();
    assert_eq!(fired.load(Ordering::SeqCst), 5);
}
