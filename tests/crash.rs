//!Fatal-abort scenarios can't be asserted in-process since the process disappears;
//!each is re-run in a child invocation of this same test binary and the parent asserts
//!the child died abnormally rather than exiting cleanly.

use std::env;
use std::process::Command;

fn run_scenario(name: &str) -> std::process::ExitStatus {
    Command::new(env::current_exe().expect("current_exe"))
        .arg(format!("crash_scenarios::{}", name))
        .arg("--exact")
        .arg("--ignored")
        .arg("--test-threads=1")
        .status()
        .expect("failed to spawn child test process")
}

#[test]
fn unbalanced_semaphore_signal_aborts() {
    let status = run_scenario("unbalanced_semaphore_signal");
    assert!(!status.success());
}

#[test]
fn semaphore_disposed_in_use_aborts() {
    let status = run_scenario("semaphore_disposed_in_use");
    assert!(!status.success());
}

#[test]
fn group_double_leave_aborts() {
    let status = run_scenario("group_double_leave");
    assert!(!status.success());
}

#[test]
fn group_destroyed_while_outstanding_aborts() {
    let status = run_scenario("group_destroyed_while_outstanding");
    assert!(!status.success());
}

mod crash_scenarios {
    use taskwait::{Deadline, Group, Semaphore};

    #[test]
    #[ignore]
    fn unbalanced_semaphore_signal() {
        let _ = env_logger::try_init();
        // A semaphore that starts at isize::MAX can only be signaled exactly once more
        // before the post-increment wraps to isize::MIN, which is the fatal case.
        let sem = Semaphore::new(isize::MAX).unwrap();
        sem.signal();
    }

    #[test]
    #[ignore]
    fn semaphore_disposed_in_use() {
        let _ = env_logger::try_init();
        let sem = Semaphore::new(1).unwrap();
        sem.wait(Deadline::Immediate);
        drop(sem);
    }

    #[test]
    #[ignore]
    fn group_double_leave() {
        let _ = env_logger::try_init();
        let group = Group::new();
        group.enter();
        group.leave();
        group.leave();
    }

    #[test]
    #[ignore]
    fn group_destroyed_while_outstanding() {
        let _ = env_logger::try_init();
        let group = Group::new();
        group.enter();
        drop(group);
    }
}
