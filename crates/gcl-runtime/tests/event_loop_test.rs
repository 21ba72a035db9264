//! Tests for idle handle lifecycle and turn ordering

use std::cell::RefCell;
use std::rc::Rc;

use gcl_runtime::{EventLoop, IdleHandle, LoopConfig, LoopError};

#[test]
fn test_task_runs_on_next_turn() {
    let event_loop = EventLoop::new();
    let ran = Rc::new(RefCell::new(false));

    let flag = Rc::clone(&ran);
    event_loop
        .queue_idle(move || *flag.borrow_mut() = true)
        .unwrap();

    assert!(!*ran.borrow(), "queued task must not run synchronously");
    assert_eq!(event_loop.run_once(), 1);
    assert!(*ran.borrow());
    assert_eq!(event_loop.open_handles(), 0);
}

#[test]
fn test_tasks_run_in_arming_order() {
    let event_loop = EventLoop::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    for i in 0..5 {
        let log = Rc::clone(&log);
        event_loop.queue_idle(move || log.borrow_mut().push(i)).unwrap();
    }

    event_loop.run();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_task_armed_during_turn_waits() {
    let event_loop = EventLoop::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let inner_loop = event_loop.clone();
    let outer_log = Rc::clone(&log);
    event_loop
        .queue_idle(move || {
            outer_log.borrow_mut().push("outer");
            let log = Rc::clone(&outer_log);
            inner_loop
                .queue_idle(move || log.borrow_mut().push("inner"))
                .unwrap();
        })
        .unwrap();

    assert_eq!(event_loop.run_once(), 1);
    assert_eq!(*log.borrow(), vec!["outer"]);
    assert!(event_loop.has_pending_tasks());

    assert_eq!(event_loop.run_once(), 1);
    assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    assert_eq!(event_loop.turn(), 2);
}

#[test]
fn test_handle_handed_back_active() {
    let event_loop = EventLoop::new();
    let observed = Rc::new(RefCell::new(None));

    let handle = event_loop.idle_init().unwrap();
    let probe = event_loop.clone();
    let slot = Rc::clone(&observed);
    handle
        .start(move |mut handle: IdleHandle| {
            let before = probe.active_handles();
            handle.stop().unwrap();
            let after = probe.active_handles();
            handle.close();
            *slot.borrow_mut() = Some((before, after, probe.open_handles()));
        })
        .unwrap();

    assert_eq!(event_loop.active_handles(), 1);
    event_loop.run();
    assert_eq!(*observed.borrow(), Some((1, 0, 0)));
}

#[test]
fn test_stop_twice_is_noop() {
    let event_loop = EventLoop::new();
    let mut handle = event_loop.idle_init().unwrap();
    assert_eq!(handle.stop(), Ok(()));
    assert_eq!(handle.stop(), Ok(()));
    handle.close();
}

#[test]
fn test_handle_limit_frees_on_close() {
    let event_loop = EventLoop::with_config(LoopConfig {
        max_handles: Some(2),
    });

    let a = event_loop.idle_init().unwrap();
    let _b = event_loop.idle_init().unwrap();
    assert_eq!(
        event_loop.idle_init().err(),
        Some(LoopError::HandleLimit { limit: 2 })
    );

    a.close();
    assert!(event_loop.idle_init().is_ok());
}

#[test]
fn test_stats() {
    let event_loop = EventLoop::new();
    for _ in 0..3 {
        event_loop.queue_idle(|| {}).unwrap();
    }
    assert_eq!(event_loop.run(), 3);

    let stats = event_loop.stats();
    assert_eq!(stats.tasks_run, 3);
    assert_eq!(stats.handles_opened, 3);
    assert_eq!(stats.handles_closed, 3);
    assert_eq!(stats.turns, 1);
}

#[test]
fn test_run_on_empty_loop() {
    let event_loop = EventLoop::new();
    assert_eq!(event_loop.run(), 0);
    assert_eq!(event_loop.turn(), 0);
}
