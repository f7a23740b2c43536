// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Cycle-machine tests for [`TriggeredCyclicExec`], single-stepped through the
//! scripted trigger.

use super::{Harness, TraceEvent};
use crate::cyclic::{ExecError, ExecState, PllProbe, StopReason, TriggerEvent,
                    TriggeredCyclicExec};
use pretty_assertions::assert_eq;
use std::sync::{Arc,
                atomic::{AtomicBool, Ordering}};

use crate::cyclic::ExecState::{Running, Starting, Stopped, WaitLock};
use crate::cyclic::StopReason::{None as NoReason, PllLossOfLock, RequestStop,
                                SampleReturnedFalse, TriggerTimeout};
use self::TraceEvent::{OnStart, OnStop, Sample, StateChange};

fn pll_probe(flag: &Arc<AtomicBool>) -> Option<PllProbe> {
    let flag = Arc::clone(flag);
    Some(Box::new(move || flag.load(Ordering::SeqCst)))
}

/// A full normal episode: start, two samples, requested stop. Callback order is
/// the contract.
#[test]
fn normal_episode_produces_the_canonical_callback_sequence() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.step(TriggerEvent::Signaled); // stopped -> starting
    h.step(TriggerEvent::Signaled); // starting -> wait-lock
    h.step(TriggerEvent::Signaled); // wait-lock -> running (+ on_start)
    h.step(TriggerEvent::Signaled); // sample
    h.step(TriggerEvent::Signaled); // sample
    h.exec.request_stop_sampling().unwrap();
    h.step(TriggerEvent::Signaled); // running -> stopped (on_stop first)

    assert_eq!(
        h.snapshot(),
        vec![
            StateChange(Starting, NoReason),
            StateChange(WaitLock, NoReason),
            StateChange(Running, NoReason),
            OnStart,
            Sample { overrun: false },
            Sample { overrun: false },
            OnStop,
            StateChange(Stopped, RequestStop),
        ]
    );
    // Housekeeping ran after every iteration, samples and transitions alike.
    assert_eq!(*h.cyclic_calls.lock().unwrap(), 6);
    assert_eq!(h.exec.current_state(), Stopped);
}

#[test]
fn start_delay_keeps_the_machine_in_starting_for_extra_cycles() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(2).unwrap();
    h.step(TriggerEvent::Signaled); // stopped -> starting
    assert_eq!(h.exec.current_state(), Starting);
    h.step(TriggerEvent::Signaled); // burn extra cycle 1
    assert_eq!(h.exec.current_state(), Starting);
    h.step(TriggerEvent::Signaled); // burn extra cycle 2
    assert_eq!(h.exec.current_state(), Starting);
    h.step(TriggerEvent::Signaled); // -> wait-lock
    assert_eq!(h.exec.current_state(), WaitLock);
}

#[test]
fn trigger_timeout_in_wait_lock_stops_without_on_stop() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.step(TriggerEvent::Signaled);
    h.step(TriggerEvent::Signaled); // -> wait-lock
    h.step(TriggerEvent::Timeout);

    assert_eq!(
        h.snapshot(),
        vec![
            StateChange(Starting, NoReason),
            StateChange(WaitLock, NoReason),
            StateChange(Stopped, TriggerTimeout),
        ]
    );
}

#[test]
fn trigger_timeout_while_running_ends_the_episode_with_on_stop() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);
    h.step(TriggerEvent::Timeout);

    let trace = h.snapshot();
    assert_eq!(
        &trace[trace.len() - 2..],
        &[OnStop, StateChange(Stopped, TriggerTimeout)]
    );
}

#[test]
fn already_signaled_trigger_reports_an_overrun_to_sample() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);
    h.step(TriggerEvent::AlreadySignaled);

    assert_eq!(h.snapshot().last(), Some(&Sample { overrun: true }));
}

#[test]
fn wait_lock_lingers_until_the_pll_locks() {
    let locked = Arc::new(AtomicBool::new(false));
    let h = Harness::new(pll_probe(&locked));
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.step(TriggerEvent::Signaled); // -> starting
    h.step(TriggerEvent::Signaled); // -> wait-lock
    h.step(TriggerEvent::Signaled); // unlocked: stays
    h.step(TriggerEvent::Signaled); // unlocked: stays
    assert_eq!(h.exec.current_state(), WaitLock);

    locked.store(true, Ordering::SeqCst);
    h.step(TriggerEvent::Signaled); // -> running

    let trace = h.snapshot();
    assert_eq!(
        &trace[trace.len() - 2..],
        &[StateChange(Running, NoReason), OnStart]
    );
}

#[test]
fn pll_loss_of_lock_while_running_stops_the_episode() {
    let locked = Arc::new(AtomicBool::new(true));
    let h = Harness::new(pll_probe(&locked));
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);

    locked.store(false, Ordering::SeqCst);
    h.step(TriggerEvent::Signaled);

    let trace = h.snapshot();
    assert_eq!(
        &trace[trace.len() - 2..],
        &[OnStop, StateChange(Stopped, PllLossOfLock)]
    );
}

#[test]
fn sample_returning_false_stops_the_episode() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);
    h.script_sample_false();
    h.step(TriggerEvent::Signaled);

    let trace = h.snapshot();
    assert_eq!(
        &trace[trace.len() - 3..],
        &[
            Sample { overrun: false },
            OnStop,
            StateChange(Stopped, SampleReturnedFalse),
        ]
    );
}

#[test]
fn pending_stop_in_stopped_state_is_confirmed() {
    let h = Harness::new(None);
    h.spawn(None);

    // Stop requested while already stopped: the machine consumes the flag and
    // still reports the (idempotent) stop. This is the second notification in
    // the autonomous-stop race.
    h.exec.request_stop_sampling().unwrap();
    h.step(TriggerEvent::Signaled);

    assert_eq!(h.snapshot(), vec![StateChange(Stopped, RequestStop)]);
}

#[test]
fn start_request_requires_the_stopped_state() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);

    assert!(matches!(
        h.exec.request_start_sampling(0),
        Err(ExecError::NotStopped)
    ));
}

#[test]
fn pending_requests_reject_duplicates_and_stop_cancels_start() {
    // No thread spawned: the flags stay pending and are directly observable.
    let h = Harness::new(None);

    h.exec.request_start_sampling(0).unwrap();
    assert!(matches!(
        h.exec.request_start_sampling(0),
        Err(ExecError::RequestAlreadyPending)
    ));

    // A stop request is accepted and withdraws the pending start...
    h.exec.request_stop_sampling().unwrap();
    // ...after which another stop is a duplicate.
    assert!(matches!(
        h.exec.request_stop_sampling(),
        Err(ExecError::RequestAlreadyPending)
    ));
}

#[test]
fn second_thread_start_is_rejected() {
    let h = Harness::new(None);
    h.spawn(None);

    struct NopHandler;
    impl crate::cyclic::CyclicHandler for NopHandler {
        fn sample(&mut self, _overrun: bool) -> bool { true }
    }

    assert!(matches!(
        h.exec.start_thread("cyclic-second", None, NopHandler),
        Err(ExecError::ThreadAlreadyStarted)
    ));
}

#[test]
fn stop_thread_joins_cleanly_from_the_stopped_state() {
    let h = Harness::new(None);
    h.spawn(None);

    h.exec.request_start_sampling(0).unwrap();
    h.drive_until(Running);
    h.exec.request_stop_sampling().unwrap();
    h.step(TriggerEvent::Signaled); // graceful episode end

    // Teardown from stopped: joining must add no further episode callbacks.
    let before = h.snapshot();
    h.trigger.release();
    h.exec.stop_thread();
    let after = h.snapshot();

    let on_stops = |t: &[TraceEvent]| t.iter().filter(|e| **e == OnStop).count();
    assert_eq!(on_stops(&before), on_stops(&after));
}

#[test]
fn drop_joins_the_executor_thread() {
    let h = Harness::new(None);
    h.spawn(None);
    h.exec.request_start_sampling(0).unwrap();
    h.step(TriggerEvent::Signaled);

    // Harness drop releases the trigger; the exec's own drop joins the thread.
    drop(h);
}

#[test]
fn executor_without_thread_reports_stopped() {
    let exec = TriggeredCyclicExec::new(
        Arc::new(super::ScriptedTrigger::new()),
        std::time::Duration::from_secs(1),
        None,
    );
    assert_eq!(exec.current_state(), Stopped);
    exec.stop_thread(); // no-op
}
