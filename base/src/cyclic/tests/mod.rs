// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Deterministic test rig for the cyclic executor and its controller.
//!
//! No timing assumptions anywhere: a [`ScriptedTrigger`] hands the executor one
//! [`TriggerEvent`] per iteration, and the handler's `cyclic` callback posts a
//! semaphore after every iteration, so tests single-step the cycle machine.

mod executor_tests;

use super::{CyclicHandler, ExecState, PllProbe, StartStopCtrl, StopReason,
            TriggerEvent, TriggerSource, TriggeredCyclicExec};
use crate::sync::Semaphore;
use std::{collections::VecDeque,
          sync::{Arc, Condvar, Mutex},
          time::{Duration, Instant}};

/// Trigger double: blocks the executor until the test delivers the next event.
///
/// `release()` flips it into always-timeout mode so executor threads can be
/// joined at teardown without a feeder.
pub struct ScriptedTrigger {
    script: Mutex<(VecDeque<TriggerEvent>, bool)>,
    cv: Condvar,
}

impl ScriptedTrigger {
    pub fn new() -> Self {
        Self {
            script: Mutex::new((VecDeque::new(), false)),
            cv: Condvar::new(),
        }
    }

    /// Hands the executor exactly one wake-up result.
    pub fn deliver(&self, event: TriggerEvent) {
        let mut script = self.script.lock().unwrap();
        script.0.push_back(event);
        self.cv.notify_all();
    }

    /// Makes every further wait return [`TriggerEvent::Timeout`] immediately.
    pub fn release(&self) {
        let mut script = self.script.lock().unwrap();
        script.1 = true;
        self.cv.notify_all();
    }
}

impl TriggerSource for ScriptedTrigger {
    fn wait(&self) {
        // The executor only uses the timed wait.
        let _ = self.wait_timeout(Duration::from_secs(3600));
    }

    fn wait_timeout(&self, _timeout: Duration) -> TriggerEvent {
        let mut script = self.script.lock().unwrap();
        loop {
            if let Some(event) = script.0.pop_front() {
                return event;
            }
            if script.1 {
                return TriggerEvent::Timeout;
            }
            script = self.cv.wait(script).unwrap();
        }
    }
}

/// Everything observable about one executor episode, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    StateChange(ExecState, StopReason),
    OnStart,
    OnStop,
    Sample { overrun: bool },
}

/// Recording handler; optionally forwards state changes to a controller the way
/// a production handler would.
pub struct TraceHandler {
    pub trace: Arc<Mutex<Vec<TraceEvent>>>,
    pub iteration: Arc<Semaphore>,
    pub cyclic_calls: Arc<Mutex<u32>>,
    /// Scripted return values for `sample`; empty means `true`.
    pub sample_results: Arc<Mutex<VecDeque<bool>>>,
    pub ctrl: Option<Arc<StartStopCtrl>>,
}

impl CyclicHandler for TraceHandler {
    fn sample(&mut self, overrun: bool) -> bool {
        self.trace.lock().unwrap().push(TraceEvent::Sample { overrun });
        self.sample_results.lock().unwrap().pop_front().unwrap_or(true)
    }

    fn cyclic(&mut self) {
        *self.cyclic_calls.lock().unwrap() += 1;
        self.iteration.post();
    }

    fn on_start(&mut self) { self.trace.lock().unwrap().push(TraceEvent::OnStart); }

    fn on_stop(&mut self) { self.trace.lock().unwrap().push(TraceEvent::OnStop); }

    fn on_state_change(&mut self, new_state: ExecState, reason: StopReason) {
        self.trace
            .lock()
            .unwrap()
            .push(TraceEvent::StateChange(new_state, reason));
        if let Some(ctrl) = &self.ctrl {
            ctrl.on_exec_state_change(new_state, reason);
        }
    }
}

/// Executor + scripted trigger + trace, wired and single-steppable.
pub struct Harness {
    pub trigger: Arc<ScriptedTrigger>,
    pub exec: Arc<TriggeredCyclicExec>,
    pub trace: Arc<Mutex<Vec<TraceEvent>>>,
    pub iteration: Arc<Semaphore>,
    pub cyclic_calls: Arc<Mutex<u32>>,
    pub sample_results: Arc<Mutex<VecDeque<bool>>>,
}

impl Harness {
    pub fn new(is_pll_locked: Option<PllProbe>) -> Self {
        let trigger = Arc::new(ScriptedTrigger::new());
        let exec = Arc::new(TriggeredCyclicExec::new(
            Arc::clone(&trigger) as Arc<dyn TriggerSource>,
            Duration::from_secs(3600),
            is_pll_locked,
        ));
        Self {
            trigger,
            exec,
            trace: Arc::default(),
            iteration: Arc::new(Semaphore::new(0)),
            cyclic_calls: Arc::default(),
            sample_results: Arc::default(),
        }
    }

    /// Spawns the executor thread with a [`TraceHandler`], optionally wired to a
    /// controller.
    pub fn spawn(&self, ctrl: Option<Arc<StartStopCtrl>>) {
        let handler = TraceHandler {
            trace: Arc::clone(&self.trace),
            iteration: Arc::clone(&self.iteration),
            cyclic_calls: Arc::clone(&self.cyclic_calls),
            sample_results: Arc::clone(&self.sample_results),
            ctrl,
        };
        self.exec.start_thread("cyclic-test", None, handler).unwrap();
    }

    /// Delivers one trigger event and waits for the iteration to complete.
    pub fn step(&self, event: TriggerEvent) {
        self.trigger.deliver(event);
        self.iteration.wait();
    }

    /// Single-steps with `Signaled` events until the machine reports `target`.
    pub fn drive_until(&self, target: ExecState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.exec.current_state() != target {
            assert!(
                Instant::now() < deadline,
                "executor never reached {target:?}, trace: {:?}",
                self.snapshot()
            );
            self.step(TriggerEvent::Signaled);
        }
    }

    pub fn snapshot(&self) -> Vec<TraceEvent> { self.trace.lock().unwrap().clone() }

    /// Queues `false` as the next `sample` return value.
    pub fn script_sample_false(&self) {
        self.sample_results.lock().unwrap().push_back(false);
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        // Unblock the executor thread so the exec's drop can join it.
        self.trigger.release();
    }
}
