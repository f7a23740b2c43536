// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words PLL

//! The cyclic executor: [`TriggeredCyclicExec`], [`CyclicHandler`], [`ExecError`].

use super::{ExecState, StopReason, TriggerEvent, TriggerSource};
use crate::sync::{CancelToken, SpawnError, WorkerThread, abort_on_panic};
use std::{sync::{Arc, Mutex},
          time::Duration};

/// Predicate reporting whether the PLL driving the trigger is locked.
pub type PllProbe = Box<dyn Fn() -> bool + Send + Sync>;

/// The capability record a [`TriggeredCyclicExec`] drives - your domain logic.
///
/// The handler moves onto the executor thread and is owned exclusively by it, so
/// `&mut self` everywhere and no `Sync` bound. All callbacks are contractually
/// no-panic (a panic is fatal, see [`abort_on_panic`](crate::sync::abort_on_panic)).
///
/// Callback contract per running episode:
///
/// - [`on_start()`] exactly once, immediately after entering `running`;
/// - [`sample()`] once per trigger received while `running`;
/// - [`on_stop()`] exactly once, immediately before leaving `running`;
/// - [`on_state_change()`] after the state variable was updated - when *leaving*
///   `running` it comes after [`on_stop()`], when *entering* `running` it comes
///   before [`on_start()`];
/// - [`cyclic()`] after every iteration, in every state - including trigger
///   timeouts. Use it for low-priority housekeeping unrelated to the sample.
///
/// [`cyclic()`]: Self::cyclic
/// [`on_start()`]: Self::on_start
/// [`on_state_change()`]: Self::on_state_change
/// [`on_stop()`]: Self::on_stop
/// [`sample()`]: Self::sample
pub trait CyclicHandler: Send + 'static {
    /// One cyclic sample. `overrun` is set when the trigger had already fired
    /// before the executor was ready for it (the previous cycle ran long).
    ///
    /// # Returns
    ///
    /// `false` to stop sampling (reported as
    /// [`StopReason::SampleReturnedFalse`]).
    fn sample(&mut self, overrun: bool) -> bool;

    /// Low-priority housekeeping hook, invoked after every iteration.
    fn cyclic(&mut self) {}

    /// Entered the `running` state; sampling is about to begin.
    fn on_start(&mut self) {}

    /// About to leave the `running` state; sampling has ended.
    fn on_stop(&mut self) {}

    /// The cycle machine changed state. `reason` is meaningful for transitions to
    /// [`ExecState::Stopped`] and [`StopReason::None`] otherwise.
    fn on_state_change(&mut self, new_state: ExecState, reason: StopReason) {
        let _ = (new_state, reason);
    }
}

/// Failures of [`TriggeredCyclicExec`] requests.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExecError {
    /// Sampling can only be requested while the cycle machine is stopped.
    #[error("Start of sampling requires the stopped state")]
    #[diagnostic(code(r3bl_base::cyclic::not_stopped))]
    NotStopped,

    /// A start or stop request is already pending and not yet consumed by the
    /// executor thread.
    #[error("A start/stop request is already pending")]
    #[diagnostic(code(r3bl_base::cyclic::request_pending))]
    RequestAlreadyPending,

    /// [`TriggeredCyclicExec::start_thread`] while the thread is already running.
    #[error("The executor thread is already running")]
    #[diagnostic(code(r3bl_base::cyclic::thread_already_started))]
    ThreadAlreadyStarted,

    /// Thread creation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spawn(#[from] SpawnError),
}

/// Asynchronous request flags plus the cycle machine's state variable.
#[derive(Debug)]
struct ExecControl {
    state: ExecState,
    start_requested: bool,
    stop_requested: bool,
    start_delay_cnt: u8,
}

/// Trigger-side configuration and cycle-machine state shared with the thread.
struct ExecShared {
    trigger: Arc<dyn TriggerSource>,
    timeout: Duration,
    is_pll_locked: Option<PllProbe>,
    control: Mutex<ExecControl>,
}

impl std::fmt::Debug for ExecShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecShared")
            .field("timeout", &self.timeout)
            .field("has_pll_probe", &self.is_pll_locked.is_some())
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

/// What an iteration decided to do after the state mutex was released.
enum Outcome {
    Nothing,
    Notify(ExecState, StopReason),
    /// Entering `running`: notify, then `on_start`.
    NotifyThenStart,
    /// Leaving `running`: `on_stop`, then notify.
    StopThenNotify(StopReason),
    Sample { overrun: bool },
}

/// A thread that calls your [`CyclicHandler`]'s sample function on every trigger.
///
/// # Cycle machine
///
/// Each iteration waits on the [`TriggerSource`] (bounded by the trigger timeout),
/// then advances the machine exactly once:
///
/// | State      | Condition                         | Next      | Reported                 |
/// | :--------- | :-------------------------------- | :-------- | :----------------------- |
/// | `stopped`  | stop requested                    | `stopped` | `request-stop`           |
/// | `stopped`  | start requested                   | `starting`| -                        |
/// | `starting` | stop requested                    | `stopped` | `request-stop`           |
/// | `starting` | start-delay cycles burned         | `wait-lock`| -                       |
/// | `wait-lock`| trigger timeout                   | `stopped` | `trigger-timeout`        |
/// | `wait-lock`| stop requested                    | `stopped` | `request-stop`           |
/// | `wait-lock`| PLL locked (or no probe)          | `running` | - (`on_start` follows)   |
/// | `running`  | trigger timeout                   | `stopped` | `trigger-timeout`        |
/// | `running`  | PLL lost lock                     | `stopped` | `pll-loss-of-lock`       |
/// | `running`  | stop requested                    | `stopped` | `request-stop`           |
/// | `running`  | `sample()` returned `false`       | `stopped` | `sample-returned-false`  |
///
/// # Thread lifecycle
///
/// [`start_thread()`] spawns the thread (this does not start sampling);
/// [`request_start_sampling()`] / [`request_stop_sampling()`] drive the machine.
/// [`stop_thread()`] cancels cooperatively and joins: the thread notices the flag
/// at the next iteration boundary, so joining takes at most one trigger timeout.
/// Cancellation does **not** call `on_stop` - it is a teardown, not an episode end.
/// Dropping the executor stops the thread the same way.
///
/// [`request_start_sampling()`]: Self::request_start_sampling
/// [`request_stop_sampling()`]: Self::request_stop_sampling
/// [`start_thread()`]: Self::start_thread
/// [`stop_thread()`]: Self::stop_thread
#[derive(Debug)]
pub struct TriggeredCyclicExec {
    shared: Arc<ExecShared>,
    worker: Mutex<Option<WorkerThread>>,
}

impl TriggeredCyclicExec {
    /// Creates the executor in the stopped state, without a thread.
    ///
    /// `timeout` bounds each trigger wait and should be the expected trigger
    /// period plus a safety margin. `is_pll_locked` is optional; without it the
    /// `wait-lock` state passes through on the first trigger.
    #[must_use]
    pub fn new(
        trigger: Arc<dyn TriggerSource>,
        timeout: Duration,
        is_pll_locked: Option<PllProbe>,
    ) -> Self {
        Self {
            shared: Arc::new(ExecShared {
                trigger,
                timeout,
                is_pll_locked,
                control: Mutex::new(ExecControl {
                    state: ExecState::Stopped,
                    start_requested: false,
                    stop_requested: false,
                    start_delay_cnt: 0,
                }),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the executor thread. Sampling does not start yet - request it via
    /// [`request_start_sampling()`](Self::request_start_sampling).
    ///
    /// # Errors
    ///
    /// [`ExecError::ThreadAlreadyStarted`] or [`ExecError::Spawn`].
    pub fn start_thread<H: CyclicHandler>(
        &self,
        thread_name: &str,
        stack_size: Option<usize>,
        handler: H,
    ) -> Result<(), ExecError> {
        let mut worker = self.worker.lock().expect("executor worker slot poisoned");
        if worker.is_some() {
            return Err(ExecError::ThreadAlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let mut handler = handler;
        *worker = Some(WorkerThread::spawn(thread_name, stack_size, move |cancel| {
            thread_loop(&shared, &cancel, &mut handler);
        })?);
        Ok(())
    }

    /// Cancels the executor thread cooperatively and joins it. No-op without a
    /// thread. Sampling is *not* wound down gracefully - use
    /// [`request_stop_sampling()`](Self::request_stop_sampling) first if the
    /// handler must see `on_stop`.
    pub fn stop_thread(&self) {
        let worker = self
            .worker
            .lock()
            .expect("executor worker slot poisoned")
            .take();
        if let Some(worker) = worker {
            worker.cancel_and_join();
        }
    }

    /// Requests start of sampling. The executor thread picks the request up at
    /// its next iteration.
    ///
    /// `start_delay` is the number of *extra* cycles to linger in `starting`
    /// before moving on to `wait-lock` (zero = one cycle in `starting`).
    ///
    /// # Errors
    ///
    /// [`ExecError::NotStopped`] unless the machine is stopped;
    /// [`ExecError::RequestAlreadyPending`] if a start or stop request is pending.
    pub fn request_start_sampling(&self, start_delay: u8) -> Result<(), ExecError> {
        let mut control = self.lock_control();

        if control.state != ExecState::Stopped {
            return Err(ExecError::NotStopped);
        }
        if control.start_requested || control.stop_requested {
            return Err(ExecError::RequestAlreadyPending);
        }

        control.start_requested = true;
        control.start_delay_cnt = start_delay;
        Ok(())
    }

    /// Requests stop of sampling, withdrawing any pending start request.
    ///
    /// # Errors
    ///
    /// [`ExecError::RequestAlreadyPending`] if a stop request is already pending.
    pub fn request_stop_sampling(&self) -> Result<(), ExecError> {
        let mut control = self.lock_control();

        if control.stop_requested {
            return Err(ExecError::RequestAlreadyPending);
        }

        control.stop_requested = true;
        control.start_requested = false;
        Ok(())
    }

    /// Current state of the cycle machine.
    #[must_use]
    pub fn current_state(&self) -> ExecState { self.lock_control().state }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, ExecControl> {
        self.shared
            .control
            .lock()
            .expect("TriggeredCyclicExec mutex poisoned")
    }
}

impl Drop for TriggeredCyclicExec {
    fn drop(&mut self) { self.stop_thread(); }
}

/// The executor thread: wait for the trigger, advance the machine, run callbacks
/// with the mutex released, and call `cyclic` at the end of every iteration.
fn thread_loop<H: CyclicHandler>(shared: &ExecShared, cancel: &CancelToken, handler: &mut H) {
    // Always start out stopped; requests accepted before the thread ran are kept.
    {
        let mut control = shared.control.lock().expect("TriggeredCyclicExec mutex poisoned");
        control.state = ExecState::Stopped;
    }

    while !cancel.is_cancellation_pending() {
        let event = shared.trigger.wait_timeout(shared.timeout);
        // The trigger wait doubles as the cancellation point: a cancellation that
        // arrived during the wait exits before the iteration body (no on_stop).
        if cancel.is_cancellation_pending() {
            break;
        }
        let overrun = event == TriggerEvent::AlreadySignaled;
        let timed_out = event == TriggerEvent::Timeout;

        let outcome = {
            let mut control = shared
                .control
                .lock()
                .expect("TriggeredCyclicExec mutex poisoned");

            match control.state {
                ExecState::Stopped => {
                    if control.stop_requested {
                        control.stop_requested = false;
                        Outcome::Notify(ExecState::Stopped, StopReason::RequestStop)
                    } else if control.start_requested {
                        control.start_requested = false;
                        control.state = ExecState::Starting;
                        Outcome::Notify(ExecState::Starting, StopReason::None)
                    } else {
                        Outcome::Nothing
                    }
                }

                ExecState::Starting => {
                    if control.stop_requested {
                        control.stop_requested = false;
                        control.state = ExecState::Stopped;
                        Outcome::Notify(ExecState::Stopped, StopReason::RequestStop)
                    } else if control.start_delay_cnt == 0 {
                        control.state = ExecState::WaitLock;
                        Outcome::Notify(ExecState::WaitLock, StopReason::None)
                    } else {
                        control.start_delay_cnt -= 1;
                        Outcome::Nothing
                    }
                }

                ExecState::WaitLock => {
                    if timed_out {
                        control.state = ExecState::Stopped;
                        Outcome::Notify(ExecState::Stopped, StopReason::TriggerTimeout)
                    } else if control.stop_requested {
                        control.stop_requested = false;
                        control.state = ExecState::Stopped;
                        Outcome::Notify(ExecState::Stopped, StopReason::RequestStop)
                    } else if shared.is_pll_locked.as_ref().is_none_or(|probe| probe()) {
                        control.state = ExecState::Running;
                        Outcome::NotifyThenStart
                    } else {
                        Outcome::Nothing
                    }
                }

                ExecState::Running => {
                    if timed_out {
                        control.state = ExecState::Stopped;
                        Outcome::StopThenNotify(StopReason::TriggerTimeout)
                    } else if shared.is_pll_locked.as_ref().is_some_and(|probe| !probe()) {
                        control.state = ExecState::Stopped;
                        Outcome::StopThenNotify(StopReason::PllLossOfLock)
                    } else if control.stop_requested {
                        control.stop_requested = false;
                        control.state = ExecState::Stopped;
                        Outcome::StopThenNotify(StopReason::RequestStop)
                    } else {
                        Outcome::Sample { overrun }
                    }
                }
            }
        };

        match outcome {
            Outcome::Nothing => {}

            Outcome::Notify(new_state, reason) => {
                abort_on_panic("cyclic on_state_change callback", || {
                    handler.on_state_change(new_state, reason);
                });
            }

            Outcome::NotifyThenStart => {
                abort_on_panic("cyclic on_state_change callback", || {
                    handler.on_state_change(ExecState::Running, StopReason::None);
                });
                abort_on_panic("cyclic on_start callback", || handler.on_start());
            }

            Outcome::StopThenNotify(reason) => {
                abort_on_panic("cyclic on_stop callback", || handler.on_stop());
                abort_on_panic("cyclic on_state_change callback", || {
                    handler.on_state_change(ExecState::Stopped, reason);
                });
            }

            Outcome::Sample { overrun } => {
                let keep_running =
                    abort_on_panic("cyclic sample callback", || handler.sample(overrun));
                if !keep_running {
                    {
                        let mut control = shared
                            .control
                            .lock()
                            .expect("TriggeredCyclicExec mutex poisoned");
                        control.state = ExecState::Stopped;
                    }
                    abort_on_panic("cyclic on_stop callback", || handler.on_stop());
                    abort_on_panic("cyclic on_state_change callback", || {
                        handler.on_state_change(
                            ExecState::Stopped,
                            StopReason::SampleReturnedFalse,
                        );
                    });
                }
            }
        }

        abort_on_panic("cyclic housekeeping callback", || handler.cyclic());
    }
}
