// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words PLL

//! The start/stop supervisor of a cyclic executor: [`StartStopCtrl`],
//! [`ControllerHooks`].

use super::{ExecState, StopReason, TriggeredCyclicExec};
use crate::{sync::abort_on_panic,
            work_queue::{DeferredWorkQueue, OwnerId, QueueError, WorkPackage}};
use std::sync::{Arc, Condvar, Mutex};
use strum_macros::Display;

/// Maximum number of start-locks that can be held at once.
pub const MAX_START_LOCKS: u8 = u8::MAX;

/// States of a [`StartStopCtrl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CtrlState {
    /// The managed executor is stopped.
    Stopped,
    /// Start forwarded to the executor; waiting for it to report `running`.
    Starting,
    /// The executor reported `running`.
    Running,
    /// A stop request is on its way to the executor.
    StopPending,
    /// The executor stopped *by itself* while a stop request was in flight; the
    /// confirmation of the requested stop is still expected.
    StoppedStopPending,
}

/// Outcome of [`StartStopCtrl::start_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResult {
    /// Start forwarded to the executor.
    Ok,
    /// Rejected: at least one start-lock is held.
    Locked,
    /// Rejected: already starting.
    AlreadyStarted,
    /// Rejected: already running.
    AlreadyRunning,
    /// Rejected: a stop is in flight.
    AlreadyStopping,
}

/// Outcome of [`StartStopCtrl::stop_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Stop forwarded to the executor.
    Ok,
    /// Rejected: a stop is already in flight.
    AlreadyStopping,
    /// Rejected: already stopped.
    AlreadyStopped,
}

/// Notification hooks of a [`StartStopCtrl`].
///
/// Hooks run either on the work-queue thread (state-change driven ones) or on the
/// thread calling [`start_async`]/[`stop_async`] (the immediate ones) - but never
/// concurrently for one controller: a dedicated hook mutex serializes them. The
/// controller's state mutex is never held while a hook runs, so hooks may call
/// back into the controller's query methods.
///
/// All hooks are contractually no-panic; a panic is fatal.
///
/// [`start_async`]: StartStopCtrl::start_async
/// [`stop_async`]: StartStopCtrl::stop_async
pub trait ControllerHooks: Send + 'static {
    /// About to restart automatically after PLL loss of lock (budget permitting).
    /// No [`on_stopped`](Self::on_stopped) fires for that loss.
    ///
    /// # Returns
    ///
    /// Number of extra cycles the executor shall linger in `starting` before
    /// moving to `wait-lock` on this restart.
    fn on_before_restart(&mut self) -> u8 { 0 }

    /// Entered [`CtrlState::Stopped`]. `reason` tells whether the executor
    /// stopped on request or by itself.
    fn on_stopped(&mut self, reason: StopReason) { let _ = reason; }

    /// Entered [`CtrlState::Starting`] (start was forwarded to the executor).
    /// Runs on the [`start_async`](StartStopCtrl::start_async) caller's thread.
    fn on_starting(&mut self) {}

    /// Entered [`CtrlState::Running`].
    fn on_running(&mut self) {}

    /// Entered [`CtrlState::StopPending`] (stop was forwarded to the executor).
    /// Runs on the [`stop_async`](StartStopCtrl::stop_async) caller's thread.
    fn on_stop_pending(&mut self) {}

    /// Entered [`CtrlState::StoppedStopPending`]: the executor stopped by itself
    /// (for `reason`) just before noticing the pending stop request.
    /// [`on_stopped`](Self::on_stopped) follows once the request is confirmed.
    fn on_stopped_stop_pending(&mut self, reason: StopReason) { let _ = reason; }

    /// Enqueueing a state-change notification onto the work queue failed.
    ///
    /// Notifications must never be dropped, so the controller retries forever,
    /// invoking this hook before every retry. Either free resources and return
    /// (to retry), or abort. The default gives up loudly.
    fn on_wq_enqueue_error(&mut self, error: &QueueError) {
        panic!("StartStopCtrl: cannot enqueue state-change notification: {error}");
    }
}

/// Mutex-protected controller state.
#[derive(Debug)]
struct CtrlControl {
    state: CtrlState,
    /// Configured restart contingent after PLL loss of lock. Zero = disabled.
    restart_budget: u8,
    /// Remaining contingent; refreshed on successful start and on
    /// [`StartStopCtrl::refresh_remaining_start_attempts`].
    remaining_restarts: u8,
    /// Active start-locks. Non-zero rejects [`StartStopCtrl::start_async`].
    start_locks: u8,
}

/// Supervisor that sequences start/stop of a [`TriggeredCyclicExec`].
///
/// Clients get asynchronous [`start_async()`]/[`stop_async()`] with precise result
/// codes; executor state changes funnel through [`on_exec_state_change()`] into
/// work-queue tasks, so every notification hook for one controller runs totally
/// ordered on the queue's thread. On PLL loss of lock the controller re-issues the
/// start automatically until its restart budget is exhausted.
///
/// # Wiring
///
/// The executor does not know its controller; your [`CyclicHandler`]'s
/// `on_state_change` forwards to [`on_exec_state_change()`]:
///
/// ```ignore
/// impl CyclicHandler for MyHandler {
///     fn sample(&mut self, overrun: bool) -> bool { /* domain work */ true }
///     fn on_state_change(&mut self, state: ExecState, reason: StopReason) {
///         self.ctrl.on_exec_state_change(state, reason);
///     }
/// }
/// ```
///
/// # Race resolutions
///
/// Two stop races are resolved purely by work-queue FIFO order:
///
/// - stop requested while an `on_run` task is in flight: the task sees
///   [`CtrlState::StopPending`] and does nothing; the stop confirmation is
///   guaranteed to follow.
/// - executor stops by itself while a stop is in flight: two stop tasks arrive in
///   order; the first moves to [`CtrlState::StoppedStopPending`] (with the
///   executor's own reason), the second - carrying `request-stop` - completes the
///   transition to [`CtrlState::Stopped`].
///
/// [`CyclicHandler`]: super::CyclicHandler
/// [`on_exec_state_change()`]: Self::on_exec_state_change
/// [`start_async()`]: Self::start_async
/// [`stop_async()`]: Self::stop_async
pub struct StartStopCtrl {
    exec: Arc<TriggeredCyclicExec>,
    wq: Arc<DeferredWorkQueue>,
    /// Tags this controller's work packages for targeted removal.
    owner: OwnerId,
    control: Mutex<CtrlControl>,
    /// Signaled whenever `control.state` becomes [`CtrlState::Stopped`].
    stopped_cv: Condvar,
    /// Serializes all hook invocations. Never acquired while `control` is held.
    hooks: Mutex<Box<dyn ControllerHooks>>,
}

impl std::fmt::Debug for StartStopCtrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartStopCtrl")
            .field("owner", &self.owner)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

impl StartStopCtrl {
    /// Creates a controller in the stopped state.
    ///
    /// `restart_attempts_after_loss_of_lock` is the automatic-restart contingent
    /// (zero disables the feature). `wq` must be driven by a worker thread, e.g. a
    /// [`WorkQueueThread`](crate::work_queue::WorkQueueThread), for notifications
    /// to flow.
    #[must_use]
    pub fn new(
        exec: Arc<TriggeredCyclicExec>,
        restart_attempts_after_loss_of_lock: u8,
        wq: Arc<DeferredWorkQueue>,
        hooks: Box<dyn ControllerHooks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            exec,
            wq,
            owner: OwnerId::new(),
            control: Mutex::new(CtrlControl {
                state: CtrlState::Stopped,
                restart_budget: restart_attempts_after_loss_of_lock,
                remaining_restarts: restart_attempts_after_loss_of_lock,
                start_locks: 0,
            }),
            stopped_cv: Condvar::new(),
            hooks: Mutex::new(hooks),
        })
    }

    // ---------------------------------------------------------------- start locks

    /// Acquires a start-lock; while any lock is held, [`start_async()`] returns
    /// [`StartResult::Locked`]. Multiple holders may lock simultaneously.
    ///
    /// # Panics
    ///
    /// Panics when more than [`MAX_START_LOCKS`] locks would be held.
    ///
    /// [`start_async()`]: Self::start_async
    pub fn lock_start(&self) {
        let mut control = self.lock_control();
        control.start_locks = control
            .start_locks
            .checked_add(1)
            .expect("more than MAX_START_LOCKS start-locks");
    }

    /// Releases a start-lock.
    ///
    /// # Panics
    ///
    /// Panics if no lock is held - unbalanced lock/unlock is a logic error.
    pub fn unlock_start(&self) {
        let mut control = self.lock_control();
        control.start_locks = control
            .start_locks
            .checked_sub(1)
            .expect("unlock_start without matching lock_start");
    }

    // -------------------------------------------------------------- client API

    /// Requests an asynchronous start of the managed executor.
    ///
    /// On success the restart contingent is refreshed and
    /// [`ControllerHooks::on_starting`] runs on this thread before returning.
    pub fn start_async(&self) -> StartResult {
        {
            let mut control = self.lock_control();
            match control.state {
                CtrlState::Stopped => {
                    if control.start_locks > 0 {
                        return StartResult::Locked;
                    }
                    self.exec
                        .request_start_sampling(0)
                        .expect("executor out of sync with its controller");
                    control.remaining_restarts = control.restart_budget;
                    control.state = CtrlState::Starting;
                }
                CtrlState::Starting => return StartResult::AlreadyStarted,
                CtrlState::Running => return StartResult::AlreadyRunning,
                CtrlState::StopPending | CtrlState::StoppedStopPending => {
                    return StartResult::AlreadyStopping;
                }
            }
        }

        self.with_hooks(|hooks| hooks.on_starting());
        StartResult::Ok
    }

    /// Requests an asynchronous stop of the managed executor.
    ///
    /// On success [`ControllerHooks::on_stop_pending`] runs on this thread before
    /// returning; [`ControllerHooks::on_stopped`] follows on the queue thread once
    /// the executor confirmed.
    pub fn stop_async(&self) -> StopResult {
        {
            let mut control = self.lock_control();
            match control.state {
                CtrlState::Stopped => return StopResult::AlreadyStopped,
                CtrlState::StopPending | CtrlState::StoppedStopPending => {
                    return StopResult::AlreadyStopping;
                }
                CtrlState::Starting | CtrlState::Running => {
                    self.exec
                        .request_stop_sampling()
                        .expect("executor out of sync with its controller");
                    control.state = CtrlState::StopPending;
                }
            }
        }

        self.with_hooks(|hooks| hooks.on_stop_pending());
        StopResult::Ok
    }

    /// Blocks until the controller reaches [`CtrlState::Stopped`].
    pub fn wait_until_stopped(&self) {
        let mut control = self.lock_control();
        while control.state != CtrlState::Stopped {
            control = self
                .stopped_cv
                .wait(control)
                .expect("StartStopCtrl mutex poisoned");
        }
    }

    /// Reconfigures the restart contingent. Takes effect at the next refresh
    /// (successful start or [`refresh_remaining_start_attempts()`]).
    ///
    /// [`refresh_remaining_start_attempts()`]: Self::refresh_remaining_start_attempts
    pub fn set_restart_attempts_after_loss_of_lock(&self, attempts: u8) {
        self.lock_control().restart_budget = attempts;
    }

    /// Refills the remaining restart contingent from the configured budget.
    pub fn refresh_remaining_start_attempts(&self) {
        let mut control = self.lock_control();
        control.remaining_restarts = control.restart_budget;
    }

    /// Current controller state.
    #[must_use]
    pub fn current_state(&self) -> CtrlState { self.lock_control().state }

    // ------------------------------------------------- executor notifications

    /// Entry point for executor state changes; call this from your handler's
    /// `on_state_change` (executor-thread context).
    ///
    /// Transitions to `running` and `stopped` become work packages; everything
    /// else is uninteresting to the lifecycle. Enqueueing failures invoke
    /// [`ControllerHooks::on_wq_enqueue_error`] and retry indefinitely - these
    /// notifications must never be dropped.
    pub fn on_exec_state_change(
        self: &Arc<Self>,
        new_state: ExecState,
        reason: StopReason,
    ) {
        if !matches!(new_state, ExecState::Running | ExecState::Stopped) {
            return;
        }

        loop {
            let ctrl = Arc::clone(self);
            let package = WorkPackage::with_owner(self.owner, None, move || match new_state {
                ExecState::Running => ctrl.on_run_wq(),
                ExecState::Stopped => ctrl.on_stop_wq(reason),
                ExecState::Starting | ExecState::WaitLock => unreachable!(),
            });

            match self.wq.add(package) {
                Ok(()) => return,
                Err(error) => self.with_hooks(|hooks| hooks.on_wq_enqueue_error(&error)),
            }
        }
    }

    /// Queue task: the executor entered `running`.
    fn on_run_wq(&self) {
        {
            let mut control = self.lock_control();
            match control.state {
                CtrlState::Starting => control.state = CtrlState::Running,
                // A stop got in between; the matching stop task is guaranteed to
                // follow, so this notification is stale and ignored.
                _ => return,
            }
        }
        self.with_hooks(|hooks| hooks.on_running());
    }

    /// Queue task: the executor entered `stopped` for `reason`.
    fn on_stop_wq(&self, reason: StopReason) {
        enum Next {
            Stopped(StopReason),
            StoppedStopPending(StopReason),
            Restart,
            Ignore,
        }

        let next = {
            let mut control = self.lock_control();
            match control.state {
                CtrlState::Starting | CtrlState::Running => {
                    if reason == StopReason::PllLossOfLock && control.remaining_restarts > 0 {
                        control.remaining_restarts -= 1;
                        control.state = CtrlState::Starting;
                        Next::Restart
                    } else {
                        control.state = CtrlState::Stopped;
                        self.stopped_cv.notify_all();
                        Next::Stopped(reason)
                    }
                }
                CtrlState::StopPending => {
                    if reason == StopReason::RequestStop {
                        control.state = CtrlState::Stopped;
                        self.stopped_cv.notify_all();
                        Next::Stopped(reason)
                    } else {
                        // The executor stopped by itself just before noticing the
                        // stop request; the requested-stop confirmation is next.
                        control.state = CtrlState::StoppedStopPending;
                        Next::StoppedStopPending(reason)
                    }
                }
                CtrlState::StoppedStopPending => {
                    control.state = CtrlState::Stopped;
                    self.stopped_cv.notify_all();
                    Next::Stopped(reason)
                }
                CtrlState::Stopped => Next::Ignore,
            }
        };

        match next {
            Next::Stopped(reason) => self.with_hooks(|hooks| hooks.on_stopped(reason)),
            Next::StoppedStopPending(reason) => {
                self.with_hooks(|hooks| hooks.on_stopped_stop_pending(reason));
            }
            Next::Restart => {
                let extra_cycles = self.with_hooks(|hooks| hooks.on_before_restart());
                self.exec
                    .request_start_sampling(extra_cycles)
                    .expect("executor out of sync with its controller");
            }
            Next::Ignore => {}
        }
    }

    fn with_hooks<R>(&self, f: impl FnOnce(&mut dyn ControllerHooks) -> R) -> R {
        let mut hooks = self.hooks.lock().expect("StartStopCtrl hook mutex poisoned");
        abort_on_panic("controller hook", move || f(&mut **hooks))
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, CtrlControl> {
        self.control.lock().expect("StartStopCtrl mutex poisoned")
    }
}
