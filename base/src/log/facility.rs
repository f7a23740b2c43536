// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The pipeline hub: [`ThreadedLogFacility`], [`LogFacilityCtrl`].

use super::{Backend, LogError, LogLevel, LogMessage, LogType, Logger};
use crate::sync::{CancelToken, WorkerThread, abort_on_panic};
use std::{collections::VecDeque,
          sync::{Arc, Condvar, Mutex, Weak},
          time::Duration};

/// One log source's name and threshold - the unit of persisted configuration.
pub type LogSrcConfig = (String, LogLevel);

/// Control surface of a log facility: enumerate sources, adjust thresholds,
/// manage the default-settings table. This is what the persisted-configuration
/// readers/writers and the CLI command surface talk to.
pub trait LogFacilityCtrl {
    /// Names and current levels of all registered sources, sorted by name
    /// (upper-case before lower-case).
    fn enumerate_log_sources(&self) -> Vec<LogSrcConfig>;

    /// Current level of one source, or [`None`] if the name is unknown.
    fn get_log_level(&self, src_name: &str) -> Option<LogLevel>;

    /// Sets one source's level. Returns whether the source was found.
    fn set_log_level(&self, src_name: &str, level: LogLevel) -> bool;

    /// Ensures one source's level is at or below `level`. Returns whether the
    /// source was found.
    fn lower_log_level(&self, src_name: &str, level: LogLevel) -> bool;

    /// Ensures one source's level is at or above `level`. Returns whether the
    /// source was found.
    fn raise_log_level(&self, src_name: &str, level: LogLevel) -> bool;

    /// Installs the default-level table consumed by subsequent registrations.
    /// Replaces any previously installed table.
    fn set_default_settings(&self, defaults: Vec<LogSrcConfig>);

    /// Removes the default-level table; the returned remainder holds the
    /// entries no registration consumed.
    fn remove_default_settings(&self) -> Vec<LogSrcConfig>;
}

/// Applies a configuration list through a control surface.
///
/// # Returns
///
/// The names that matched no registered source ("unknown log source"); sources
/// the list does not mention keep their current level.
pub fn apply_log_src_configs(
    ctrl: &dyn LogFacilityCtrl,
    entries: &[LogSrcConfig],
) -> Vec<String> {
    entries
        .iter()
        .filter(|(name, level)| !ctrl.set_log_level(name, *level))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Registration-side state: who logs, who consumes, what new loggers default to.
struct Front {
    /// `(name, logger)` sorted by name, byte-wise (upper-case first). The weak
    /// reference is this facility's only hold on a logger - user code owns it.
    loggers: Vec<(Arc<str>, Weak<Logger>)>,
    /// Delivery targets, in registration order. Owned by the facility.
    backends: Vec<Arc<dyn Backend>>,
    /// Default levels for loggers registered later. `None` = no table installed.
    default_settings: Option<Vec<LogSrcConfig>>,
}

/// Queue-side state.
struct MsgQueue {
    messages: VecDeque<LogMessage>,
    /// Remaining slots for messages below error severity.
    remaining_capacity: usize,
    /// Messages rejected at the capacity limit, plus messages that did not reach
    /// every back-end.
    dropped: u32,
    /// Incidents reported via [`Logger::log_failed`].
    creation_failed: u32,
    /// Worker is between taking a batch and finishing its delivery.
    busy: bool,
}

impl MsgQueue {
    fn is_idle(&self) -> bool {
        self.messages.is_empty() && self.dropped == 0 && self.creation_failed == 0 && !self.busy
    }
}

/// Thread-based log facility: accepts messages from any thread, renders and
/// delivers them on its own worker thread.
///
/// # Capacity rule
///
/// The FIFO limits messages *below* error severity to the constructed capacity;
/// error and fatal messages are exempt and only bounded by the host heap. A
/// sub-error message arriving at the limit is dropped and counted; the count
/// surfaces as a synthesized `N message(s) dropped` error line after the next
/// queue drain - that report is retried until it got through, so drops are
/// never silent.
///
/// # Lifecycle
///
/// Construct (via [`new()`], returns an [`Arc`] because loggers back-reference
/// the facility), register loggers and back-ends, [`start()`] the worker. Shut
/// down in reverse: [`stop()`], then unregister everything, then drop. Dropping
/// with loggers or back-ends still registered panics - that is a hard
/// precondition, not a recoverable error.
///
/// [`new()`]: Self::new
/// [`start()`]: Self::start
/// [`stop()`]: Self::stop
pub struct ThreadedLogFacility {
    thread_name: String,
    front: Mutex<Front>,
    queue: Mutex<MsgQueue>,
    /// Signaled when the queue gains a message or a failure counter rises.
    queue_cv: Condvar,
    /// Signaled when the queue becomes idle (for [`flush`](Self::flush)).
    idle_cv: Condvar,
    worker: Mutex<Option<WorkerThread>>,
}

impl std::fmt::Debug for ThreadedLogFacility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedLogFacility")
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

impl ThreadedLogFacility {
    /// Creates a facility whose FIFO holds up to `capacity` sub-error messages.
    /// `thread_name` names the worker thread spawned by [`start()`](Self::start).
    #[must_use]
    pub fn new(thread_name: &str, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            thread_name: thread_name.to_owned(),
            front: Mutex::new(Front {
                loggers: Vec::new(),
                backends: Vec::new(),
                default_settings: None,
            }),
            queue: Mutex::new(MsgQueue {
                messages: VecDeque::new(),
                remaining_capacity: capacity,
                dropped: 0,
                creation_failed: 0,
                busy: false,
            }),
            queue_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            worker: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------ registration

    /// Registers a logger front.
    ///
    /// If a default-settings table is installed, the entry matching this
    /// logger's name is consumed and applied; a table *without* a matching
    /// entry makes the fresh logger immediately emit a warning about the
    /// missing default.
    ///
    /// # Errors
    ///
    /// [`LogError::AlreadyAttached`] if the logger is bound to a facility;
    /// [`LogError::DuplicateSource`] if the name is taken here.
    pub fn register_logger(
        self: &Arc<Self>,
        logger: &Arc<Logger>,
    ) -> Result<(), LogError> {
        logger.attach(self)?;

        let missing_default = {
            let mut front = self.lock_front();

            // Names of dead loggers must not block re-registration.
            front.loggers.retain(|(_, weak)| weak.strong_count() > 0);

            match front
                .loggers
                .binary_search_by(|(name, _)| name.as_ref().cmp(logger.name()))
            {
                Ok(_) => {
                    drop(front);
                    logger.detach();
                    return Err(LogError::DuplicateSource {
                        name: logger.name().to_owned(),
                    });
                }
                Err(position) => {
                    front
                        .loggers
                        .insert(position, (logger.name_shared(), Arc::downgrade(logger)));
                }
            }

            match &mut front.default_settings {
                Some(settings) => {
                    if let Some(position) =
                        settings.iter().position(|(name, _)| name == logger.name())
                    {
                        let (_, level) = settings.remove(position);
                        logger.set_log_level(level);
                        false
                    } else {
                        true
                    }
                }
                None => false,
            }
        };

        if missing_default {
            logger.log(LogType::Warning, "No default log level deposited");
        }
        Ok(())
    }

    /// Unregisters a logger front.
    ///
    /// # Errors
    ///
    /// [`LogError::NotRegistered`] if this logger is not registered here.
    pub fn unregister_logger(&self, logger: &Arc<Logger>) -> Result<(), LogError> {
        let mut front = self.lock_front();
        let before = front.loggers.len();
        front
            .loggers
            .retain(|(_, weak)| weak.as_ptr() != Arc::as_ptr(logger));
        if front.loggers.len() == before {
            return Err(LogError::NotRegistered);
        }
        drop(front);
        logger.detach();
        Ok(())
    }

    /// Registers a back-end at the end of the delivery chain.
    pub fn register_backend(&self, backend: Arc<dyn Backend>) {
        self.lock_front().backends.push(backend);
    }

    /// Unregisters a back-end.
    ///
    /// # Errors
    ///
    /// [`LogError::NotRegistered`] if this back-end is not registered here.
    pub fn unregister_backend(&self, backend: &Arc<dyn Backend>) -> Result<(), LogError> {
        let mut front = self.lock_front();
        let before = front.backends.len();
        front.backends.retain(|candidate| !Arc::ptr_eq(candidate, backend));
        if front.backends.len() == before {
            return Err(LogError::NotRegistered);
        }
        Ok(())
    }

    // --------------------------------------------------------------- lifecycle

    /// Spawns the worker thread.
    ///
    /// # Errors
    ///
    /// [`LogError::AlreadyStarted`] or a spawn failure.
    pub fn start(self: &Arc<Self>, stack_size: Option<usize>) -> Result<(), LogError> {
        let mut slot = self.worker.lock().expect("facility worker slot poisoned");
        if slot.is_some() {
            return Err(LogError::AlreadyStarted);
        }
        let facility = Arc::clone(self);
        *slot = Some(WorkerThread::spawn(
            &self.thread_name,
            stack_size,
            move |cancel| facility.worker_loop(&cancel),
        )?);
        Ok(())
    }

    /// Stops the worker thread: it drains everything already accepted (drop
    /// reports included) and joins. No-op if not started.
    pub fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .expect("facility worker slot poisoned")
            .take();
        if let Some(worker) = worker {
            worker.cancel();
            self.queue_cv.notify_all();
            worker.join();
        }
    }

    /// Blocks until every accepted message has been delivered and all failure
    /// counters are reported. Requires a started worker to make progress.
    pub fn flush(&self) {
        let mut queue = self.lock_queue();
        while !queue.is_idle() {
            queue = self.idle_cv.wait(queue).expect("facility queue mutex poisoned");
        }
    }

    // ------------------------------------------------------------- message path

    /// Accepts one message into the FIFO (called by [`Logger`]).
    pub(crate) fn enqueue(&self, message: LogMessage) {
        let mut queue = self.lock_queue();

        let limited = message.severity < LogType::Error;
        if limited && queue.remaining_capacity == 0 {
            queue.dropped = queue.dropped.saturating_add(1);
            self.queue_cv.notify_one();
            return;
        }
        if queue.messages.try_reserve(1).is_err() {
            queue.dropped = queue.dropped.saturating_add(1);
            self.queue_cv.notify_one();
            return;
        }

        if limited {
            queue.remaining_capacity -= 1;
        }
        queue.messages.push_back(message);
        self.queue_cv.notify_one();
    }

    /// Counts a failed message creation (called by [`Logger::log_failed`]).
    pub(crate) fn report_message_creation_failed(&self) {
        let mut queue = self.lock_queue();
        queue.creation_failed = queue.creation_failed.saturating_add(1);
        self.queue_cv.notify_one();
    }

    /// The worker thread: drain the FIFO in batches, render and deliver, then
    /// report accumulated drops. Returns once cancelled *and* idle.
    fn worker_loop(&self, cancel: &CancelToken) {
        loop {
            let (batch, dropped, creation_failed) = {
                let mut queue = self.lock_queue();
                loop {
                    let has_work = !queue.messages.is_empty()
                        || queue.dropped > 0
                        || queue.creation_failed > 0;
                    if has_work {
                        break;
                    }
                    if cancel.is_cancellation_pending() {
                        return;
                    }
                    queue = self
                        .queue_cv
                        .wait(queue)
                        .expect("facility queue mutex poisoned");
                }

                let batch = std::mem::take(&mut queue.messages);
                for message in &batch {
                    if message.severity < LogType::Error {
                        queue.remaining_capacity += 1;
                    }
                }
                queue.busy = true;
                (
                    batch,
                    std::mem::take(&mut queue.dropped),
                    std::mem::take(&mut queue.creation_failed),
                )
            };

            let mut redeliver_dropped = 0u32;
            for message in batch {
                let severity = message.severity;
                let text = message.render();
                if !self.deliver(&text, severity) {
                    redeliver_dropped += 1;
                }
            }

            // The drop reports themselves: cleared counters come back if their
            // report could not be delivered, so reporting is retried until done.
            let mut redeliver_creation = 0u32;
            if dropped > 0 {
                let text = format!("[ERROR] {dropped} message(s) dropped");
                if !self.deliver(&text, LogType::Error) {
                    redeliver_dropped += dropped;
                }
            }
            if creation_failed > 0 {
                let text =
                    format!("[ERROR] {creation_failed} log message(s) could not be created");
                if !self.deliver(&text, LogType::Error) {
                    redeliver_creation += creation_failed;
                }
            }

            let retry_pending = redeliver_dropped > 0 || redeliver_creation > 0;
            {
                let mut queue = self.lock_queue();
                queue.dropped = queue.dropped.saturating_add(redeliver_dropped);
                queue.creation_failed =
                    queue.creation_failed.saturating_add(redeliver_creation);
                queue.busy = false;
                if queue.is_idle() {
                    self.idle_cv.notify_all();
                }
            }

            if retry_pending {
                if cancel.is_cancellation_pending() {
                    // Backends are failing at shutdown; give up after one pass.
                    return;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    /// Delivers one rendered line to all back-ends, in registration order,
    /// without any facility mutex held.
    ///
    /// # Returns
    ///
    /// `false` if any back-end failed (the line still reached the others).
    fn deliver(&self, text: &str, severity: LogType) -> bool {
        let backends: Vec<Arc<dyn Backend>> = self.lock_front().backends.clone();

        let mut all_ok = true;
        for backend in backends {
            let result = abort_on_panic("log backend", || backend.process(text, severity));
            if result.is_err() {
                all_ok = false;
            }
        }
        all_ok
    }

    // --------------------------------------------------------------- internals

    fn lock_front(&self) -> std::sync::MutexGuard<'_, Front> {
        self.front.lock().expect("facility front mutex poisoned")
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, MsgQueue> {
        self.queue.lock().expect("facility queue mutex poisoned")
    }

    fn find_logger(&self, src_name: &str) -> Option<Arc<Logger>> {
        let front = self.lock_front();
        front
            .loggers
            .binary_search_by(|(name, _)| name.as_ref().cmp(src_name))
            .ok()
            .and_then(|position| front.loggers[position].1.upgrade())
    }
}

impl LogFacilityCtrl for ThreadedLogFacility {
    fn enumerate_log_sources(&self) -> Vec<LogSrcConfig> {
        self.lock_front()
            .loggers
            .iter()
            .filter_map(|(name, weak)| {
                weak.upgrade().map(|logger| (name.to_string(), logger.log_level()))
            })
            .collect()
    }

    fn get_log_level(&self, src_name: &str) -> Option<LogLevel> {
        self.find_logger(src_name).map(|logger| logger.log_level())
    }

    fn set_log_level(&self, src_name: &str, level: LogLevel) -> bool {
        self.find_logger(src_name)
            .inspect(|logger| logger.set_log_level(level))
            .is_some()
    }

    fn lower_log_level(&self, src_name: &str, level: LogLevel) -> bool {
        self.find_logger(src_name)
            .inspect(|logger| logger.lower_log_level(level))
            .is_some()
    }

    fn raise_log_level(&self, src_name: &str, level: LogLevel) -> bool {
        self.find_logger(src_name)
            .inspect(|logger| logger.raise_log_level(level))
            .is_some()
    }

    fn set_default_settings(&self, defaults: Vec<LogSrcConfig>) {
        self.lock_front().default_settings = Some(defaults);
    }

    fn remove_default_settings(&self) -> Vec<LogSrcConfig> {
        self.lock_front().default_settings.take().unwrap_or_default()
    }
}

impl Drop for ThreadedLogFacility {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        // The worker owns a strong handle to the facility, so reaching this
        // point means stop() already ran (or start() never did). What CAN leak
        // here are registrations, and leaking them is a contract violation.
        if let Ok(front) = self.front.get_mut() {
            let live_loggers = front
                .loggers
                .iter()
                .any(|(_, weak)| weak.strong_count() > 0);
            assert!(
                !live_loggers,
                "ThreadedLogFacility dropped with loggers still registered"
            );
            assert!(
                front.backends.is_empty(),
                "ThreadedLogFacility dropped with backends still registered"
            );
        }
    }
}
