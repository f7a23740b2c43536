// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{FailOnceBackend, FakeBackend};
use crate::log::{Backend, LogError, LogFacilityCtrl, LogLevel, LogType, Logger,
                 ThreadedLogFacility};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Stops the worker and unregisters everything so the facility's drop
/// precondition holds.
fn teardown(
    facility: &Arc<ThreadedLogFacility>,
    loggers: &[Arc<Logger>],
    backends: &[Arc<dyn Backend>],
) {
    facility.stop();
    for logger in loggers {
        facility.unregister_logger(logger).unwrap();
    }
    for backend in backends {
        facility.unregister_backend(backend).unwrap();
    }
}

/// Registers the backend and returns the erased handle used for teardown.
fn register<B: Backend + 'static>(
    facility: &ThreadedLogFacility,
    backend: &Arc<B>,
) -> Arc<dyn Backend> {
    let cloned: Arc<B> = Arc::clone(backend);
    let erased: Arc<dyn Backend> = cloned;
    facility.register_backend(Arc::clone(&erased));
    erased
}

/// Capacity 4 for sub-error messages: six infos overflow by two, the error is
/// exempt, and exactly one synthesized drop report follows.
#[test]
fn capacity_overflow_drops_and_reports_exactly_once() {
    let facility = ThreadedLogFacility::new("log-drop", 4);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Burst");
    facility.register_logger(&logger).unwrap();

    // Deposit while the worker is not yet draining: deterministic overflow.
    for index in 0..6 {
        logger.log_string(LogType::Info, format!("info {index}"));
    }
    logger.log(LogType::Error, "the error");

    facility.start(None).unwrap();
    facility.flush();

    assert_eq!(
        backend.texts(),
        vec![
            "[INFO ] Burst: info 0",
            "[INFO ] Burst: info 1",
            "[INFO ] Burst: info 2",
            "[INFO ] Burst: info 3",
            "[ERROR] Burst: the error",
            "[ERROR] 2 message(s) dropped",
        ]
    );

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn capacity_is_restored_after_draining() {
    let facility = ThreadedLogFacility::new("log-refill", 2);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Refill");
    facility.register_logger(&logger).unwrap();

    facility.start(None).unwrap();

    // Two waves, each within capacity once the previous wave drained.
    logger.log(LogType::Info, "wave 1a");
    logger.log(LogType::Info, "wave 1b");
    facility.flush();
    logger.log(LogType::Info, "wave 2a");
    logger.log(LogType::Info, "wave 2b");
    facility.flush();

    assert_eq!(backend.texts().len(), 4);
    assert!(!backend.texts().iter().any(|t| t.contains("dropped")));

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn below_threshold_messages_never_reach_the_queue() {
    let facility = ThreadedLogFacility::new("log-filter", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Quiet");
    facility.register_logger(&logger).unwrap();
    logger.set_log_level(LogLevel::ErrorOrAbove);

    facility.start(None).unwrap();
    logger.log(LogType::Info, "suppressed");
    logger.log(LogType::Warning, "suppressed too");
    logger.log(LogType::Error, "visible");
    facility.flush();

    assert_eq!(backend.texts(), vec!["[ERROR] Quiet: visible"]);

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn lazy_messages_are_rendered_on_the_worker() {
    let facility = ThreadedLogFacility::new("log-lazy", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Lazy");
    facility.register_logger(&logger).unwrap();

    facility.start(None).unwrap();
    logger.log_lazy(LogType::Info, || format!("built {}", 6 * 7));
    facility.flush();

    assert_eq!(backend.texts(), vec!["[INFO ] Lazy: built 42"]);

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn creation_failures_are_aggregated_into_one_report() {
    let facility = ThreadedLogFacility::new("log-failed", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Builder");
    facility.register_logger(&logger).unwrap();

    logger.log_failed();
    logger.log_failed();
    logger.log_failed();

    facility.start(None).unwrap();
    facility.flush();

    assert_eq!(
        backend.texts(),
        vec!["[ERROR] 3 log message(s) could not be created"]
    );

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn failing_backend_is_counted_and_reported_not_fatal() {
    let facility = ThreadedLogFacility::new("log-backend-fail", 16);
    let recorder = FakeBackend::new();
    let flaky: Arc<FailOnceBackend> = Arc::default();
    let erased_recorder = register(&facility, &recorder);
    let erased_flaky = register(&facility, &flaky);
    let logger = Logger::new("Flaky");
    facility.register_logger(&logger).unwrap();

    facility.start(None).unwrap();
    logger.log(LogType::Info, "first try");
    facility.flush();

    // The recorder got the message despite the flaky sibling, and the incident
    // shows up as a drop report.
    assert_eq!(
        recorder.texts(),
        vec!["[INFO ] Flaky: first try", "[ERROR] 1 message(s) dropped"]
    );

    teardown(&facility, &[logger], &[erased_recorder, erased_flaky]);
}

#[test]
fn default_settings_are_consumed_on_registration() {
    let facility = ThreadedLogFacility::new("log-defaults", 16);
    facility.set_default_settings(vec![
        ("Configured".to_owned(), LogLevel::DebugOrAbove),
        ("NeverRegistered".to_owned(), LogLevel::Nothing),
    ]);

    let configured = Logger::new("Configured");
    facility.register_logger(&configured).unwrap();
    assert_eq!(configured.log_level(), LogLevel::DebugOrAbove);

    // The consumed entry is gone; the untouched one comes back.
    let remainder = facility.remove_default_settings();
    assert_eq!(remainder, vec![("NeverRegistered".to_owned(), LogLevel::Nothing)]);

    facility.unregister_logger(&configured).unwrap();
}

#[test]
fn missing_default_entry_emits_a_warning_through_the_new_logger() {
    let facility = ThreadedLogFacility::new("log-missing-default", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    facility.set_default_settings(vec![("SomebodyElse".to_owned(), LogLevel::Nothing)]);

    facility.start(None).unwrap();
    let logger = Logger::new("Unexpected");
    facility.register_logger(&logger).unwrap();
    facility.flush();

    assert_eq!(
        backend.texts(),
        vec!["[WARN ] Unexpected: No default log level deposited"]
    );

    facility.remove_default_settings();
    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn registration_without_a_default_table_is_silent() {
    let facility = ThreadedLogFacility::new("log-no-table", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);

    facility.start(None).unwrap();
    let logger = Logger::new("Ordinary");
    facility.register_logger(&logger).unwrap();
    facility.flush();

    assert_eq!(backend.texts(), Vec::<String>::new());

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn duplicate_source_names_are_rejected() {
    let facility = ThreadedLogFacility::new("log-dup", 16);
    let first = Logger::new("SameName");
    let second = Logger::new("SameName");

    facility.register_logger(&first).unwrap();
    assert!(matches!(
        facility.register_logger(&second),
        Err(LogError::DuplicateSource { .. })
    ));

    facility.unregister_logger(&first).unwrap();
}

#[test]
fn a_logger_binds_to_at_most_one_facility() {
    let first = ThreadedLogFacility::new("log-first", 16);
    let second = ThreadedLogFacility::new("log-second", 16);
    let logger = Logger::new("Torn");

    first.register_logger(&logger).unwrap();
    assert!(matches!(
        second.register_logger(&logger),
        Err(LogError::AlreadyAttached)
    ));

    first.unregister_logger(&logger).unwrap();
}

#[test]
fn enumeration_is_sorted_upper_case_first() {
    let facility = ThreadedLogFacility::new("log-sorted", 16);
    let loggers: Vec<_> =
        ["beta", "Alpha", "Zulu"].iter().map(|name| Logger::new(name)).collect();
    for logger in &loggers {
        facility.register_logger(logger).unwrap();
    }

    let names: Vec<String> = facility
        .enumerate_log_sources()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["Alpha", "Zulu", "beta"]);

    for logger in &loggers {
        facility.unregister_logger(logger).unwrap();
    }
}

#[test]
fn ctrl_surface_adjusts_levels_and_reports_unknown_names() {
    let facility = ThreadedLogFacility::new("log-ctrl", 16);
    let logger = Logger::new("Tuned");
    facility.register_logger(&logger).unwrap();

    assert!(facility.set_log_level("Tuned", LogLevel::WarningOrAbove));
    assert_eq!(facility.get_log_level("Tuned"), Some(LogLevel::WarningOrAbove));

    assert!(facility.lower_log_level("Tuned", LogLevel::DebugOrAbove));
    assert_eq!(facility.get_log_level("Tuned"), Some(LogLevel::DebugOrAbove));

    assert!(facility.raise_log_level("Tuned", LogLevel::ErrorOrAbove));
    assert_eq!(facility.get_log_level("Tuned"), Some(LogLevel::ErrorOrAbove));

    assert!(!facility.set_log_level("Nobody", LogLevel::Nothing));
    assert_eq!(facility.get_log_level("Nobody"), None);

    facility.unregister_logger(&logger).unwrap();
}

#[test]
fn restart_after_stop_is_possible() {
    let facility = ThreadedLogFacility::new("log-restart", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Phased");
    facility.register_logger(&logger).unwrap();

    facility.start(None).unwrap();
    assert!(matches!(facility.start(None), Err(LogError::AlreadyStarted)));
    logger.log(LogType::Info, "phase one");
    facility.flush();
    facility.stop();

    facility.start(None).unwrap();
    logger.log(LogType::Info, "phase two");
    facility.flush();

    assert_eq!(
        backend.texts(),
        vec!["[INFO ] Phased: phase one", "[INFO ] Phased: phase two"]
    );

    teardown(&facility, &[logger], &[erased]);
}

#[test]
fn stop_drains_already_accepted_messages() {
    let facility = ThreadedLogFacility::new("log-drain", 16);
    let backend = FakeBackend::new();
    let erased = register(&facility, &backend);
    let logger = Logger::new("Drain");
    facility.register_logger(&logger).unwrap();

    // Deposited before the worker ever ran; stop() must still deliver them.
    logger.log(LogType::Info, "queued early");
    facility.start(None).unwrap();
    facility.stop();

    assert_eq!(backend.texts(), vec!["[INFO ] Drain: queued early"]);

    teardown(&facility, &[logger], &[erased]);
}

#[test]
#[should_panic(expected = "loggers still registered")]
fn dropping_with_a_registered_logger_panics() {
    let facility = ThreadedLogFacility::new("log-leak", 16);
    let logger = Logger::new("Leaked");
    facility.register_logger(&logger).unwrap();
    drop(facility);
}
