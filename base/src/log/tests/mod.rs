// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! End-to-end tests of the threaded log facility.

mod facility_tests;

use super::{Backend, BackendError, LogType};
use std::sync::{Arc, Mutex,
                atomic::{AtomicBool, Ordering}};

/// Recording back-end: keeps every processed line for assertions.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub lines: Mutex<Vec<(LogType, String)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn recorded(&self) -> Vec<(LogType, String)> { self.lines.lock().unwrap().clone() }

    pub fn texts(&self) -> Vec<String> {
        self.recorded().into_iter().map(|(_, text)| text).collect()
    }
}

impl Backend for FakeBackend {
    fn process(&self, text: &str, severity: LogType) -> Result<(), BackendError> {
        self.lines.lock().unwrap().push((severity, text.to_owned()));
        Ok(())
    }
}

/// Back-end that fails exactly once, then behaves.
#[derive(Debug, Default)]
pub struct FailOnceBackend {
    failed: AtomicBool,
}

impl Backend for FailOnceBackend {
    fn process(&self, _text: &str, _severity: LogType) -> Result<(), BackendError> {
        if self.failed.swap(true, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::OutOfHostMemory)
        }
    }
}
