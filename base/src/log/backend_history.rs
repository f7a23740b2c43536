// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! In-memory ring sink for post-hoc inspection: [`HistoryBackend`].

use super::{Backend, BackendError, LogType};
use std::{collections::VecDeque,
          sync::Mutex};

/// Ring of recorded messages plus the status flags shown alongside them.
#[derive(Debug, Default)]
struct HistoryState {
    entries: VecDeque<(LogType, String)>,
    total_bytes: usize,
    /// Old messages were evicted to make room - the ring saw more than it holds.
    old_messages_removed: bool,
    /// Messages that could not be recorded at all.
    nb_of_dropped_messages: u32,
}

/// Log back-end recording messages in a bounded ring buffer.
///
/// The ring's capacity is two-dimensional: a maximum message *count* and a
/// maximum total *byte* budget for the recorded texts. When either bound is
/// exceeded, the oldest messages are discarded and the `old messages removed`
/// flag is raised, so a later reader knows the record is incomplete. Messages
/// that cannot be recorded at all (out of host memory, or larger than the whole
/// byte budget) are counted separately.
///
/// [`render()`] produces the last `n` recorded messages plus a status line;
/// [`clear()`] wipes messages, flag and counter.
///
/// [`clear()`]: Self::clear
/// [`render()`]: Self::render
#[derive(Debug)]
pub struct HistoryBackend {
    max_nb_of_messages: usize,
    max_total_bytes: usize,
    state: Mutex<HistoryState>,
}

impl HistoryBackend {
    /// Ring bounded by `max_nb_of_messages` entries and `max_total_bytes` of
    /// recorded text.
    #[must_use]
    pub fn new(max_nb_of_messages: usize, max_total_bytes: usize) -> Self {
        Self {
            max_nb_of_messages,
            max_total_bytes,
            state: Mutex::new(HistoryState::default()),
        }
    }

    /// Discards all recorded messages and resets flag and drop counter.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.total_bytes = 0;
        state.old_messages_removed = false;
        state.nb_of_dropped_messages = 0;
    }

    /// Renders the last `count` recorded messages (all of them for [`None`]),
    /// oldest first, preceded by a status line.
    #[must_use]
    pub fn render(&self, count: Option<usize>) -> String {
        let state = self.lock();

        let mut out = format!("{} message(s) recorded", state.entries.len());
        if state.old_messages_removed {
            out.push_str(", old messages removed");
        }
        if state.nb_of_dropped_messages > 0 {
            out.push_str(&format!(
                ", {} message(s) could not be recorded",
                state.nb_of_dropped_messages
            ));
        }

        let count = count.unwrap_or(state.entries.len()).min(state.entries.len());
        for (_, text) in state.entries.iter().skip(state.entries.len() - count) {
            out.push('\n');
            out.push_str(text);
        }
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        self.state.lock().expect("HistoryBackend mutex poisoned")
    }
}

impl Backend for HistoryBackend {
    fn process(&self, text: &str, severity: LogType) -> Result<(), BackendError> {
        let mut state = self.lock();

        if text.len() > self.max_total_bytes {
            // Could never fit, not even alone.
            state.nb_of_dropped_messages = state.nb_of_dropped_messages.saturating_add(1);
            return Err(BackendError::OutOfHostMemory);
        }
        if state.entries.try_reserve(1).is_err() {
            state.nb_of_dropped_messages = state.nb_of_dropped_messages.saturating_add(1);
            return Err(BackendError::OutOfHostMemory);
        }

        state.total_bytes += text.len();
        state.entries.push_back((severity, text.to_owned()));

        // Evict oldest entries until both bounds hold again.
        while state.entries.len() > self.max_nb_of_messages
            || state.total_bytes > self.max_total_bytes
        {
            let (_, evicted) = state.entries.pop_front().expect("ring not empty");
            state.total_bytes -= evicted.len();
            state.old_messages_removed = true;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_in_order_and_renders_with_status_line() {
        let backend = HistoryBackend::new(10, 1024);
        backend.process("first", LogType::Info).unwrap();
        backend.process("second", LogType::Error).unwrap();

        assert_eq!(backend.render(None), "2 message(s) recorded\nfirst\nsecond");
    }

    #[test]
    fn count_bound_evicts_the_oldest_and_raises_the_flag() {
        let backend = HistoryBackend::new(2, 1024);
        backend.process("one", LogType::Info).unwrap();
        backend.process("two", LogType::Info).unwrap();
        backend.process("three", LogType::Info).unwrap();

        assert_eq!(
            backend.render(None),
            "2 message(s) recorded, old messages removed\ntwo\nthree"
        );
    }

    #[test]
    fn byte_budget_evicts_independently_of_the_count() {
        let backend = HistoryBackend::new(100, 10);
        backend.process("123456", LogType::Info).unwrap(); // 6 byte
        backend.process("7890", LogType::Info).unwrap(); // 4 byte, exactly full
        backend.process("x", LogType::Info).unwrap(); // forces eviction

        assert_eq!(
            backend.render(None),
            "2 message(s) recorded, old messages removed\n7890\nx"
        );
    }

    #[test]
    fn oversized_message_is_counted_as_dropped() {
        let backend = HistoryBackend::new(10, 4);
        assert!(backend.process("too large", LogType::Info).is_err());
        assert_eq!(
            backend.render(None),
            "0 message(s) recorded, 1 message(s) could not be recorded"
        );
    }

    #[test]
    fn render_limits_to_the_last_n_messages() {
        let backend = HistoryBackend::new(10, 1024);
        for text in ["a", "b", "c", "d"] {
            backend.process(text, LogType::Info).unwrap();
        }
        assert_eq!(backend.render(Some(2)), "4 message(s) recorded\nc\nd");
    }

    #[test]
    fn clear_resets_messages_flag_and_counter() {
        let backend = HistoryBackend::new(1, 1024);
        backend.process("one", LogType::Info).unwrap();
        backend.process("two", LogType::Info).unwrap();
        backend.clear();
        assert_eq!(backend.render(None), "0 message(s) recorded");
    }
}
