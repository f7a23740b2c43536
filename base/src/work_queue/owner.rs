// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Opaque ownership keys for work packages: [`OwnerId`].

use std::{num::NonZeroU64,
          sync::atomic::{AtomicU64, Ordering}};

/// Process-unique, opaque key identifying the *owner* of work packages.
///
/// An owner is typically a component that enqueues packages and must be able to
/// withdraw all of them at once on shutdown ([`remove_by_owner`]) or wait for its
/// in-flight package ([`wait_until_current_executed`]). The key carries no meaning
/// beyond identity - create one per owning component and keep it.
///
/// A package may additionally carry a 32-bit sub-id to target
/// [`remove_by_owner_and_id`] at one kind of package among an owner's many.
///
/// [`remove_by_owner`]: super::DeferredWorkQueue::remove_by_owner
/// [`remove_by_owner_and_id`]: super::DeferredWorkQueue::remove_by_owner_and_id
/// [`wait_until_current_executed`]: super::DeferredWorkQueue::wait_until_current_executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(NonZeroU64);

impl OwnerId {
    /// Creates a fresh, process-unique key.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let value = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(value).expect("owner id counter wrapped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = OwnerId::new();
        let b = OwnerId::new();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
