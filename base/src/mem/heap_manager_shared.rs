// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Thread-safe heap manager with RAII descriptors: [`SharedHeapManager`],
//! [`SharedMemoryDescriptor`].

use super::{HeapConfig, HeapError, HeapManager, HeapStatistics, MemoryDescriptor};
use std::sync::{Arc, Mutex};

/// Thread-safe wrapper around [`HeapManager`] with shared-ownership descriptors.
///
/// Every operation serializes on an internal mutex. Allocations come back as
/// [`SharedMemoryDescriptor`] guards that release their block on drop, so leaks of
/// managed memory require actively leaking the guard.
///
/// # Lifetime
///
/// Manager and descriptors form a lifetime cycle in the original design: the manager
/// must stay alive while any of its descriptors exists. Rendered here with [`Arc`]:
/// each guard holds a strong handle to the manager core, the manager holds nothing
/// back. Dropping the last of {[`SharedHeapManager`] clones, outstanding guards}
/// destroys the core - destruction is driven by the last descriptor.
#[derive(Debug, Clone)]
pub struct SharedHeapManager {
    core: Arc<Mutex<HeapManager>>,
}

impl SharedHeapManager {
    /// See [`HeapManager::new()`].
    ///
    /// # Errors
    ///
    /// Same as [`HeapManager::new()`].
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        Ok(Self {
            core: Arc::new(Mutex::new(HeapManager::new(config)?)),
        })
    }

    /// Allocates at least `size` byte; see [`HeapManager::allocate()`].
    ///
    /// # Errors
    ///
    /// Same as [`HeapManager::allocate()`].
    pub fn allocate(&self, size: u32) -> Result<Option<SharedMemoryDescriptor>, HeapError> {
        let mut core = self.core.lock().expect("SharedHeapManager mutex poisoned");
        Ok(core.allocate(size)?.map(|descriptor| SharedMemoryDescriptor {
            descriptor: Some(descriptor),
            core: Arc::clone(&self.core),
        }))
    }

    /// Whether any allocation has not yet been released.
    #[must_use]
    pub fn any_allocations(&self) -> bool {
        self.core
            .lock()
            .expect("SharedHeapManager mutex poisoned")
            .any_allocations()
    }

    /// Snapshot of the bookkeeping counters.
    #[must_use]
    pub fn statistics(&self) -> HeapStatistics {
        self.core
            .lock()
            .expect("SharedHeapManager mutex poisoned")
            .statistics()
    }
}

/// RAII allocation guard of a [`SharedHeapManager`].
///
/// Releases its block on drop and keeps the manager core alive until then. Only the
/// manager can construct these (the fields are private to this module), which pins
/// every descriptor to the manager that issued it.
#[derive(Debug)]
pub struct SharedMemoryDescriptor {
    /// `Some` until drop; taken exactly once.
    descriptor: Option<MemoryDescriptor>,
    core: Arc<Mutex<HeapManager>>,
}

impl SharedMemoryDescriptor {
    /// Start address of the allocated block.
    #[must_use]
    pub fn start_address(&self) -> u32 {
        self.descriptor
            .as_ref()
            .expect("descriptor present until drop")
            .start_address()
    }

    /// Size of the allocated block in byte.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.descriptor
            .as_ref()
            .expect("descriptor present until drop")
            .size()
    }
}

impl Drop for SharedMemoryDescriptor {
    fn drop(&mut self) {
        if let Some(descriptor) = self.descriptor.take() {
            if let Ok(mut core) = self.core.lock() {
                // Cannot fail: the guard is the only holder of this descriptor.
                let _unused = core.release(descriptor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn shared_heap() -> SharedHeapManager {
        SharedHeapManager::new(HeapConfig {
            minimum_alignment: 4,
            base_address: 0,
            size: 1024,
            max_size_in_first_bucket: 8,
            nb_of_buckets: 7,
        })
        .unwrap()
    }

    #[test]
    fn dropping_the_guard_releases_the_block() {
        let mgr = shared_heap();

        let guard = mgr.allocate(100).unwrap().unwrap();
        assert!(mgr.any_allocations());
        assert_eq!(guard.size(), 100);

        drop(guard);
        assert!(!mgr.any_allocations());
        assert_eq!(mgr.statistics().nb_of_free_blocks, 1);
    }

    #[test]
    fn descriptors_keep_the_manager_core_alive() {
        let guard = {
            let mgr = shared_heap();
            mgr.allocate(64).unwrap().unwrap()
        };
        // The manager handle is gone; the guard still works and its drop still
        // reaches the core.
        assert_eq!(guard.start_address(), 0);
        drop(guard);
    }

    #[test]
    fn concurrent_allocate_release_is_serialized() {
        let mgr = shared_heap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mgr = mgr.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        if let Some(guard) = mgr.allocate(16).unwrap() {
                            drop(guard);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!mgr.any_allocations());
        let stats = mgr.statistics();
        assert_eq!(stats.nb_of_free_blocks, 1);
        assert_eq!(stats.total_free_space, 1024);
    }
}
