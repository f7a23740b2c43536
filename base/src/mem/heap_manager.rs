// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The allocator core: [`HeapManager`], [`HeapConfig`].

use super::{DescriptorPool, FreeBlockPool, HeapError, HeapStatistics, MAX_BUCKETS,
            MemoryDescriptor};

/// Construction parameters for a [`HeapManager`].
///
/// All constraints are validated by [`HeapManager::new()`]; violations are
/// [`HeapError::InvalidConfig`].
///
/// # Example
///
/// ```
/// use r3bl_base::mem::{HeapConfig, HeapManager};
///
/// // 2 KiB window at address 0, 16-byte aligned, 5 buckets:
/// // 1..=32, 33..=64, 65..=128, 129..=256, >256 byte.
/// let mgr = HeapManager::new(HeapConfig {
///     minimum_alignment: 16,
///     base_address: 0,
///     size: 2048,
///     max_size_in_first_bucket: 32,
///     nb_of_buckets: 5,
/// })
/// .unwrap();
/// assert!(!mgr.any_allocations());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Minimum alignment for allocated block addresses. Must be a power of two, > 0.
    pub minimum_alignment: u32,
    /// Start of the managed window. Any value; never dereferenced. Must be aligned.
    pub base_address: u32,
    /// Size of the managed window in byte. Positive multiple of the alignment;
    /// `base_address + size` must fit the 32-bit address space.
    pub size: u32,
    /// Upper size bound of the first bucket. At least the alignment, at most `size`.
    pub max_size_in_first_bucket: u32,
    /// Number of size-class buckets, `1..=24`. For more than one bucket,
    /// `(1 << (n - 2)) * max_size_in_first_bucket` must stay below `size`.
    pub nb_of_buckets: usize,
}

/// Address-range allocator with segregated free lists.
///
/// Manages the window `[base, base + size)` purely as numbers - see the
/// [module docs](super) for the data model. Allocation rounds the requested size up
/// to the minimum alignment, takes a first-fit block from the size-class buckets and
/// splits off any remainder of at least one alignment unit. Release coalesces with
/// free address-space neighbors before re-binning the block.
///
/// Not internally synchronized: concurrent access needs external serialization or
/// the [`SharedHeapManager`](super::SharedHeapManager) wrapper.
#[derive(Debug)]
pub struct HeapManager {
    minimum_alignment: u32,
    base_address: u32,
    size: u32,
    pool: DescriptorPool,
    free_blocks: FreeBlockPool,
    statistics: HeapStatistics,
}

impl HeapManager {
    /// Creates a manager whose window is one single free block.
    ///
    /// # Errors
    ///
    /// [`HeapError::InvalidConfig`] if any [`HeapConfig`] constraint is violated,
    /// [`HeapError::OutOfHostMemory`] if the initial descriptor cannot be created.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        let HeapConfig {
            minimum_alignment,
            base_address,
            size,
            max_size_in_first_bucket,
            nb_of_buckets,
        } = config;

        if minimum_alignment == 0 || !minimum_alignment.is_power_of_two() {
            return Err(HeapError::InvalidConfig {
                param: "minimum_alignment",
                reason: "must be a power of two larger than zero",
            });
        }

        if base_address % minimum_alignment != 0 {
            return Err(HeapError::InvalidConfig {
                param: "base_address",
                reason: "must be aligned to the minimum alignment",
            });
        }

        if size < minimum_alignment || size % minimum_alignment != 0 {
            return Err(HeapError::InvalidConfig {
                param: "size",
                reason: "must be a positive multiple of the minimum alignment",
            });
        }

        // base + size may reach the very end of the 32-bit space, but not wrap.
        if (u32::MAX - size) + 1 < base_address {
            return Err(HeapError::InvalidConfig {
                param: "size",
                reason: "base_address + size exceeds the 32-bit address space",
            });
        }

        if max_size_in_first_bucket < minimum_alignment || max_size_in_first_bucket > size {
            return Err(HeapError::InvalidConfig {
                param: "max_size_in_first_bucket",
                reason: "must be within [minimum_alignment, size]",
            });
        }

        if nb_of_buckets < 1 || nb_of_buckets > MAX_BUCKETS {
            return Err(HeapError::InvalidConfig {
                param: "nb_of_buckets",
                reason: "must be within [1, 24]",
            });
        }
        if nb_of_buckets > 1
            && (1u64 << (nb_of_buckets - 2)) * u64::from(max_size_in_first_bucket)
                >= u64::from(size)
        {
            return Err(HeapError::InvalidConfig {
                param: "nb_of_buckets",
                reason: "geometric progression of bucket sizes must stay below size",
            });
        }

        let mut pool = DescriptorPool::default();
        let mut free_blocks = FreeBlockPool::new(max_size_in_first_bucket, nb_of_buckets);

        // The whole window starts out as one free block.
        let first = pool.get(base_address, size, true)?;
        free_blocks.add(&mut pool, first);

        Ok(Self {
            minimum_alignment,
            base_address,
            size,
            pool,
            free_blocks,
            statistics: HeapStatistics::new_for_empty_heap(size),
        })
    }

    /// Base address of the managed window.
    #[must_use]
    pub fn base_address(&self) -> u32 { self.base_address }

    /// Size of the managed window in byte.
    #[must_use]
    pub fn size(&self) -> u32 { self.size }

    /// Whether any allocation has not yet been released. O(1).
    #[must_use]
    pub fn any_allocations(&self) -> bool { self.statistics.nb_of_allocated_blocks != 0 }

    /// Snapshot of the bookkeeping counters. O(1).
    #[must_use]
    pub fn statistics(&self) -> HeapStatistics { self.statistics }

    /// Allocates at least `size` byte from the managed window.
    ///
    /// The effective size is `size` rounded up to the minimum alignment. If the
    /// taken free block is larger than that, the remainder (always at least one
    /// alignment unit) is split off, linked in as the address-space successor of
    /// the allocation, and re-binned.
    ///
    /// # Returns
    ///
    /// `Ok(Some(descriptor))` on success; `Ok(None)` if no free block fits
    /// (exhaustion of the *managed* window is not an error).
    ///
    /// # Errors
    ///
    /// [`HeapError::ZeroSize`] for `size == 0`; [`HeapError::OutOfHostMemory`] if a
    /// split needs a new descriptor and the host heap refuses (the manager state is
    /// unchanged in that case).
    pub fn allocate(&mut self, size: u32) -> Result<Option<MemoryDescriptor>, HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        // Round up to the alignment grid.
        let nb_of_units = (size - 1) / self.minimum_alignment + 1;
        let Some(size) = nb_of_units.checked_mul(self.minimum_alignment) else {
            return Ok(None);
        };

        let Some(block) = self.free_blocks.get(&mut self.pool, size) else {
            return Ok(None);
        };

        if self.pool.slot(block).size > size {
            // Split: keep the front for the allocation, re-bin the tail.
            let tail_start = self.pool.slot(block).start + size;
            let tail_size = self.pool.slot(block).size - size;
            let tail = match self.pool.get(tail_start, tail_size, true) {
                Ok(tail) => tail,
                Err(error) => {
                    // Strong guarantee: put the block back before failing.
                    self.free_blocks.add(&mut self.pool, block);
                    return Err(error);
                }
            };

            self.pool.insert_into_mem_list_behind(block, tail);
            self.pool.slot_mut(block).size = size;
            self.free_blocks.add(&mut self.pool, tail);
        } else {
            self.statistics.nb_of_free_blocks -= 1;
        }

        self.statistics.nb_of_allocated_blocks += 1;
        self.statistics.total_free_space -= size;
        self.statistics.total_used_space += size;

        let slot = self.pool.slot(block);
        Ok(Some(MemoryDescriptor {
            start: slot.start,
            size: slot.size,
            slot: block,
            generation: slot.generation,
        }))
    }

    /// Releases an allocation, coalescing with free address-space neighbors.
    ///
    /// # Errors
    ///
    /// [`HeapError::StaleDescriptor`] if the descriptor does not refer to a live
    /// slot of this manager; [`HeapError::AlreadyReleased`] if the block is already
    /// free. (A descriptor from a *different* manager whose slot/generation happens
    /// to collide cannot be told apart - passing descriptors between managers is a
    /// caller contract violation.)
    pub fn release(&mut self, descriptor: MemoryDescriptor) -> Result<(), HeapError> {
        let index = descriptor.slot;
        match self.pool.try_slot(index) {
            None => return Err(HeapError::StaleDescriptor),
            Some(slot) => {
                if !slot.live || slot.generation != descriptor.generation {
                    return Err(HeapError::StaleDescriptor);
                }
                if slot.free {
                    return Err(HeapError::AlreadyReleased);
                }
            }
        }

        let released_size = self.pool.slot(index).size;
        self.statistics.nb_of_free_blocks += 1;
        self.statistics.nb_of_allocated_blocks -= 1;
        self.statistics.total_free_space += released_size;
        self.statistics.total_used_space -= released_size;

        // Merge with the address-space predecessor.
        if let Some(prev) = self.pool.slot(index).prev_in_mem {
            if self.pool.slot(prev).free {
                self.free_blocks.remove(&mut self.pool, prev);

                let (prev_start, prev_size) = {
                    let prev_slot = self.pool.slot(prev);
                    (prev_slot.start, prev_slot.size)
                };
                let slot = self.pool.slot_mut(index);
                slot.start = prev_start;
                slot.size += prev_size;

                self.pool.remove_from_mem_list(prev);
                self.pool.recycle(prev);
                self.statistics.nb_of_free_blocks -= 1;
            }
        }

        // Merge with the address-space successor.
        if let Some(next) = self.pool.slot(index).next_in_mem {
            if self.pool.slot(next).free {
                self.free_blocks.remove(&mut self.pool, next);

                let next_size = self.pool.slot(next).size;
                self.pool.slot_mut(index).size += next_size;

                self.pool.remove_from_mem_list(next);
                self.pool.recycle(next);
                self.statistics.nb_of_free_blocks -= 1;
            }
        }

        self.free_blocks.add(&mut self.pool, index);
        Ok(())
    }
}
