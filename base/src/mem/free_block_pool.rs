// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Size-class buckets for free blocks: [`FreeBlockPool`].

use super::{DescriptorPool, SlotIndex};
use smallvec::SmallVec;

/// Upper bound on the number of buckets a heap manager may be configured with.
pub const MAX_BUCKETS: usize = 24;

/// Segregated free-list: free blocks binned into geometrically growing size classes.
///
/// With first-bucket maximum `m` and `n` buckets, bucket 0 holds blocks of size
/// `1..=m`, bucket `i` holds `(m << (i-1)) + 1 ..= m << i`, and the last bucket
/// holds everything larger. Within a bucket, blocks are chained LIFO through their
/// slot's bucket links (newest at the head).
///
/// Lookup ([`get()`]) starts at the bucket whose class could contain a fitting
/// block and scans it first-fit; on a miss it climbs to the next non-empty bucket,
/// where every block is guaranteed large enough, so the head is taken.
///
/// [`get()`]: Self::get
#[derive(Debug)]
pub(crate) struct FreeBlockPool {
    max_size_in_first_bucket: u32,
    /// Head of each bucket's LIFO chain.
    buckets: SmallVec<[Option<SlotIndex>; MAX_BUCKETS]>,
}

impl FreeBlockPool {
    /// Creates an empty pool. Parameter validation is the heap manager's job.
    pub fn new(max_size_in_first_bucket: u32, nb_of_buckets: usize) -> Self {
        Self {
            max_size_in_first_bucket,
            buckets: smallvec::smallvec![None; nb_of_buckets],
        }
    }

    /// Index of the bucket whose size class covers `size`.
    pub fn bucket_index(&self, size: u32) -> usize {
        let mut max_size_in_current_bucket = u64::from(self.max_size_in_first_bucket);
        let mut index = 1;

        while index < self.buckets.len() && u64::from(size) > max_size_in_current_bucket {
            max_size_in_current_bucket <<= 1;
            index += 1;
        }

        index - 1
    }

    /// Puts a block into its bucket (at the head) and marks it free.
    pub fn add(&mut self, pool: &mut DescriptorPool, index: SlotIndex) {
        let bucket = self.bucket_index(pool.slot(index).size);
        let old_head = self.buckets[bucket];

        {
            let slot = pool.slot_mut(index);
            slot.free = true;
            slot.prev_in_list = None;
            slot.next_in_list = old_head;
        }
        if let Some(old_head) = old_head {
            pool.slot_mut(old_head).prev_in_list = Some(index);
        }
        self.buckets[bucket] = Some(index);
    }

    /// Takes a specific block out of its bucket and marks it used.
    ///
    /// The block must currently be in this pool.
    pub fn remove(&mut self, pool: &mut DescriptorPool, index: SlotIndex) {
        let bucket = self.bucket_index(pool.slot(index).size);
        self.unlink(pool, index, bucket);
        pool.slot_mut(index).free = false;
    }

    /// First-fit lookup: takes a free block of at least `minimum_required_size` out
    /// of the pool, or returns [`None`] if no bucket yields a fit.
    pub fn get(&mut self, pool: &mut DescriptorPool, minimum_required_size: u32) -> Option<SlotIndex> {
        let mut bucket = self.bucket_index(minimum_required_size);
        let mut candidate = self.buckets[bucket];

        let found = loop {
            // Climb to a bucket that has blocks at all.
            while candidate.is_none() {
                bucket += 1;
                if bucket >= self.buckets.len() {
                    return None;
                }
                candidate = self.buckets[bucket];
            }

            // Scan this bucket for a block that actually fits. In any bucket above
            // the starting one, the very first block already does.
            while let Some(index) = candidate {
                if pool.slot(index).size >= minimum_required_size {
                    break;
                }
                candidate = pool.slot(index).next_in_list;
            }

            if let Some(index) = candidate {
                break index;
            }
        };

        self.unlink(pool, found, bucket);
        pool.slot_mut(found).free = false;
        Some(found)
    }

    fn unlink(&mut self, pool: &mut DescriptorPool, index: SlotIndex, bucket: usize) {
        let (prev, next) = {
            let slot = pool.slot(index);
            (slot.prev_in_list, slot.next_in_list)
        };

        if self.buckets[bucket] == Some(index) {
            self.buckets[bucket] = next;
        }
        if let Some(prev) = prev {
            pool.slot_mut(prev).next_in_list = next;
        }
        if let Some(next) = next {
            pool.slot_mut(next).prev_in_list = prev;
        }

        let slot = pool.slot_mut(index);
        slot.prev_in_list = None;
        slot.next_in_list = None;
    }
}
