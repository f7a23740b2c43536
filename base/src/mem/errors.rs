// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error type of the heap manager: [`HeapError`].

/// Failures of [`HeapManager`] and [`SharedHeapManager`] operations.
///
/// All mutating operations provide the strong guarantee: on `Err`, the manager's
/// internal state is unchanged.
///
/// [`HeapManager`]: super::HeapManager
/// [`SharedHeapManager`]: super::SharedHeapManager
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HeapError {
    /// A construction parameter violates its constraints (see [`HeapConfig`]).
    ///
    /// [`HeapConfig`]: super::HeapConfig
    #[error("Invalid heap manager configuration: {param} {reason}")]
    #[diagnostic(code(r3bl_base::mem::invalid_config))]
    InvalidConfig {
        /// Name of the offending parameter.
        param: &'static str,
        /// Which constraint it violates.
        reason: &'static str,
    },

    /// `allocate(0)` was called. Zero-sized allocations are meaningless here.
    #[error("Allocation size must be larger than zero")]
    #[diagnostic(code(r3bl_base::mem::zero_size))]
    ZeroSize,

    /// The descriptor does not refer to a live allocation of this manager - it is
    /// stale (its block was already released and the slot recycled) or belongs to a
    /// different manager instance.
    #[error("Memory descriptor does not refer to a live allocation of this manager")]
    #[diagnostic(
        code(r3bl_base::mem::stale_descriptor),
        help("Each descriptor may be released exactly once, at the manager it came from.")
    )]
    StaleDescriptor,

    /// The descriptor's block is already free (double release).
    #[error("Memory descriptor was already released")]
    #[diagnostic(code(r3bl_base::mem::double_release))]
    AlreadyReleased,

    /// The *host* heap could not grow the descriptor store. This is about the
    /// process's own memory, not the managed address window.
    #[error("Host heap exhausted while growing the descriptor store")]
    #[diagnostic(code(r3bl_base::mem::out_of_host_memory))]
    OutOfHostMemory,
}
