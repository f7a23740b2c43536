// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Scenario tests for the deferred work queue, driven through a real
//! [`WorkQueueThread`](super::WorkQueueThread).
