// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tether integration tests.
//!
//! Provides mock adapters and harness infrastructure for fast, deterministic
//! tests without a messaging network.
//!
//! # Components
//!
//! - [`MemoryStore`] - in-memory `ConversationStore` with atomic transitions
//! - [`MockChannel`] - captures sends, injectable connection state and failures
//! - [`ManualClock`] - time that moves only when told to
//! - [`TestHarness`] - engine, bus, store, channel, and clock wired together

pub mod clock;
pub mod harness;
pub mod memory_store;
pub mod mock_channel;

pub use clock::ManualClock;
pub use harness::{INSTANCE, TENANT, TestHarness, TestHarnessBuilder, default_start};
pub use memory_store::MemoryStore;
pub use mock_channel::{MockChannel, SentMessage};
