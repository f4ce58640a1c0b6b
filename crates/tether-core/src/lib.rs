// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tether conversation engine.
//!
//! This crate provides the domain model, error taxonomy, and the adapter
//! traits (storage and channel) used throughout the Tether workspace.

pub mod clock;
pub mod error;
pub mod model;
pub mod traits;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::{ErrorKind, TetherError};
pub use types::{
    AdapterType, AssignmentMode, ConnectionState, ConversationStatus, DeliveryStatus, Direction,
    HandoffState, HealthStatus, MemberRole, MessageKind,
};

pub use traits::{ChannelAdapter, ConversationStore, PluginAdapter, SendReceipt, StorageAdapter};
