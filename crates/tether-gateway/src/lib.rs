// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Tether conversation engine.
//!
//! Exposes the operator API (teams, conversations, follow-up rules, bot
//! configuration), a per-tenant SSE event stream, scheduler-triggered sweeps,
//! and the webhooks the channel bridge posts inbound traffic to.

pub mod admin;
pub mod auth;
pub mod conversations;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, ServerConfig, build_router, start_server};
