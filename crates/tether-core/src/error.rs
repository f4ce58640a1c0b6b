// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tether conversation engine.

use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across all Tether adapter traits and engine operations.
#[derive(Debug, Error)]
pub enum TetherError {
    /// A requested state change violates the handoff invariants. Nothing was written.
    #[error("invalid transition for conversation {conversation_id}: {reason}")]
    InvalidTransition {
        conversation_id: String,
        reason: String,
    },

    /// The assignment router found no eligible team member.
    #[error("no available operator in team {team_id}")]
    NoAvailableOperator { team_id: String },

    /// The team does not route automatically; an operator must be picked by hand.
    #[error("team {team_id} requires manual assignment")]
    ManualAssignmentRequired { team_id: String },

    /// The messaging instance backing the conversation is not connected.
    #[error("channel {channel_id} is unavailable (state: {state})")]
    ChannelUnavailable { channel_id: String, state: String },

    /// A follow-up rule already used all of its attempts on a conversation.
    #[error("follow-up rule {rule_id} reached its attempt limit for conversation {conversation_id}")]
    AttemptLimitReached {
        rule_id: String,
        conversation_id: String,
    },

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The entity does not exist or belongs to another tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness or dependency constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request payload failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel transport errors (HTTP failure, rejected send).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable machine-readable error code, used in logs and API error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    NoAvailableOperator,
    ManualAssignmentRequired,
    ChannelUnavailable,
    AttemptLimitReached,
    ExternalStoreFailure,
    NotFound,
    Conflict,
    Validation,
    Config,
    Channel,
    Timeout,
    Internal,
}

impl TetherError {
    /// Returns the error code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TetherError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            TetherError::NoAvailableOperator { .. } => ErrorKind::NoAvailableOperator,
            TetherError::ManualAssignmentRequired { .. } => ErrorKind::ManualAssignmentRequired,
            TetherError::ChannelUnavailable { .. } => ErrorKind::ChannelUnavailable,
            TetherError::AttemptLimitReached { .. } => ErrorKind::AttemptLimitReached,
            TetherError::Storage { .. } => ErrorKind::ExternalStoreFailure,
            TetherError::NotFound { .. } => ErrorKind::NotFound,
            TetherError::Conflict(_) => ErrorKind::Conflict,
            TetherError::Validation(_) => ErrorKind::Validation,
            TetherError::Config(_) => ErrorKind::Config,
            TetherError::Channel { .. } => ErrorKind::Channel,
            TetherError::Timeout { .. } => ErrorKind::Timeout,
            TetherError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for an [`InvalidTransition`](TetherError::InvalidTransition).
    pub fn invalid_transition(conversation_id: &str, reason: impl Into<String>) -> Self {
        TetherError::InvalidTransition {
            conversation_id: conversation_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`NotFound`](TetherError::NotFound).
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        TetherError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_report_external_store_failure() {
        let err = TetherError::Storage {
            source: "disk full".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ExternalStoreFailure);
        assert_eq!(err.kind().to_string(), "external_store_failure");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn invalid_transition_message_names_conversation() {
        let err = TetherError::invalid_transition("conv-1", "already closed");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            err.to_string(),
            "invalid transition for conversation conv-1: already closed"
        );
    }
}
