// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot sweeps for external schedulers (`tether sweep ...`).

use serde_json::Value;
use tether_config::TetherConfig;
use tether_core::TetherError;
use tracing::info;

use crate::serve::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SweepKind {
    Reactivation,
    FollowUps,
}

/// Runs one sweep and returns its summary as JSON.
pub async fn run_sweep(config: &TetherConfig, kind: SweepKind) -> Result<Value, TetherError> {
    let services = Services::build(config).await?;
    let result = match kind {
        SweepKind::Reactivation => services
            .reactivator
            .run()
            .await
            .and_then(|summary| to_json(&summary)),
        SweepKind::FollowUps => services
            .follow_ups
            .run()
            .await
            .and_then(|summary| to_json(&summary)),
    };
    services.close().await;

    let summary = result?;
    info!(sweep = ?kind, %summary, "sweep finished");
    Ok(summary)
}

fn to_json<T: serde::Serialize>(summary: &T) -> Result<Value, TetherError> {
    serde_json::to_value(summary)
        .map_err(|e| TetherError::Internal(format!("failed to serialize sweep summary: {e}")))
}
