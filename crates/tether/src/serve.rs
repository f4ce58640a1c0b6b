// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Implementation of `tether serve` and the shared service wiring.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tether_bridge::HttpChannel;
use tether_bus::EventBus;
use tether_config::TetherConfig;
use tether_core::{
    ChannelAdapter, Clock, ConversationStore, StorageAdapter, SystemClock, TetherError,
};
use tether_engine::{ConversationEngine, FollowUpEngine, InactivityReactivator};
use tether_gateway::{AuthConfig, GatewayState, ServerConfig, start_server};
use tether_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::shutdown;

/// Builds the `RUST_LOG`-style default filter for a configured level.
pub fn default_filter(log_level: &str) -> String {
    format!("tether={log_level},warn")
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over the config level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    // A second init (tests, repeated calls) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Everything a running service needs, wired from one config.
pub struct Services {
    pub storage: Arc<SqliteStorage>,
    pub engine: Arc<ConversationEngine>,
    pub reactivator: Arc<InactivityReactivator>,
    pub follow_ups: Arc<FollowUpEngine>,
}

impl Services {
    /// Opens storage, runs migrations, and builds the engine stack.
    pub async fn build(config: &TetherConfig) -> Result<Self, TetherError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let channel: Arc<dyn ChannelAdapter> = Arc::new(HttpChannel::new(&config.channel)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bus = Arc::new(EventBus::new(&config.events, clock.clone()));
        let store: Arc<dyn ConversationStore> = storage.clone();

        let engine = Arc::new(ConversationEngine::new(
            store,
            channel,
            bus,
            config.routing.clone(),
            clock,
        ));
        let reactivator = Arc::new(InactivityReactivator::new(
            engine.clone(),
            config.reactivation.clone(),
        ));
        let follow_ups = Arc::new(FollowUpEngine::new(
            engine.clone(),
            config.follow_up.clone(),
        ));

        Ok(Self {
            storage,
            engine,
            reactivator,
            follow_ups,
        })
    }

    pub async fn close(&self) {
        if let Err(e) = self.storage.close().await {
            error!(error = %e, "failed to close storage");
        }
    }
}

/// Runs the service until SIGINT or SIGTERM.
pub async fn run_serve(config: TetherConfig) -> Result<(), TetherError> {
    info!(name = %config.service.name, "starting tether");

    let services = Services::build(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let result = if config.gateway.enabled {
        let state = GatewayState {
            engine: services.engine.clone(),
            reactivator: services.reactivator.clone(),
            follow_ups: services.follow_ups.clone(),
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
                scheduler_token: config
                    .gateway
                    .effective_scheduler_token()
                    .map(str::to_string),
            },
            keep_alive: Duration::from_secs(config.gateway.keep_alive_secs),
            start_time: Instant::now(),
        };
        let server = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        start_server(&server, state, cancel.clone()).await
    } else {
        info!("gateway disabled, waiting for shutdown signal");
        wait_for(cancel.clone()).await;
        Ok(())
    };

    // A failed server stops the rest too.
    cancel.cancel();
    services.close().await;
    info!("tether stopped");
    result
}

async fn wait_for(token: CancellationToken) {
    token.cancelled().await;
}
