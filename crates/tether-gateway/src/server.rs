// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use tether_core::TetherError;
use tether_engine::{ConversationEngine, FollowUpEngine, InactivityReactivator};

use crate::auth::{AuthConfig, operator_auth, scheduler_auth};
use crate::{admin, conversations, handlers, sse};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<ConversationEngine>,
    pub reactivator: Arc<InactivityReactivator>,
    pub follow_ups: Arc<FollowUpEngine>,
    pub auth: AuthConfig,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the full route tree.
///
/// - `GET /health` is public
/// - `/v1/sweeps/*` requires the scheduler token
/// - everything else under `/v1` requires the operator token
pub fn build_router(state: GatewayState) -> Router {
    let auth = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let sweep_routes = Router::new()
        .route("/v1/sweeps/reactivation", post(handlers::run_reactivation))
        .route("/v1/sweeps/follow-ups", post(handlers::run_follow_ups))
        .route_layer(axum_middleware::from_fn_with_state(
            auth.clone(),
            scheduler_auth,
        ))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/events", get(sse::stream_events))
        // teams and members
        .route("/v1/teams", get(admin::list_teams).post(admin::create_team))
        .route(
            "/v1/teams/{team_id}",
            get(admin::get_team)
                .patch(admin::update_team)
                .delete(admin::delete_team),
        )
        .route(
            "/v1/teams/{team_id}/members",
            get(admin::list_members).post(admin::add_member),
        )
        .route(
            "/v1/teams/{team_id}/members/{operator_id}",
            delete(admin::remove_member),
        )
        .route(
            "/v1/teams/{team_id}/members/{operator_id}/presence",
            put(admin::set_presence),
        )
        // follow-up rules
        .route(
            "/v1/follow-up-rules",
            get(admin::list_rules).post(admin::create_rule),
        )
        .route(
            "/v1/follow-up-rules/{rule_id}",
            delete(admin::delete_rule).patch(admin::set_rule_enabled),
        )
        // bot configuration
        .route(
            "/v1/instances/{instance_id}/bot",
            get(admin::get_bot_config).put(admin::put_bot_config),
        )
        // conversations
        .route(
            "/v1/conversations",
            get(conversations::list).post(conversations::start_outreach),
        )
        .route("/v1/conversations/{id}", get(conversations::get))
        .route("/v1/conversations/{id}/assign", post(conversations::assign))
        .route("/v1/conversations/{id}/transfer", post(conversations::transfer))
        .route("/v1/conversations/{id}/bot/enable", post(conversations::enable_bot))
        .route("/v1/conversations/{id}/bot/disable", post(conversations::disable_bot))
        .route("/v1/conversations/{id}/bot/reply", post(conversations::bot_reply))
        .route(
            "/v1/conversations/{id}/qualification",
            post(conversations::set_qualification),
        )
        .route("/v1/conversations/{id}/close", post(conversations::close))
        .route(
            "/v1/conversations/{id}/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .route("/v1/conversations/{id}/archive", post(conversations::archive))
        .route("/v1/conversations/{id}/tags", post(conversations::add_tag))
        .route(
            "/v1/conversations/{id}/tags/{tag}",
            delete(conversations::remove_tag),
        )
        .route("/v1/conversations/{id}/read", post(conversations::mark_read))
        // channel webhooks
        .route("/v1/channel/inbound", post(handlers::channel_inbound))
        .route("/v1/channel/status", post(handlers::channel_status))
        .route("/v1/channel/connection", post(handlers::channel_connection))
        .route("/v1/channel/typing", post(handlers::channel_typing))
        .route_layer(axum_middleware::from_fn_with_state(auth, operator_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(sweep_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), TetherError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TetherError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| TetherError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
