// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives the gateway router in-process against a test harness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use tether_gateway::{AuthConfig, GatewayState, build_router};
use tether_test_utils::{INSTANCE, TENANT, TestHarness};

const TOKEN: &str = "op-token";
const SCHEDULER: &str = "cron-token";

fn router(h: &TestHarness) -> Router {
    build_router(GatewayState {
        engine: h.engine.clone(),
        reactivator: Arc::new(h.reactivator()),
        follow_ups: Arc::new(h.follow_ups()),
        auth: AuthConfig {
            bearer_token: Some(TOKEN.into()),
            scheduler_token: Some(SCHEDULER.into()),
        },
        keep_alive: Duration::from_secs(15),
        start_time: Instant::now(),
    })
}

fn request(method: &str, uri: &str, body: Option<Value>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("x-tenant-id", TENANT);
    match body {
        Some(_) => builder.header("content-type", "application/json"),
        None => builder,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let payload = body.clone().map_or_else(Body::empty, |b| Body::from(b.to_string()));
    send(app, request(method, uri, body).body(payload).unwrap()).await
}

async fn call_as(
    app: &Router,
    operator: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let payload = body.clone().map_or_else(Body::empty, |b| Body::from(b.to_string()));
    let req = request(method, uri, body)
        .header("x-operator-id", operator)
        .body(payload)
        .unwrap();
    send(app, req).await
}

#[tokio::test]
async fn health_is_public() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["channel"], "healthy");
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);

    let req = Request::builder()
        .uri("/v1/teams")
        .header("x-tenant-id", TENANT)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/v1/teams")
        .header("authorization", "Bearer wrong")
        .header("x-tenant-id", TENANT)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let req = Request::builder()
        .uri("/v1/conversations")
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn duplicate_team_name_conflicts() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let team = json!({"name": "support", "assignment_mode": "round_robin", "auto_assign": true});

    let (status, created) = call(&app, "POST", "/v1/teams", Some(team.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "support");

    let (status, body) = call(&app, "POST", "/v1/teams", Some(team)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn inbound_webhook_transfers_to_operator() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", tether_core::AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();
    let app = router(&h);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/channel/inbound",
        Some(json!({
            "tenant_id": TENANT,
            "instance_id": INSTANCE,
            "contact_address": "+5511",
            "content": "talk to a human"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
    assert_eq!(body["transfer"]["outcome"], "assigned");
    assert_eq!(body["transfer"]["operator_id"], "op-1");

    let id = body["conversation"]["id"].as_str().unwrap().to_string();
    let (status, conversation) = call(&app, "GET", &format!("/v1/conversations/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation["status"], "OPEN");
    assert_eq!(conversation["is_bot"], false);

    let (status, listed) = call(&app, "GET", "/v1/conversations?status=open&is_bot=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn operator_actions_need_operator_header() {
    let h = TestHarness::new().await.unwrap();
    h.enable_bot(&[], None).await.unwrap();
    let conversation = h.inbound("+1", "hi").await.unwrap().conversation;
    let app = router(&h);
    let uri = format!("/v1/conversations/{}/bot/disable", conversation.id);

    let (status, _) = call(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call_as(&app, "op-1", "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned_operator_id"], "op-1");

    // A second takeover is an invalid transition.
    let (status, body) = call_as(&app, "op-2", "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn empty_operator_message_is_unprocessable() {
    let h = TestHarness::new().await.unwrap();
    h.enable_bot(&[], None).await.unwrap();
    let conversation = h.inbound("+1", "hi").await.unwrap().conversation;
    h.engine.disable_bot(TENANT, &conversation.id, "op-1").await.unwrap();
    let app = router(&h);

    let uri = format!("/v1/conversations/{}/messages", conversation.id);
    let (status, body) = call_as(&app, "op-1", "POST", &uri, Some(json!({"content": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let (status, message) =
        call_as(&app, "op-1", "POST", &uri, Some(json!({"content": "Hello!"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["content"], "Hello!");
    assert_eq!(h.channel.sent_to("+1").await.len(), 1);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let (status, body) = call(&app, "GET", "/v1/conversations/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn sweeps_use_scheduler_token() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);

    let (status, _) = call(&app, "POST", "/v1/sweeps/reactivation", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/sweeps/reactivation")
        .header("authorization", format!("Bearer {SCHEDULER}"))
        .body(Body::empty())
        .unwrap();
    let (status, summary) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary, json!({"found": 0, "processed": 0, "errors": 0}));

    let req = Request::builder()
        .method("POST")
        .uri("/v1/sweeps/follow-ups")
        .header("authorization", format!("Bearer {SCHEDULER}"))
        .body(Body::empty())
        .unwrap();
    let (status, summary) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["rules"], 0);
}

#[tokio::test]
async fn invalid_follow_up_template_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let rule = json!({
        "name": "nudge",
        "enabled": true,
        "trigger": {"type": "inactivity", "hours": 24},
        "action": {"type": "send_message", "template": "Hi {{ contact_name ", "exclusive": false},
        "max_attempts": 2,
        "scope": "any"
    });
    let (status, body) = call(&app, "POST", "/v1/follow-up-rules", Some(rule)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn event_stream_opens_as_sse() {
    let h = TestHarness::new().await.unwrap();
    let app = router(&h);
    let req = request("GET", "/v1/events?last_event_id=0", None)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "got {content_type}");
}

#[tokio::test]
async fn inbound_webhook_accepts_message_when_handoff_fails() {
    let h = TestHarness::new().await.unwrap();
    let mut bot = tether_core::model::BotConfig::disabled(TENANT, INSTANCE);
    bot.enabled = true;
    bot.transfer_keywords = vec!["human".into()];
    bot.transfer_team_id = Some("team-gone".into());
    tether_core::ConversationStore::put_bot_config(h.store.as_ref(), bot)
        .await
        .unwrap();
    let app = router(&h);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/channel/inbound",
        Some(json!({
            "tenant_id": TENANT,
            "instance_id": INSTANCE,
            "contact_address": "+5511",
            "content": "a human please"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["content"], "a human please");
    assert_eq!(body["handoff_error"]["error"], "not_found");
    assert!(body["transfer"].is_null());
}
