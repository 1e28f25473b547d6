// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routing and auth against a live engine.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use dmflow_engine::CommandRouter;
use dmflow_gateway::{AuthConfig, GatewayState, build_router};
use dmflow_test_utils::TestHarness;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_command(command: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/commands")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(command.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn start_command_runs_a_queue() {
    let harness = TestHarness::builder().with_contacts(2).build().await.unwrap();
    let app = build_router(GatewayState::new(harness.router.clone(), AuthConfig::default()));

    let response = app
        .clone()
        .oneshot(post_command(
            json!({
                "type": "START_QUEUE",
                "list_id": harness.list_id,
                "template_id": harness.template_id,
                "name": "From HTTP"
            }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["queue"]["total_tasks"], 2);
    assert_eq!(body["queue"]["status"], "running");

    harness.wait_until_idle().await;
    let response = app.oneshot(get("/v1/queue", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body.get("queue").is_none());

    harness.shutdown().await;
}

#[tokio::test]
async fn command_failure_is_a_200_with_error() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = build_router(GatewayState::new(harness.router.clone(), AuthConfig::default()));

    let response = app
        .oneshot(post_command(
            json!({"type": "START_QUEUE", "list_id": "nope", "template_id": "nope", "name": "x"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_command_type_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = build_router(GatewayState::new(harness.router.clone(), AuthConfig::default()));

    let response = app
        .oneshot(post_command(json!({"type": "REBOOT"}), None))
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    harness.shutdown().await;
}

#[tokio::test]
async fn detached_router_answers_503() {
    let router = CommandRouter::new(Duration::from_secs(1));
    let app = build_router(GatewayState::new(router, AuthConfig::default()));

    let response = app
        .clone()
        .oneshot(post_command(json!({"type": "GET_QUEUE_STATUS"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "engine not initialized");

    let health = body_json(app.oneshot(get("/health", None)).await.unwrap()).await;
    assert_eq!(health["status"], "starting");
}

#[tokio::test]
async fn bearer_token_guards_the_api_but_not_health() {
    let harness = TestHarness::builder().build().await.unwrap();
    let auth = AuthConfig {
        bearer_token: Some("s3cret".to_string()),
    };
    let app = build_router(GatewayState::new(harness.router.clone(), auth));

    let missing = app.clone().oneshot(get("/v1/queue", None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(get("/v1/queue", Some("guess")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .clone()
        .oneshot(post_command(json!({"type": "PAUSE_QUEUE"}), Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let health = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let body = body_json(health).await;
    assert_eq!(body["status"], "ok");

    harness.shutdown().await;
}
