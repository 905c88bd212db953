//! Integration tests for the Buildcast HTTP endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Build processes are scripted, so each test
//! controls exactly what output a build produces.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use buildcast_core::testing::ScriptedLauncher;
use buildcast_core::{spawn_controller, BuildCommand, ProcessEvent, ProcessLauncher};
use buildcast_server::router::build_router;
use buildcast_server::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

fn script() -> Vec<ProcessEvent> {
    vec![
        ProcessEvent::Output(String::from("compiling\nlink")),
        ProcessEvent::Output(String::from("ing\ndone")),
        ProcessEvent::Exited { code: 2 },
    ]
}

fn make_app(launcher: Arc<ScriptedLauncher>) -> Router {
    let mut state = AppState::new();
    for name in ["ccws", "docs"] {
        let launcher: Arc<dyn ProcessLauncher> = Arc::<ScriptedLauncher>::clone(&launcher);
        let (handle, _task) = spawn_controller(name, BuildCommand::new("make", [name]), launcher);
        state.insert(handle);
    }
    build_router(Arc::new(state))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn first_status_request_starts_build() {
    let launcher = Arc::new(ScriptedLauncher::with_script(script()));
    let app = make_app(Arc::clone(&launcher));

    let (status, content_type, body) = get(&app, "/api/build/ccws").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/json; charset=utf-8"));
    assert_eq!(
        body,
        r#"{"status":"running","currentLine":"","exitCode":null,"log":[]}"#
    );
    assert_eq!(launcher.launches(), vec![BuildCommand::new("make", ["ccws"])]);
}

#[tokio::test]
async fn later_status_request_sees_finished_build() {
    let launcher = Arc::new(ScriptedLauncher::with_script(script()));
    let app = make_app(Arc::clone(&launcher));

    get(&app, "/api/build/ccws").await;
    let (status, json) = get_json(&app, "/api/build/ccws").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["exitCode"], 2);
    assert_eq!(json["currentLine"], "done");
    assert_eq!(json["log"], serde_json::json!(["compiling", "linking"]));
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn build_parameter_restarts_finished_build() {
    let launcher = Arc::new(ScriptedLauncher::with_script(script()));
    let app = make_app(Arc::clone(&launcher));

    get(&app, "/api/build/ccws").await;
    let (_, json) = get_json(&app, "/api/build/ccws/build").await;

    assert_eq!(json["status"], "running");
    assert_eq!(json["log"], serde_json::json!([]));
    assert_eq!(launcher.launches().len(), 2);
}

#[tokio::test]
async fn other_parameters_do_not_restart() {
    let launcher = Arc::new(ScriptedLauncher::with_script(script()));
    let app = make_app(Arc::clone(&launcher));

    get(&app, "/api/build/ccws").await;
    let (_, json) = get_json(&app, "/api/build/ccws/watch").await;

    assert_eq!(json["status"], "stopped");
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn targets_are_independent() {
    let launcher = Arc::new(ScriptedLauncher::with_script(script()));
    let app = make_app(Arc::clone(&launcher));

    get(&app, "/api/build/ccws").await;
    let (_, json) = get_json(&app, "/api/build/docs").await;

    assert_eq!(json["status"], "running");
    assert_eq!(
        launcher.launches(),
        vec![
            BuildCommand::new("make", ["ccws"]),
            BuildCommand::new("make", ["docs"]),
        ]
    );
}

#[tokio::test]
async fn launch_failure_reports_stopped_with_diagnostic() {
    let app = make_app(Arc::new(ScriptedLauncher::failing()));

    let (status, json) = get_json(&app, "/api/build/ccws").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["exitCode"], -1);
    let log = json["log"].as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].as_str().unwrap().starts_with("failed to start build:"));
}

#[tokio::test]
async fn unknown_target_is_not_found() {
    let launcher = Arc::new(ScriptedLauncher::new());
    let app = make_app(Arc::clone(&launcher));

    let (status, json) = get_json(&app, "/api/build/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("nope"));
    assert!(launcher.launches().is_empty());
}

#[tokio::test]
async fn list_targets_returns_sorted_names() {
    let app = make_app(Arc::new(ScriptedLauncher::new()));

    let (status, json) = get_json(&app, "/api/build").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["targets"], serde_json::json!(["ccws", "docs"]));
}

#[tokio::test]
async fn index_links_targets() {
    let app = make_app(Arc::new(ScriptedLauncher::new()));

    let (status, content_type, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(body.contains(r#"href="/api/build/ccws""#));
    assert!(body.contains(r#"href="/api/build/docs""#));
}
