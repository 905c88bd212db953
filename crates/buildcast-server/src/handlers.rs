//! HTTP handlers for the Buildcast API.
//!
//! The build endpoint serves two kinds of peers on the same path. A
//! request carrying a `WebSocket` upgrade becomes a live viewer; anything
//! else is answered once with a JSON status snapshot and closed.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;

/// Response body for `GET /api/build`.
#[derive(Debug, Serialize)]
pub struct TargetList {
    /// Configured target names in sorted order.
    pub targets: Vec<String>,
    /// Number of targets.
    pub count: usize,
}

/// Serve a minimal HTML page linking every build target.
///
/// # Route
///
/// `GET /`
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut items = String::new();
    for name in state.target_names() {
        let _ = writeln!(
            items,
            r#"        <li><a href="/api/build/{name}">{name}</a></li>"#
        );
    }
    if items.is_empty() {
        items.push_str("        <li>No build targets configured.</li>\n");
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Buildcast</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.25rem 0; }}
    </style>
</head>
<body>
    <h1>Buildcast</h1>
    <p class="subtitle">Live build logs. Connect a WebSocket to a target to follow its build.</p>
    <ul>
{items}    </ul>
</body>
</html>"#
    ))
}

/// List configured build targets.
///
/// # Route
///
/// `GET /api/build`
pub async fn list_targets(State(state): State<Arc<AppState>>) -> Json<TargetList> {
    let targets: Vec<String> = state.target_names().map(str::to_owned).collect();
    let count = targets.len();
    Json(TargetList { targets, count })
}

/// Viewer or status request without a connection parameter.
///
/// # Route
///
/// `GET /api/build/{name}`
pub async fn build(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    serve_build(upgrade, &state, &name, String::new()).await
}

/// Viewer or status request with a connection parameter.
///
/// The parameter `build` restarts a finished build.
///
/// # Route
///
/// `GET /api/build/{name}/{parameter}`
pub async fn build_with_parameter(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
    Path((name, parameter)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_build(upgrade, &state, &name, parameter).await
}

async fn serve_build(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    state: &AppState,
    name: &str,
    parameter: String,
) -> Result<Response, ApiError> {
    let controller = state
        .target(name)
        .cloned()
        .ok_or_else(|| ApiError::UnknownTarget(name.to_owned()))?;

    if let Ok(upgrade) = upgrade {
        return Ok(upgrade
            .on_upgrade(move |socket| ws::run_viewer(socket, controller, parameter))
            .into_response());
    }

    let reply = controller.request(parameter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, reply.content_type),
            (header::CONNECTION, String::from("close")),
        ],
        reply.body,
    )
        .into_response())
}
