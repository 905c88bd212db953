//! Point-in-time JSON status for one-shot polling clients.
//!
//! The controller renders a [`StatusSnapshot`] into the requesting
//! client: it sets the content type, sends the JSON body once, and
//! disconnects. [`StatusReply`] is the [`Client`] used for that exchange
//! when the caller wants the body back as a value.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::broadcaster::{Client, ClientId};
use crate::error::SendError;
use crate::session::BuildSession;

/// Content type of the status response body.
pub const STATUS_CONTENT_TYPE: &str = "text/json; charset=utf-8";

/// Coarse build status as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// A build process is running.
    Running,
    /// No build is running: either none was started or the last one exited.
    Stopped,
}

/// Snapshot of a build session, serialized as
/// `{"status", "currentLine", "exitCode", "log"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// `running` or `stopped`.
    pub status: RunStatus,
    /// Unterminated tail of the transcript.
    pub current_line: String,
    /// Exit code of the last build; `null` until it has terminated.
    pub exit_code: Option<i32>,
    /// Completed transcript lines in emission order.
    pub log: Vec<String>,
}

impl StatusSnapshot {
    /// Capture the state of `session` right now.
    pub fn capture(session: &BuildSession) -> Self {
        let status = if session.is_terminated() {
            RunStatus::Stopped
        } else {
            RunStatus::Running
        };
        let transcript = session.transcript();
        Self {
            status,
            current_line: transcript.current().to_owned(),
            exit_code: session.exit_code(),
            log: transcript.completed().to_vec(),
        }
    }

    /// Render the snapshot as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A rendered one-shot response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Content type set by the responder.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

impl StatusResponse {
    /// Parse the body back into a snapshot.
    pub fn snapshot(&self) -> Result<StatusSnapshot, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Default)]
struct ReplyState {
    content_type: String,
    body: String,
    done: Option<oneshot::Sender<StatusResponse>>,
}

/// One-shot [`Client`] that collects a response and hands it over on
/// disconnect.
#[derive(Debug)]
pub struct StatusReply {
    id: ClientId,
    parameter: String,
    state: Mutex<ReplyState>,
}

impl StatusReply {
    /// Create a reply client and the receiver that resolves on disconnect.
    pub fn new(parameter: impl Into<String>) -> (Arc<Self>, oneshot::Receiver<StatusResponse>) {
        let (tx, rx) = oneshot::channel();
        let reply = Arc::new(Self {
            id: ClientId::new(),
            parameter: parameter.into(),
            state: Mutex::new(ReplyState {
                done: Some(tx),
                ..ReplyState::default()
            }),
        });
        (reply, rx)
    }
}

impl Client for StatusReply {
    fn id(&self) -> ClientId {
        self.id
    }

    fn parameter(&self) -> &str {
        &self.parameter
    }

    fn set_content_type(&self, content_type: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        content_type.clone_into(&mut state.content_type);
    }

    fn send(&self, text: &str) -> Result<(), SendError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.done.is_none() {
            return Err(SendError::Closed);
        }
        state.body.push_str(text);
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = state.done.take() {
            let response = StatusResponse {
                content_type: std::mem::take(&mut state.content_type),
                body: std::mem::take(&mut state.body),
            };
            // The requester may have given up; nothing to do then.
            let _ = done.send(response);
        }
    }
}
