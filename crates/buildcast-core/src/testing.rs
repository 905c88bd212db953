//! In-memory doubles for exercising the engine without sockets or processes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::broadcaster::{Client, ClientId};
use crate::error::{LaunchError, SendError};
use crate::process::{BuildCommand, EventSink, ProcessEvent, ProcessHandle, ProcessLauncher};

/// A [`Client`] that records everything sent to it.
#[derive(Debug)]
pub struct RecordingClient {
    id: ClientId,
    parameter: String,
    sent: Mutex<Vec<String>>,
    content_type: Mutex<Option<String>>,
    closed: AtomicBool,
    disconnected: AtomicBool,
}

impl RecordingClient {
    /// Create a client connected with `parameter`.
    pub fn new(parameter: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ClientId::new(),
            parameter: parameter.to_owned(),
            sent: Mutex::new(Vec::new()),
            content_type: Mutex::new(None),
            closed: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        })
    }

    /// Everything successfully sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make every later send fail, as if the socket had gone away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`Client::disconnect`] has been called.
    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// The content type set through [`Client::set_content_type`], if any.
    pub fn content_type(&self) -> Option<String> {
        self.content_type
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Client for RecordingClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn parameter(&self) -> &str {
        &self.parameter
    }

    fn send(&self, text: &str) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_owned());
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Release);
        self.close();
    }

    fn set_content_type(&self, content_type: &str) {
        *self.content_type.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(content_type.to_owned());
    }
}

/// A [`ProcessLauncher`] that records launches and replays a fixed script.
///
/// Scripted events are queued on the sink during `launch`, so the
/// controller sees them after the event that triggered the launch.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    script: Vec<ProcessEvent>,
    fail: bool,
    launches: Mutex<Vec<BuildCommand>>,
}

impl ScriptedLauncher {
    /// A launcher whose processes stay silent and never exit on their own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher that emits `script` for every launch.
    pub fn with_script(script: Vec<ProcessEvent>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// A launcher whose every launch fails to spawn.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every command passed to `launch`, including failed attempts.
    pub fn launches(&self) -> Vec<BuildCommand> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, command: &BuildCommand, sink: EventSink) -> Result<ProcessHandle, LaunchError> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        if self.fail {
            return Err(LaunchError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            });
        }

        for event in &self.script {
            sink.emit(event.clone());
        }
        Ok(ProcessHandle::default())
    }
}
