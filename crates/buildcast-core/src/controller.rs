//! Session state machine and its serialized dispatch loop.
//!
//! [`SessionController`] decides, for every inbound event, whether a new
//! build must start, replays the transcript to newly connected viewers,
//! and routes process output into both the transcript and the live
//! fan-out. It is owned by exactly one Tokio task (see
//! [`spawn_controller`]); everything else talks to it through a cloneable
//! [`ControllerHandle`] that posts [`ControllerEvent`]s onto an unbounded
//! queue. Process output rides the same queue, so events are handled one
//! at a time in arrival order and never interleave.
//!
//! # State machine
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | `NoSession` | any connect or status request | `Running` |
//! | `Terminated` | connect / request with parameter `build` | `Running` |
//! | `Terminated` | message `rebuild` | `Running` |
//! | `Running` | process exit | `Terminated(code)` |
//!
//! Nothing starts a build while one is running. That guard is the only
//! thing preventing double builds.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::broadcaster::{Broadcaster, Client, ClientId};
use crate::error::ControllerError;
use crate::process::{BuildCommand, EventSink, ProcessEvent, ProcessLauncher};
use crate::session::{BuildSession, Generation};
use crate::status::{StatusReply, StatusResponse, StatusSnapshot, STATUS_CONTENT_TYPE};

/// Line broadcast to current subscribers every time a build starts.
pub const SEPARATOR_BANNER: &str =
    "----------------------------- new build -----------------------------\n";

/// Viewer message that requests a rebuild.
pub const REBUILD_MESSAGE: &str = "rebuild";

/// Connection parameter that requests a fresh build on connect.
pub const BUILD_PARAMETER: &str = "build";

/// Everything the controller reacts to.
pub enum ControllerEvent {
    /// A viewer connected and wants replay plus live output.
    Connect(Arc<dyn Client>),
    /// A viewer's connection closed.
    Disconnect(ClientId),
    /// A viewer sent a text message.
    Message {
        /// The sending viewer.
        client: ClientId,
        /// Message payload.
        data: String,
    },
    /// A one-shot status request; the client is disconnected after one reply.
    Request(Arc<dyn Client>),
    /// Output or exit of a build process.
    Process {
        /// Session generation the process was launched under.
        generation: Generation,
        /// What the process reported.
        event: ProcessEvent,
    },
}

impl core::fmt::Debug for ControllerEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Connect(client) => f.debug_tuple("Connect").field(&client.id()).finish(),
            Self::Disconnect(id) => f.debug_tuple("Disconnect").field(id).finish(),
            Self::Message { client, data } => f
                .debug_struct("Message")
                .field("client", client)
                .field("data", data)
                .finish(),
            Self::Request(client) => f.debug_tuple("Request").field(&client.id()).finish(),
            Self::Process { generation, event } => f
                .debug_struct("Process")
                .field("generation", generation)
                .field("event", event)
                .finish(),
        }
    }
}

/// Owner of the build session, its transcript, and the subscriber set.
pub struct SessionController {
    target: String,
    command: BuildCommand,
    launcher: Arc<dyn ProcessLauncher>,
    events: mpsc::WeakUnboundedSender<ControllerEvent>,
    session: BuildSession,
    broadcaster: Broadcaster,
}

impl SessionController {
    /// Create a controller for `target`.
    ///
    /// `events` is the queue feeding this controller; launched processes
    /// report through it. Only a weak reference is kept, so the queue
    /// closes once every [`ControllerHandle`] and running process is gone.
    pub fn new(
        target: impl Into<String>,
        command: BuildCommand,
        launcher: Arc<dyn ProcessLauncher>,
        events: &mpsc::UnboundedSender<ControllerEvent>,
    ) -> Self {
        Self {
            target: target.into(),
            command,
            launcher,
            events: events.downgrade(),
            session: BuildSession::new(),
            broadcaster: Broadcaster::new(),
        }
    }

    /// Name of the build target this controller serves.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The current build session.
    pub const fn session(&self) -> &BuildSession {
        &self.session
    }

    /// The live subscriber set.
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Connect(client) => self.connect(client),
            ControllerEvent::Disconnect(id) => self.disconnect(id),
            ControllerEvent::Message { client, data } => self.message(client, &data),
            ControllerEvent::Request(client) => self.request(client.as_ref()),
            ControllerEvent::Process { generation, event } => self.process_event(generation, event),
        }
    }

    /// A viewer connected: maybe start a build, replay, then subscribe.
    ///
    /// Replay happens after any start triggered by this connect, so a
    /// viewer that forces a rebuild sees the fresh (empty) transcript.
    pub fn connect(&mut self, client: Arc<dyn Client>) {
        if self.should_start_for(client.parameter()) {
            self.start_build();
        }

        let (log, tail) = self.session.transcript().replay_parts();
        for part in [log, tail] {
            if let Err(e) = client.send(&part) {
                debug!(target_name = self.target, client = %client.id(), error = %e, "replay send failed");
            }
        }

        debug!(
            target_name = self.target,
            client = %client.id(),
            parameter = client.parameter(),
            "viewer connected"
        );
        self.broadcaster.add(client);
    }

    /// A viewer's connection closed.
    pub fn disconnect(&mut self, id: ClientId) {
        if self.broadcaster.remove(id) {
            debug!(target_name = self.target, client = %id, "viewer disconnected");
        }
    }

    /// A viewer sent `data`. Only `rebuild` after termination does anything.
    pub fn message(&mut self, client: ClientId, data: &str) {
        if data == REBUILD_MESSAGE && self.session.is_terminated() {
            info!(target_name = self.target, client = %client, "rebuild requested");
            self.start_build();
        } else {
            debug!(target_name = self.target, client = %client, "ignoring viewer message");
        }
    }

    /// A one-shot status request: maybe start a build, reply, disconnect.
    ///
    /// Uses the same start rule as [`connect`](Self::connect), and the
    /// snapshot is taken after any build it started, so a just-started
    /// build reports `running`.
    pub fn request(&mut self, client: &dyn Client) {
        if self.should_start_for(client.parameter()) {
            self.start_build();
        }

        client.set_content_type(STATUS_CONTENT_TYPE);
        match StatusSnapshot::capture(&self.session).to_json() {
            Ok(body) => {
                if let Err(e) = client.send(&body) {
                    debug!(target_name = self.target, client = %client.id(), error = %e, "status reply not delivered");
                }
            }
            Err(e) => error!(target_name = self.target, error = %e, "failed to render build status"),
        }
        client.disconnect();
    }

    /// Output or exit reported by a build process.
    pub fn process_event(&mut self, generation: Generation, event: ProcessEvent) {
        match event {
            ProcessEvent::Output(chunk) => {
                if self.session.record_output(generation, &chunk) {
                    self.broadcaster.send(&chunk);
                } else {
                    debug!(target_name = self.target, generation, "dropping output from replaced build");
                }
            }
            ProcessEvent::Exited { code } => {
                if self.session.mark_exited(generation, code) {
                    info!(target_name = self.target, generation, exit_code = code, "build finished");
                } else {
                    debug!(target_name = self.target, generation, "ignoring exit of replaced build");
                }
            }
        }
    }

    /// Drain `events` until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ControllerEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!(target_name = self.target, "session controller stopped");
    }

    fn should_start_for(&self, parameter: &str) -> bool {
        !self.session.has_started() || (parameter == BUILD_PARAMETER && self.session.is_terminated())
    }

    fn start_build(&mut self) {
        let events = self.events.clone();
        let result = self.session.start(self.launcher.as_ref(), &self.command, |generation| {
            events.upgrade().map(|tx| EventSink::new(generation, tx))
        });
        self.broadcaster.send(SEPARATOR_BANNER);

        match result {
            Ok(generation) => info!(
                target_name = self.target,
                program = self.command.program,
                generation,
                subscribers = self.broadcaster.len(),
                "build started"
            ),
            Err(e) => {
                error!(target_name = self.target, error = %e, "failed to start build");
                let line = format!("failed to start build: {e}\n");
                self.session.record_diagnostic(&line);
                self.broadcaster.send(&line);
            }
        }
    }
}

impl core::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionController")
            .field("target", &self.target)
            .field("command", &self.command)
            .field("session", &self.session)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

/// Cloneable entry point into a running [`SessionController`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    target: Arc<str>,
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    /// Name of the build target behind this handle.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Report a new viewer connection.
    pub fn connect(&self, client: Arc<dyn Client>) -> Result<(), ControllerError> {
        self.post(ControllerEvent::Connect(client))
    }

    /// Report a closed viewer connection.
    pub fn disconnect(&self, client: ClientId) -> Result<(), ControllerError> {
        self.post(ControllerEvent::Disconnect(client))
    }

    /// Report a viewer message.
    pub fn message(&self, client: ClientId, data: impl Into<String>) -> Result<(), ControllerError> {
        self.post(ControllerEvent::Message {
            client,
            data: data.into(),
        })
    }

    /// Report a one-shot request from an existing client handle.
    pub fn request_with(&self, client: Arc<dyn Client>) -> Result<(), ControllerError> {
        self.post(ControllerEvent::Request(client))
    }

    /// Make a one-shot status request and wait for the rendered reply.
    pub async fn request(&self, parameter: impl Into<String>) -> Result<StatusResponse, ControllerError> {
        let (reply, response) = StatusReply::new(parameter);
        self.request_with(reply)?;
        response.await.map_err(|_closed| self.unavailable())
    }

    fn post(&self, event: ControllerEvent) -> Result<(), ControllerError> {
        self.tx.send(event).map_err(|_closed| self.unavailable())
    }

    fn unavailable(&self) -> ControllerError {
        ControllerError::Unavailable(self.target.to_string())
    }
}

/// Spawn the dispatch task for one build target.
///
/// Must be called from within a Tokio runtime. The task exits once every
/// handle has been dropped and no build process is still reporting.
pub fn spawn_controller(
    target: impl Into<String>,
    command: BuildCommand,
    launcher: Arc<dyn ProcessLauncher>,
) -> (ControllerHandle, JoinHandle<()>) {
    let target: String = target.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(target.clone(), command, launcher, &tx);
    let task = tokio::spawn(controller.run(rx));
    let handle = ControllerHandle {
        target: Arc::from(target),
        tx,
    };
    (handle, task)
}
