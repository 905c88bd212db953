//! Core build-log broadcast engine for Buildcast.
//!
//! This crate supervises a single long-running build subprocess per
//! build target, keeps the transcript of its output for the lifetime of
//! the session, and fans new output out to every connected viewer. Viewers
//! that join mid-build are first replayed the transcript so far.
//!
//! # Architecture
//!
//! ```text
//! viewer events ──┐
//!                 ├──> ControllerHandle ──> dispatch task ──> SessionController
//! process output ─┘        (mpsc)                              ├─ BuildSession (+ LineBuffer)
//!                                                              └─ Broadcaster ──> Client::send
//! ```
//!
//! Every event for a target (viewer connect, disconnect, message, one-shot
//! status request, and process output) is serialized through one Tokio
//! task that exclusively owns the [`SessionController`]. No locks guard
//! the transcript or the subscriber set; the single consumer is the
//! guarantee.
//!
//! [`SessionController`]: controller::SessionController

pub mod broadcaster;
pub mod config;
pub mod controller;
pub mod error;
pub mod line_buffer;
pub mod process;
pub mod session;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export primary types for convenience.
pub use broadcaster::{Broadcaster, Client, ClientId};
pub use config::{BuildcastConfig, ConfigError, ServerSettings, TargetConfig, DEFAULT_CONFIG_PATH};
pub use controller::{
    spawn_controller, ControllerEvent, ControllerHandle, SessionController, BUILD_PARAMETER,
    REBUILD_MESSAGE, SEPARATOR_BANNER,
};
pub use error::{ControllerError, LaunchError, SendError};
pub use line_buffer::LineBuffer;
pub use process::{
    BuildCommand, EventSink, ProcessEvent, ProcessHandle, ProcessLauncher, TokioLauncher,
    EXIT_CODE_UNKNOWN,
};
pub use session::{BuildSession, Generation, SessionState};
pub use status::{RunStatus, StatusReply, StatusResponse, StatusSnapshot, STATUS_CONTENT_TYPE};
