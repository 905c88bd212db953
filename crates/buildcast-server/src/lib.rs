//! HTTP and `WebSocket` surface for Buildcast.
//!
//! This crate exposes every configured build target over Axum:
//!
//! - **`WebSocket` viewers** (`GET /api/build/{name}[/{parameter}]` with an
//!   upgrade) are replayed the transcript so far and then receive build
//!   output live, one text frame per chunk. Sending the text `rebuild`
//!   after a build has finished starts a new one.
//! - **One-shot status requests** (the same path without an upgrade)
//!   return a JSON snapshot of the build and close.
//! - **Index endpoints** (`GET /`, `GET /api/build`) list the targets.
//!
//! # Architecture
//!
//! The server owns no build state. Each target's state lives in a
//! [`SessionController`] task from `buildcast-core`; handlers only adapt
//! sockets and requests into controller events via [`ControllerHandle`].
//!
//! [`SessionController`]: buildcast_core::SessionController
//! [`ControllerHandle`]: buildcast_core::ControllerHandle

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{serve, start_server, ServerError};
pub use state::AppState;
