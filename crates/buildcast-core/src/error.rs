//! Error types shared across the build-log engine.
//!
//! Configuration errors live next to the loader in [`crate::config`].

/// A client handle refused a send because its connection is gone.
///
/// Never fatal: the [`Broadcaster`](crate::broadcaster::Broadcaster)
/// swallows it and keeps delivering to the remaining subscribers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The outbound side of the connection has been closed.
    #[error("client connection closed")]
    Closed,
}

/// Errors raised while launching a build process.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The operating system refused to spawn the command.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// The program that could not be spawned.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stdio pipe requested at spawn time was not available.
    #[error("missing {stream} pipe for `{program}`")]
    MissingPipe {
        /// The program that was spawned.
        program: String,
        /// Which stream was missing (`stdout` or `stderr`).
        stream: &'static str,
    },

    /// The controller dispatch loop is gone, so process events would
    /// have nowhere to go.
    #[error("controller dispatch loop has shut down")]
    ControllerGone,
}

/// Errors returned by [`ControllerHandle`](crate::controller::ControllerHandle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// The dispatch task has exited and no longer accepts events.
    #[error("session controller for `{0}` is no longer running")]
    Unavailable(String),
}
