//! One lifetime of the supervised build process and its transcript.

use crate::error::LaunchError;
use crate::line_buffer::LineBuffer;
use crate::process::{BuildCommand, EventSink, ProcessHandle, ProcessLauncher, EXIT_CODE_UNKNOWN};

/// Monotonic counter distinguishing successive build sessions.
///
/// Process events carry the generation they were launched under so that
/// anything arriving for a replaced session is dropped.
pub type Generation = u64;

/// Lifecycle of the build session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No build has been started yet.
    NoSession,
    /// A build process is running.
    Running,
    /// The last build process has exited.
    Terminated {
        /// Exit code reported by the process.
        exit_code: i32,
    },
}

/// The current build: process handle, termination state, and transcript.
///
/// At most one session is ever running. A new one may only begin when
/// [`is_terminated`](Self::is_terminated) holds.
#[derive(Debug)]
pub struct BuildSession {
    state: SessionState,
    generation: Generation,
    process: Option<ProcessHandle>,
    transcript: LineBuffer,
}

impl BuildSession {
    /// A session that has never been started.
    pub const fn new() -> Self {
        Self {
            state: SessionState::NoSession,
            generation: 0,
            process: None,
            transcript: LineBuffer::new(),
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Generation of the most recently started build (0 before any).
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether any build has been started.
    pub const fn has_started(&self) -> bool {
        !matches!(self.state, SessionState::NoSession)
    }

    /// Whether a new build may start.
    ///
    /// True before the first build as well as after an exit. Status
    /// reporting relies on this conflation: a never-started session
    /// reports `"stopped"` with no exit code.
    pub const fn is_terminated(&self) -> bool {
        !matches!(self.state, SessionState::Running)
    }

    /// Exit code of the last build, once it has terminated.
    pub const fn exit_code(&self) -> Option<i32> {
        match self.state {
            SessionState::Terminated { exit_code } => Some(exit_code),
            SessionState::NoSession | SessionState::Running => None,
        }
    }

    /// Handle of the current (or last) build process.
    pub const fn process(&self) -> Option<ProcessHandle> {
        self.process
    }

    /// The transcript of the current (or last) build.
    pub const fn transcript(&self) -> &LineBuffer {
        &self.transcript
    }

    /// Start a new build, replacing the previous session.
    ///
    /// The transcript is reset and the generation advanced before the
    /// launcher runs, so events of the old process can no longer land.
    /// On launch failure the session is left terminated with
    /// [`EXIT_CODE_UNKNOWN`] and the error is returned.
    pub fn start(
        &mut self,
        launcher: &dyn ProcessLauncher,
        command: &BuildCommand,
        sink: impl FnOnce(Generation) -> Option<EventSink>,
    ) -> Result<Generation, LaunchError> {
        self.generation = self.generation.wrapping_add(1);
        self.transcript.reset();
        self.process = None;

        let Some(sink) = sink(self.generation) else {
            self.state = SessionState::Terminated {
                exit_code: EXIT_CODE_UNKNOWN,
            };
            return Err(LaunchError::ControllerGone);
        };

        match launcher.launch(command, sink) {
            Ok(handle) => {
                self.process = Some(handle);
                self.state = SessionState::Running;
                Ok(self.generation)
            }
            Err(e) => {
                self.state = SessionState::Terminated {
                    exit_code: EXIT_CODE_UNKNOWN,
                };
                Err(e)
            }
        }
    }

    /// Append output for `generation`. Returns `false` for stale events.
    pub fn record_output(&mut self, generation: Generation, chunk: &str) -> bool {
        if generation != self.generation {
            return false;
        }
        self.transcript.append(chunk);
        true
    }

    /// Append output produced by the engine itself (e.g. launch failures).
    pub(crate) fn record_diagnostic(&mut self, text: &str) {
        self.transcript.append(text);
    }

    /// Record process exit for `generation`. Returns `false` for stale
    /// events or a session that is not running.
    pub fn mark_exited(&mut self, generation: Generation, exit_code: i32) -> bool {
        if generation != self.generation || !matches!(self.state, SessionState::Running) {
            return false;
        }
        self.state = SessionState::Terminated { exit_code };
        true
    }
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLauncher;
    use tokio::sync::mpsc;

    fn command() -> BuildCommand {
        BuildCommand::new("build.sh", ["build"])
    }

    fn start(session: &mut BuildSession, launcher: &ScriptedLauncher) -> Result<Generation, LaunchError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        session.start(launcher, &command(), |generation| Some(EventSink::new(generation, tx)))
    }

    #[test]
    fn never_started_session_counts_as_terminated_without_exit_code() {
        let session = BuildSession::new();
        assert_eq!(session.state(), SessionState::NoSession);
        assert!(!session.has_started());
        assert!(session.is_terminated());
        assert_eq!(session.exit_code(), None);
        assert!(session.process().is_none());
    }

    #[test]
    fn start_then_exit_walks_the_lifecycle() {
        let launcher = ScriptedLauncher::new();
        let mut session = BuildSession::new();

        let generation = start(&mut session, &launcher).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(session.state(), SessionState::Running);
        assert!(!session.is_terminated());
        assert_eq!(session.exit_code(), None);
        assert_eq!(launcher.launches(), vec![command()]);

        assert!(session.record_output(generation, "ok\n"));
        assert!(session.mark_exited(generation, 3));
        assert_eq!(session.state(), SessionState::Terminated { exit_code: 3 });
        assert_eq!(session.exit_code(), Some(3));
        assert_eq!(session.transcript().completed(), ["ok"]);
    }

    #[test]
    fn restart_resets_transcript_and_ignores_stale_events() {
        let launcher = ScriptedLauncher::new();
        let mut session = BuildSession::new();

        let first = start(&mut session, &launcher).unwrap();
        session.record_output(first, "old output\n");
        session.mark_exited(first, 1);

        let second = start(&mut session, &launcher).unwrap();
        assert_ne!(first, second);
        assert!(session.transcript().is_empty());

        assert!(!session.record_output(first, "late"));
        assert!(!session.mark_exited(first, 0));
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn exit_is_recorded_once() {
        let launcher = ScriptedLauncher::new();
        let mut session = BuildSession::new();
        let generation = start(&mut session, &launcher).unwrap();

        assert!(session.mark_exited(generation, 0));
        assert!(!session.mark_exited(generation, 9));
        assert_eq!(session.exit_code(), Some(0));
    }

    #[test]
    fn launch_failure_leaves_session_terminated_with_sentinel_code() {
        let launcher = ScriptedLauncher::failing();
        let mut session = BuildSession::new();

        assert!(start(&mut session, &launcher).is_err());
        assert!(session.has_started());
        assert!(session.is_terminated());
        assert_eq!(session.exit_code(), Some(EXIT_CODE_UNKNOWN));
    }

    #[test]
    fn missing_sink_fails_the_start() {
        let launcher = ScriptedLauncher::new();
        let mut session = BuildSession::new();

        let result = session.start(&launcher, &command(), |_| None);
        assert!(matches!(result, Err(LaunchError::ControllerGone)));
        assert!(launcher.launches().is_empty());
        assert_eq!(session.exit_code(), Some(EXIT_CODE_UNKNOWN));
    }
}
