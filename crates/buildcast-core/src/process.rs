//! Build process abstraction and its Tokio implementation.
//!
//! The controller never touches `tokio::process` directly. It asks a
//! [`ProcessLauncher`] to start a [`BuildCommand`] and receives the
//! process's output and exit as [`ProcessEvent`]s, delivered through an
//! [`EventSink`] into the same dispatch queue as viewer events. Output and
//! exit therefore can never race with a connect or a rebuild.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::controller::ControllerEvent;
use crate::error::LaunchError;
use crate::session::Generation;

/// Maximum number of bytes read from a pipe per output chunk.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Exit code recorded when a process ends without one (signal, wait failure)
/// or could not be started at all.
pub const EXIT_CODE_UNKNOWN: i32 = -1;

/// The command a build target runs, taken verbatim from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    /// Executable path or name.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
}

impl BuildCommand {
    /// Create a command from a program and its arguments.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Something a running build process reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of output, exactly as read (decoded as UTF-8).
    Output(String),
    /// The process has terminated. Emitted exactly once, after all output.
    Exited {
        /// The process exit code, or [`EXIT_CODE_UNKNOWN`].
        code: i32,
    },
}

/// Delivers [`ProcessEvent`]s for one session generation to the controller.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl EventSink {
    /// Create a sink tagging every event with `generation`.
    pub const fn new(generation: Generation, tx: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self { generation, tx }
    }

    /// The session generation this sink reports for.
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Queue an event for the controller. Returns `false` once the
    /// dispatch loop has shut down.
    pub fn emit(&self, event: ProcessEvent) -> bool {
        self.tx
            .send(ControllerEvent::Process {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Handle to a launched build process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessHandle {
    /// OS process id, when the platform reports one.
    pub pid: Option<u32>,
}

/// Starts build processes.
///
/// Implementations must emit every output chunk and then exactly one
/// [`ProcessEvent::Exited`] through the given sink. Events are queued,
/// so the controller handles them only after the current event finishes.
pub trait ProcessLauncher: Send + Sync {
    /// Start `command`, reporting its events through `sink`.
    fn launch(&self, command: &BuildCommand, sink: EventSink) -> Result<ProcessHandle, LaunchError>;
}

/// Launches real subprocesses with `tokio::process`.
///
/// Stdout and stderr are both captured and interleaved into one output
/// stream as they arrive. The child is never killed by the engine; it
/// runs to natural completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, command: &BuildCommand, sink: EventSink) -> Result<ProcessHandle, LaunchError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| LaunchError::MissingPipe {
            program: command.program.clone(),
            stream: "stdout",
        })?;
        let stderr = child.stderr.take().ok_or_else(|| LaunchError::MissingPipe {
            program: command.program.clone(),
            stream: "stderr",
        })?;

        let handle = ProcessHandle { pid: child.id() };
        debug!(
            program = command.program,
            pid = ?handle.pid,
            generation = sink.generation(),
            "build process spawned"
        );

        tokio::spawn(async move {
            tokio::join!(pump(stdout, &sink), pump(stderr, &sink));
            let code = wait_for_exit(&mut child).await;
            sink.emit(ProcessEvent::Exited { code });
        });

        Ok(handle)
    }
}

/// Forward one pipe to the sink until EOF.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: &EventSink) {
    let mut buf = vec![0_u8; READ_CHUNK_BYTES];
    let mut decoder = Utf8Decoder::default();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(buf.get(..n).unwrap_or_default());
                if !text.is_empty() && !sink.emit(ProcessEvent::Output(text)) {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, generation = sink.generation(), "build output pipe read failed");
                break;
            }
        }
    }
    let rest = decoder.finish();
    if !rest.is_empty() {
        sink.emit(ProcessEvent::Output(rest));
    }
}

async fn wait_for_exit(child: &mut Child) -> i32 {
    match child.wait().await {
        Ok(status) => status.code().unwrap_or(EXIT_CODE_UNKNOWN),
        Err(e) => {
            warn!(error = %e, "failed to wait for build process");
            EXIT_CODE_UNKNOWN
        }
    }
}

/// Incremental UTF-8 decoding across read boundaries.
///
/// A multi-byte character split between two reads is held back until its
/// remaining bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let (head, _) = self.pending.split_at(valid);
                    out.push_str(&String::from_utf8_lossy(head));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid.saturating_add(len));
                        }
                        None => {
                            // Incomplete trailing sequence: wait for more bytes.
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decoder_passes_ascii_through() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn decoder_holds_back_split_multibyte_character() {
        let bytes = "büild".as_bytes();
        let (first, second) = bytes.split_at(2);
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(first), "b");
        assert_eq!(decoder.decode(second), "üild");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn decoder_replaces_invalid_bytes_and_continues() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"ok\xffok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn decoder_flushes_dangling_bytes_on_finish() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn build_command_collects_args() {
        let command = BuildCommand::new("build-ccws.sh", ["build"]);
        assert_eq!(command.program, "build-ccws.sh");
        assert_eq!(command.args, vec![String::from("build")]);
    }

    #[tokio::test]
    async fn sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);
        assert!(sink.emit(ProcessEvent::Output(String::from("x"))));

        match rx.recv().await {
            Some(ControllerEvent::Process { generation, event }) => {
                assert_eq!(generation, 7);
                assert_eq!(event, ProcessEvent::Output(String::from("x")));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        drop(rx);
        assert!(!sink.emit(ProcessEvent::Exited { code: 0 }));
    }
}
