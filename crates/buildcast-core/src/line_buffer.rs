//! Transcript accumulation for one build session.
//!
//! [`LineBuffer`] turns the raw output chunks of a build into an ordered
//! list of completed lines plus one trailing partial line. Chunks arrive
//! with arbitrary boundaries, so a line may span several chunks and a
//! chunk may carry several lines.

/// Completed lines plus the unterminated tail of the most recent chunk.
///
/// Joining [`completed`](Self::completed) with `\n`, then appending `\n`
/// and [`current`](Self::current) when at least one line has completed,
/// reproduces every byte appended since the last [`reset`](Self::reset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    completed: Vec<String>,
    current: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            completed: Vec::new(),
            current: String::new(),
        }
    }

    /// Append one raw output chunk.
    ///
    /// The first newline-separated piece extends the current line. Every
    /// newline then closes the current line and starts a new one with the
    /// following piece. An empty chunk changes nothing.
    pub fn append(&mut self, chunk: &str) {
        let mut pieces = chunk.split('\n');
        if let Some(head) = pieces.next() {
            self.current.push_str(head);
        }
        for piece in pieces {
            let finished = std::mem::replace(&mut self.current, piece.to_owned());
            self.completed.push(finished);
        }
    }

    /// Discard the whole transcript.
    pub fn reset(&mut self) {
        self.completed.clear();
        self.current.clear();
    }

    /// Lines that have been terminated by a newline, in emission order.
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// The unterminated tail of the transcript.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Whether nothing has been appended since the last reset.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.current.is_empty()
    }

    /// The two sends that replay this transcript to a late viewer.
    ///
    /// The first part is every completed line joined by `\n`. The second
    /// is the current line, prefixed with `\n` only when a completed line
    /// precedes it, so an empty log never produces a leading blank line.
    pub fn replay_parts(&self) -> (String, String) {
        let log = self.completed.join("\n");
        let tail = if self.completed.is_empty() {
            self.current.clone()
        } else {
            format!("\n{}", self.current)
        };
        (log, tail)
    }
}
