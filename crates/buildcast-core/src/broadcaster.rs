//! Fan-out of raw build output to subscribed viewers.
//!
//! The connection layer owns each viewer's socket and hands the engine an
//! [`Arc<dyn Client>`] wrapping the socket's non-blocking send side. The
//! [`Broadcaster`] only tracks set membership; it never discovers
//! disconnects on its own. Removal happens when the connection layer
//! reports the disconnect.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::SendError;

/// Identity of one viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a fresh identifier (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A viewer handle supplied by the connection layer.
///
/// `send` must not block: implementations queue the text on an
/// independently drained buffer so a slow viewer never stalls the
/// dispatch loop.
pub trait Client: Send + Sync {
    /// Stable identity used for subscriber set membership.
    fn id(&self) -> ClientId;

    /// Opaque parameter supplied with the connection (e.g. `"build"`).
    fn parameter(&self) -> &str;

    /// Queue `text` for delivery as one message.
    fn send(&self, text: &str) -> Result<(), SendError>;

    /// Ask the connection layer to close this connection.
    fn disconnect(&self);

    /// Set the content type of a one-shot response. Streaming
    /// connections have no use for it.
    fn set_content_type(&self, content_type: &str) {
        let _ = content_type;
    }
}

/// The set of viewers currently subscribed to live output.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: BTreeMap<ClientId, Arc<dyn Client>>,
}

impl Broadcaster {
    /// Create a broadcaster with no subscribers.
    pub const fn new() -> Self {
        Self {
            subscribers: BTreeMap::new(),
        }
    }

    /// Subscribe a client. Re-adding an existing id replaces the handle.
    pub fn add(&mut self, client: Arc<dyn Client>) {
        self.subscribers.insert(client.id(), client);
    }

    /// Unsubscribe a client. Returns whether it was subscribed.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Whether `id` is currently subscribed.
    pub fn contains(&self, id: ClientId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Look up a subscribed client by id.
    pub fn get(&self, id: ClientId) -> Option<&Arc<dyn Client>> {
        self.subscribers.get(&id)
    }

    /// Number of subscribed clients.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no clients are subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `chunk` unmodified to every subscriber.
    ///
    /// A failed send is logged and skipped; membership is left alone.
    /// Returns the number of clients that accepted the chunk.
    pub fn send(&self, chunk: &str) -> usize {
        let mut delivered: usize = 0;
        for (id, client) in &self.subscribers {
            match client.send(chunk) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => debug!(client = %id, error = %e, "dropping chunk for unreachable client"),
            }
        }
        delivered
    }
}

impl core::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}
