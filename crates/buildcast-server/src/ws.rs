//! `WebSocket` adapter that turns a socket into a broadcast [`Client`].
//!
//! Each viewer socket is split in two. A writer task drains an unbounded
//! queue of outbound frames into the socket, so [`Client::send`] never
//! blocks the session controller. The reader loop forwards inbound text
//! to the controller as messages and reports a disconnect when the peer
//! goes away.

use axum::extract::ws::{Message, WebSocket};
use buildcast_core::{Client, ClientId, ControllerHandle, SendError};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A frame queued for the socket writer.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// A connected `WebSocket` viewer.
#[derive(Debug)]
pub struct WsClient {
    id: ClientId,
    parameter: String,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl WsClient {
    fn new(parameter: String, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ClientId::new(),
            parameter,
            outbound,
        }
    }
}

impl Client for WsClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn parameter(&self) -> &str {
        &self.parameter
    }

    fn send(&self, text: &str) -> Result<(), SendError> {
        self.outbound
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_| SendError::Closed)
    }

    fn disconnect(&self) {
        // The writer may already be gone; nothing left to close then.
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Drive one viewer socket until either side closes it.
///
/// Registers the viewer with the target's controller, pumps frames in
/// both directions, and always unregisters it on the way out.
pub async fn run_viewer(socket: WebSocket, controller: ControllerHandle, parameter: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = std::sync::Arc::new(WsClient::new(parameter, tx));
    let id = client.id();

    debug!(target_name = controller.target(), client = %id, parameter = client.parameter(), "viewer connected");

    if let Err(e) = controller.connect(client) {
        warn!(target_name = controller.target(), "dropping viewer: {e}");
        let _ = sink.close().await;
        return;
    }

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        debug!(client = %id, "viewer send failed");
                        return;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if controller.message(id, text.as_str()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(client = %id, "viewer socket error: {e}");
                    break;
                }
                // Pings are answered by axum; binary frames are ignored.
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    debug!(target_name = controller.target(), client = %id, "viewer disconnected");
    let _ = controller.disconnect(id);
    writer.abort();
}
