//! An authenticated session with a Glide host.

use futures_util::{SinkExt, StreamExt};
use glide_core::protocol::{decode_host_event, encode_client_event};
use glide_core::{ClientEvent, HostEvent, ProtocolError, SemanticCommand};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) type HostSocket = WebSocketStream<TlsStream<TcpStream>>;

/// Errors on an established session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection dropped or could not be written.  Reconnecting may help.
    #[error("connection to host lost: {0}")]
    Transport(#[from] WsError),

    /// A command could not be encoded (e.g. a non-finite delta).
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// The client end of an authenticated session.
///
/// Created by [`Connector::connect`](super::connector::Connector::connect)
/// after the host answered `connect`.
pub struct ClientSession {
    ws: HostSocket,
    session_id: Uuid,
    peer: String,
}

impl ClientSession {
    pub(crate) fn new(ws: HostSocket, session_id: Uuid, peer: String) -> Self {
        Self { ws, session_id, peer }
    }

    /// Id assigned by the host in its `connect` event.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// `host:port` this session is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sends one command as a single frame.
    ///
    /// # Errors
    ///
    /// [`SessionError::Encode`] leaves the session usable;
    /// [`SessionError::Transport`] means it is gone.
    pub async fn send(&mut self, command: SemanticCommand) -> Result<(), SessionError> {
        let text = encode_client_event(&ClientEvent::from(command))?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Waits for the next lifecycle event from the host.
    ///
    /// Returns `Ok(None)` once the host closed the socket.  Control frames
    /// are answered internally and never returned.  Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the connection fails.
    pub async fn recv_event(&mut self) -> Result<Option<HostEvent>, SessionError> {
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Text(text)) => match decode_host_event(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(e) => warn!("session {}: ignoring frame from host: {e}", self.session_id),
                },
                Ok(Message::Close(frame)) => {
                    debug!("session {}: host closed ({frame:?})", self.session_id);
                    return Ok(None);
                }
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Closes the session with a WebSocket Close frame.
    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("session {}: close failed: {e}", self.session_id);
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("session_id", &self.session_id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
