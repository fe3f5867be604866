//! Secure channel endpoint: TLS + WebSocket accept loop and per-session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address (default `0.0.0.0:3000`).
//! 2. Accepting incoming TCP connections from phones.
//! 3. Completing the TLS handshake with the host's self-signed identity.
//! 4. Upgrading to WebSocket.  The credential travels in the
//!    `x-glide-credential` header of the upgrade request and is checked
//!    **before** the upgrade is accepted, so an unauthenticated peer never
//!    gets to send a single event.
//! 5. Claiming the single session slot and announcing `connect` to the phone.
//! 6. Running three concurrent tasks per session:
//!    - **Reader**: WebSocket text frames → decoded commands → channel.
//!    - **Drain**: channel → [`CommandDispatcher`], one command at a time.
//!    - **Keepalive**: WebSocket pings every `ping_interval`.
//! 7. Saying `disconnect{reason:"shutdown"}` to the phone when the `running`
//!    flag is cleared, `disconnect{reason:"closed"}` when the operator closes
//!    the session, and `disconnect{reason:"protocol"}` after
//!    [`MAX_BAD_FRAMES`] undecodable frames in a row.
//!
//! # Rejections
//!
//! A rejected upgrade is answered with a plain HTTP error whose body is a
//! `connect_error` frame:
//!
//! | Status | Body reason | Cause                                   |
//! |--------|-------------|-----------------------------------------|
//! | 401    | `auth`      | credential missing or wrong             |
//! | 409    | `busy`      | another session is active               |
//!
//! A credential rotated between the header check and admission is reported
//! on the already-upgraded socket as `connect_error{reason:"rotated"}`.
//!
//! # Ordering
//!
//! Frames from one session are decoded in arrival order and pushed through a
//! single bounded channel to a single drain task, so commands are applied in
//! exactly the order the phone sent them.  When the session ends, the drain
//! task is aborted: commands still queued are discarded and no new injection
//! starts.  A command already handed to the blocking pool finishes whole.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use glide_core::protocol::messages::{DisconnectReason, RejectReason, CREDENTIAL_HEADER};
use glide_core::protocol::{decode_client_event, encode_host_event};
use glide_core::{HostEvent, SemanticCommand};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, timeout};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::credentials::{AuthTicket, CredentialManager};
use crate::application::dispatch_commands::CommandDispatcher;
use crate::application::manage_sessions::{SessionGate, SessionLease};
use crate::infrastructure::storage::config::NetworkConfig;

/// How often the accept loop and sessions look at the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);
/// How long sessions get to say goodbye after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Capacity of the per-session command channel.
const COMMAND_BUFFER: usize = 256;
/// Consecutive undecodable frames tolerated before the session is dropped.
pub const MAX_BAD_FRAMES: u32 = 16;

type WsStream = WebSocketStream<TlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Runtime settings for the listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind_addr: SocketAddr,
    pub handshake_timeout: Duration,
    pub ping_interval: Duration,
}

impl ListenerConfig {
    /// Builds the listener settings from the `[network]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`AddrParseError`] if `bind_address` is not an IP address.
    pub fn from_network(network: &NetworkConfig) -> Result<Self, AddrParseError> {
        let ip: IpAddr = network.bind_address.parse()?;
        Ok(Self {
            bind_addr: SocketAddr::new(ip, network.port),
            handshake_timeout: Duration::from_secs(network.handshake_timeout_secs.max(1)),
            ping_interval: Duration::from_secs(network.ping_interval_secs.max(1)),
        })
    }
}

/// Everything a connection task needs, shared across all connections.
#[derive(Clone)]
pub struct HostServices {
    pub credentials: Arc<CredentialManager>,
    pub sessions: SessionGate,
    pub dispatcher: CommandDispatcher,
    pub tls: TlsAcceptor,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener and runs the accept loop until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_listener(
    config: ListenerConfig,
    services: HostServices,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    info!("Glide host listening on {}", config.bind_addr);
    serve(listener, config, services, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Each accepted connection is handed off to its own task so one slow phone
/// never blocks the loop.  On shutdown the loop stops accepting and gives
/// live sessions [`SHUTDOWN_GRACE`] to send their `disconnect` event.
///
/// # Errors
///
/// Currently infallible once bound; the `Result` mirrors [`run_listener`].
pub async fn serve(
    listener: TcpListener,
    config: ListenerConfig,
    services: HostServices,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let mut connections = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap finished connection tasks so the set does not grow unbounded.
        while connections.try_join_next().is_some() {}

        // Short timeout so the loop can notice the shutdown flag even when no
        // phone is connecting.
        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                let svc = services.clone();
                let run = Arc::clone(&running);
                connections.spawn(async move {
                    handle_connection(stream, peer_addr, cfg, svc, run).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    let drained = timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("connections still open after {SHUTDOWN_GRACE:?}; aborting them");
        connections.abort_all();
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Entry point of each connection task; logs the outcome.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ListenerConfig>,
    services: HostServices,
    running: Arc<AtomicBool>,
) {
    match run_connection(stream, peer_addr, &config, &services, &running).await {
        Ok(()) => debug!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Result of a successful credential check inside the upgrade callback.
struct Admission {
    ticket: AuthTicket,
    lease: SessionLease,
}

async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: &ListenerConfig,
    services: &HostServices,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    // ── Step 1: TLS + WebSocket upgrade, bounded by the handshake timeout ────
    let mut admission: Option<Admission> = None;
    let upgrade = async {
        let tls = services
            .tls
            .accept(stream)
            .await
            .context("TLS handshake failed")?;
        let ws = accept_hdr_async(tls, |request: &Request, response: Response| {
            admit(services, peer_addr, request, response, &mut admission)
        })
        .await
        .context("WebSocket upgrade failed")?;
        anyhow::Ok(ws)
    };
    let mut ws = timeout(config.handshake_timeout, upgrade)
        .await
        .map_err(|_| anyhow!("handshake timed out after {:?}", config.handshake_timeout))??;

    let Admission { ticket, lease } = admission
        .take()
        .context("upgrade completed without admission")?;

    // ── Step 2: re-check the credential epoch before admitting ───────────────
    if let Err(e) = services.credentials.is_current(ticket) {
        warn!("{peer_addr}: {e}; refusing session");
        send_event(&mut ws, HostEvent::rejected(RejectReason::Rotated)).await?;
        // Best effort: the peer may already be gone.
        let _ = ws.close(None).await;
        return Ok(());
    }

    let session_id = lease.id();
    send_event(&mut ws, HostEvent::connect(session_id))
        .await
        .with_context(|| format!("session {session_id}: failed to send connect"))?;
    info!("session {session_id}: authenticated {peer_addr}");

    // ── Step 3: run until the phone leaves, the host closes, or shutdown ─────
    let end = run_session(ws, &lease, config, services, running).await;
    info!("session {session_id}: ended ({end:?})");
    Ok(())
}

/// Upgrade callback: verifies the credential header and claims the slot.
fn admit(
    services: &HostServices,
    peer_addr: SocketAddr,
    request: &Request,
    response: Response,
    admission: &mut Option<Admission>,
) -> Result<Response, ErrorResponse> {
    let presented = request
        .headers()
        .get(CREDENTIAL_HEADER)
        .and_then(|value| value.to_str().ok());

    let ticket = match services.credentials.verify(presented) {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!("{peer_addr}: handshake rejected: {e}");
            return Err(rejection(StatusCode::UNAUTHORIZED, RejectReason::Auth));
        }
    };

    let lease = match services.sessions.try_acquire(peer_addr) {
        Ok(lease) => lease,
        Err(busy) => {
            warn!("{peer_addr}: handshake rejected: {busy}");
            return Err(rejection(StatusCode::CONFLICT, RejectReason::Busy));
        }
    };

    *admission = Some(Admission { ticket, lease });
    Ok(response)
}

/// Builds the HTTP error response carrying a `connect_error` frame.
fn rejection(status: StatusCode, reason: RejectReason) -> ErrorResponse {
    let body = encode_host_event(&HostEvent::rejected(reason)).ok();
    let mut response = ErrorResponse::new(body);
    *response.status_mut() = status;
    response
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The phone closed the socket or the connection dropped.
    ClientGone,
    /// The host operator closed the session.
    Closed,
    /// The host is shutting down.
    Shutdown,
    /// A keepalive ping could not be written.
    KeepaliveFailed,
    /// The drain task stopped unexpectedly.
    DispatcherStopped,
    /// The phone kept sending frames that could not be decoded.
    ProtocolViolation,
}

/// Why the reader task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderEnd {
    Closed,
    TooManyBadFrames,
}

async fn run_session(
    ws: WsStream,
    lease: &SessionLease,
    config: &ListenerConfig,
    services: &HostServices,
    running: &AtomicBool,
) -> SessionEnd {
    let session_id = lease.id();
    let (sink, stream) = ws.split();
    // Shared between the keepalive task and the goodbye below.
    let sink = Arc::new(Mutex::new(sink));
    let (command_tx, command_rx) = mpsc::channel::<SemanticCommand>(COMMAND_BUFFER);

    // ── Task A: reader ────────────────────────────────────────────────────────
    let mut reader = tokio::spawn(read_commands(stream, command_tx, session_id));

    // ── Task B: drain ─────────────────────────────────────────────────────────
    let dispatcher = services.dispatcher.clone();
    let mut drain = tokio::spawn(async move {
        dispatcher.run_session(session_id, command_rx).await;
    });

    // ── Task C: keepalive ─────────────────────────────────────────────────────
    let mut keepalive = tokio::spawn(keepalive(
        Arc::clone(&sink),
        config.ping_interval,
        session_id,
    ));

    let end = tokio::select! {
        res = &mut reader => match res {
            Ok(ReaderEnd::TooManyBadFrames) => SessionEnd::ProtocolViolation,
            _ => SessionEnd::ClientGone,
        },
        _ = &mut drain => SessionEnd::DispatcherStopped,
        _ = &mut keepalive => SessionEnd::KeepaliveFailed,
        _ = lease.close_requested() => SessionEnd::Closed,
        _ = shutdown_signalled(running) => SessionEnd::Shutdown,
    };

    // The session is closed from here on: nothing queued may still be applied.
    reader.abort();
    drain.abort();
    keepalive.abort();

    let reason = match end {
        SessionEnd::Shutdown => Some(DisconnectReason::Shutdown),
        SessionEnd::Closed => Some(DisconnectReason::Closed),
        SessionEnd::ProtocolViolation => Some(DisconnectReason::Protocol),
        _ => None,
    };
    let mut sink = sink.lock().await;
    if let Some(reason) = reason {
        if let Ok(text) = encode_host_event(&HostEvent::disconnect(reason)) {
            if let Err(e) = sink.send(WsMessage::Text(text)).await {
                debug!("session {session_id}: could not send disconnect: {e}");
            }
        }
    }
    let _ = sink.close().await;

    end
}

/// Reads frames, decodes them and forwards commands in arrival order.
///
/// A bad frame is logged and skipped; a run of [`MAX_BAD_FRAMES`] of them
/// ends the reader with [`ReaderEnd::TooManyBadFrames`].
async fn read_commands(
    mut stream: SplitStream<WsStream>,
    commands: mpsc::Sender<SemanticCommand>,
    session_id: Uuid,
) -> ReaderEnd {
    let mut bad_frames = BadFrames::default();
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match decode_client_event(&text) {
                Ok(event) => {
                    bad_frames.reset();
                    if commands.send(SemanticCommand::from(event)).await.is_err() {
                        debug!("session {session_id}: drain task gone; stopping reader");
                        break;
                    }
                }
                Err(e) => {
                    warn!("session {session_id}: ignoring frame: {e}");
                    if bad_frames.record() {
                        return ReaderEnd::TooManyBadFrames;
                    }
                }
            },
            Ok(WsMessage::Binary(_)) => {
                warn!("session {session_id}: unexpected binary frame (ignored)");
                if bad_frames.record() {
                    return ReaderEnd::TooManyBadFrames;
                }
            }
            Ok(WsMessage::Close(_)) => {
                debug!("session {session_id}: Close frame received");
                break;
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {}
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                debug!("session {session_id}: WebSocket closed");
                break;
            }
            Err(e) => {
                warn!("session {session_id}: WebSocket error: {e}");
                break;
            }
        }
    }
    ReaderEnd::Closed
}

/// Counts consecutive undecodable frames.
#[derive(Debug, Default)]
struct BadFrames(u32);

impl BadFrames {
    /// Counts one more bad frame; returns `true` once the limit is reached.
    fn record(&mut self) -> bool {
        self.0 += 1;
        self.0 >= MAX_BAD_FRAMES
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Sends a WebSocket ping every `period` until a write fails.
async fn keepalive(sink: Arc<Mutex<WsSink>>, period: Duration, session_id: Uuid) {
    let mut ticker = interval(period);
    ticker.tick().await; // the first tick fires immediately

    loop {
        ticker.tick().await;
        let mut sink = sink.lock().await;
        if let Err(e) = sink.send(WsMessage::Ping(Vec::new())).await {
            debug!("session {session_id}: keepalive ping failed: {e}");
            break;
        }
    }
}

/// Resolves once `running` has been cleared.
async fn shutdown_signalled(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        sleep(SHUTDOWN_POLL).await;
    }
}

async fn send_event(ws: &mut WsStream, event: HostEvent) -> anyhow::Result<()> {
    let text = encode_host_event(&event)?;
    ws.send(WsMessage::Text(text))
        .await
        .with_context(|| format!("failed to send {}", event.event_name()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use glide_core::protocol::decode_host_event;

    use super::*;

    #[test]
    fn test_rejection_carries_connect_error_body() {
        // Arrange / Act
        let response = rejection(StatusCode::CONFLICT, RejectReason::Busy);

        // Assert
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = response.body().as_deref().expect("body must be present");
        assert_eq!(
            decode_host_event(body).unwrap(),
            HostEvent::rejected(RejectReason::Busy)
        );
    }

    #[test]
    fn test_listener_config_from_defaults() {
        let config = ListenerConfig::from_network(&NetworkConfig::default()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.ping_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_listener_config_rejects_host_name_bind_address() {
        let network = NetworkConfig {
            bind_address: "my-laptop".to_string(),
            ..NetworkConfig::default()
        };
        assert!(ListenerConfig::from_network(&network).is_err());
    }

    #[test]
    fn test_bad_frame_limit_counts_only_consecutive_frames() {
        // Arrange
        let mut bad = BadFrames::default();
        for _ in 1..MAX_BAD_FRAMES {
            assert!(!bad.record());
        }

        // Act
        bad.reset();
        let after_reset = (1..MAX_BAD_FRAMES).any(|_| bad.record());
        let at_limit = bad.record();

        // Assert
        assert!(!after_reset);
        assert!(at_limit);
    }

    #[tokio::test]
    async fn test_shutdown_signalled_returns_once_flag_clears() {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            flag.store(false, Ordering::Relaxed);
        });

        timeout(Duration::from_secs(2), shutdown_signalled(&running))
            .await
            .expect("must observe the cleared flag");
    }
}
