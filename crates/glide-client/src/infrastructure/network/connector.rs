//! Connector: dials a Glide host and completes the authenticated handshake.
//!
//! One attempt is:
//!
//! ```text
//! TCP connect ─▶ TLS (pinned certificate) ─▶ WebSocket upgrade with
//! x-glide-credential header ─▶ wait for the host's first event
//!                                   ├─ connect        → ClientSession
//!                                   └─ connect_error  → AuthRejected / SessionBusy
//! ```
//!
//! Every attempt is bounded by `connect_timeout`.  Only transport failures
//! and timeouts are retried, back to back, up to `max_attempts`.  A wrong
//! PIN, a busy host, or a certificate mismatch will not change by retrying,
//! so they are returned at once.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use glide_core::domain::fingerprint::display_fingerprint;
use glide_core::domain::pairing::split_host_port;
use glide_core::protocol::messages::{RejectReason, CREDENTIAL_HEADER, DEFAULT_PORT};
use glide_core::protocol::decode_host_event;
use glide_core::{Credential, HostEvent, PairingPayload};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Response, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::session::{ClientSession, HostSocket};
use super::trust::{client_config, PinnedCertVerifier, TrustPolicy, TrustVerdict};
use crate::infrastructure::storage::known_hosts::KnownHosts;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a connection could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The host refused the credential (wrong, missing, or rotated PIN).
    #[error("host rejected the PIN")]
    AuthRejected,

    /// The host could not be reached or dropped the connection.
    #[error("could not reach {target}: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: io::Error,
    },

    /// An attempt took longer than the connect timeout.
    #[error("no answer from {target} within {after:?}")]
    Timeout { target: String, after: Duration },

    /// Another client holds the host's only session.
    #[error("host already has an active session")]
    SessionBusy,

    /// The host's certificate is not the one pinned for it.
    #[error("certificate of {target} is not trusted (fingerprint {presented})")]
    UntrustedHost { target: String, presented: String },

    /// The host answered with something other than the Glide handshake.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ConnectError {
    /// Whether another attempt could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Unreachable { .. } | ConnectError::Timeout { .. })
    }

    /// Prompt to show the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConnectError::AuthRejected => {
                "The PIN was not accepted. Check the PIN shown on the computer and try again."
            }
            ConnectError::Unreachable { .. } | ConnectError::Timeout { .. } => {
                "Could not reach the computer. Check that both devices are on the same network and Glide is running."
            }
            ConnectError::SessionBusy => "Another device is already connected to this computer.",
            ConnectError::UntrustedHost { .. } => {
                "The computer's identity has changed since you last paired. Pair again if you expected this."
            }
            ConnectError::Protocol(_) => {
                "The computer answered unexpectedly. Make sure both devices run the same Glide version."
            }
        }
    }
}

// ── Target and options ────────────────────────────────────────────────────────

/// Where to connect and which credential to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub credential: Credential,
}

impl Target {
    /// Parses `address` as `host`, `host:port`, or an IP with optional port.
    pub fn new(address: &str, credential: Credential) -> Self {
        let (host, port) = split_host_port(address, DEFAULT_PORT);
        Self { host, port, credential }
    }

    /// Target described by a scanned pairing payload.
    pub fn from_pairing(payload: &PairingPayload) -> Self {
        let (host, port) = payload.host_and_port(DEFAULT_PORT);
        Self {
            host,
            port,
            credential: payload.credential.clone(),
        }
    }

    /// `host:port`, with IPv6 hosts bracketed.  Used as the known-hosts key.
    pub fn key(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Connection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub max_attempts: u32,
    pub trust: TrustPolicy,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            max_attempts: 3,
            trust: TrustPolicy::TrustOnFirstUse,
        }
    }
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Opens sessions to one host.  Reusable: call [`connect`](Self::connect)
/// again after a session drops.
pub struct Connector {
    target: Target,
    options: ConnectOptions,
    known_hosts: Mutex<KnownHosts>,
    provider: Arc<CryptoProvider>,
}

impl Connector {
    pub fn new(target: Target, options: ConnectOptions, known_hosts: KnownHosts) -> Self {
        Self {
            target,
            options,
            known_hosts: Mutex::new(known_hosts),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The fingerprint currently pinned for the target, if any.
    pub fn pinned_fingerprint(&self) -> Option<String> {
        self.known_hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fingerprint(&self.target.key())
            .map(str::to_string)
    }

    /// Connects and authenticates, retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable [`ConnectError`], or the last
    /// retryable one once `max_attempts` are used up.
    pub async fn connect(&self) -> Result<ClientSession, ConnectError> {
        let attempts = self.options.max_attempts.max(1);
        let key = self.target.key();
        let mut attempt = 1;

        loop {
            let error = match timeout(self.options.connect_timeout, self.attempt(&key)).await {
                Ok(Ok(session)) => return Ok(session),
                Ok(Err(e)) => e,
                Err(_) => ConnectError::Timeout {
                    target: key.clone(),
                    after: self.options.connect_timeout,
                },
            };

            if !error.is_retryable() || attempt >= attempts {
                warn!("connection to {key} failed: {error}");
                return Err(error);
            }
            debug!("attempt {attempt}/{attempts} to reach {key} failed: {error}; retrying");
            attempt += 1;
        }
    }

    async fn attempt(&self, key: &str) -> Result<ClientSession, ConnectError> {
        let transport = |source: io::Error| ConnectError::Unreachable {
            target: key.to_string(),
            source,
        };

        // ── TCP ───────────────────────────────────────────────────────────────
        let tcp = TcpStream::connect((self.target.host.as_str(), self.target.port))
            .await
            .map_err(transport)?;
        // Pointer deltas are tiny frames; do not batch them.
        tcp.set_nodelay(true).map_err(transport)?;

        // ── TLS ───────────────────────────────────────────────────────────────
        let verifier = Arc::new(PinnedCertVerifier::new(
            self.pinned_fingerprint(),
            self.options.trust,
            Arc::clone(&self.provider),
        ));
        let config = client_config(Arc::clone(&verifier), Arc::clone(&self.provider))
            .map_err(|e| ConnectError::Protocol(format!("TLS setup failed: {e}")))?;
        let server_name = ServerName::try_from(self.target.host.clone())
            .map_err(|e| ConnectError::Protocol(format!("invalid host name: {e}")))?;
        let tls = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await
            .map_err(|source| match verifier.verdict() {
                Some(TrustVerdict::Mismatch { presented, .. } | TrustVerdict::Unknown { presented }) => {
                    ConnectError::UntrustedHost {
                        target: key.to_string(),
                        presented,
                    }
                }
                _ => transport(source),
            })?;

        // ── WebSocket upgrade carrying the credential ─────────────────────────
        let mut request = format!("wss://{key}/")
            .into_client_request()
            .map_err(|e| ConnectError::Protocol(e.to_string()))?;
        let credential = HeaderValue::from_str(self.target.credential.as_str())
            .map_err(|e| ConnectError::Protocol(e.to_string()))?;
        request.headers_mut().insert(CREDENTIAL_HEADER, credential);

        let (mut ws, _) = client_async(request, tls)
            .await
            .map_err(|e| self.upgrade_error(key, e))?;

        // ── First host event decides ──────────────────────────────────────────
        let session_id = self.await_admission(&mut ws, key).await?;

        if let Some(TrustVerdict::FirstUse { fingerprint }) = verifier.verdict() {
            warn!(
                "pinned certificate of {key} on first use: {}",
                display_fingerprint(&fingerprint)
            );
            let mut known_hosts = self.known_hosts.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = known_hosts.pin(key, &fingerprint) {
                warn!("could not save known host {key}: {e}");
            }
        }

        info!("session {session_id}: connected to {key}");
        Ok(ClientSession::new(ws, session_id, key.to_string()))
    }

    async fn await_admission(&self, ws: &mut HostSocket, key: &str) -> Result<Uuid, ConnectError> {
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    return match decode_host_event(&text) {
                        Ok(HostEvent::Connect(accepted)) => Ok(accepted.session_id),
                        Ok(HostEvent::ConnectError(rejected)) => Err(Self::rejected(rejected.reason)),
                        Ok(HostEvent::Disconnect(d)) => Err(ConnectError::Protocol(format!(
                            "host disconnected during the handshake ({:?})",
                            d.reason
                        ))),
                        Err(e) => Err(ConnectError::Protocol(e.to_string())),
                    };
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(WsError::Io(source)) => {
                    return Err(ConnectError::Unreachable {
                        target: key.to_string(),
                        source,
                    })
                }
                Err(e) => return Err(ConnectError::Protocol(e.to_string())),
            }
        }

        Err(ConnectError::Unreachable {
            target: key.to_string(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "host closed the connection during the handshake",
            ),
        })
    }

    fn rejected(reason: RejectReason) -> ConnectError {
        match reason {
            RejectReason::Auth | RejectReason::Rotated => ConnectError::AuthRejected,
            RejectReason::Busy => ConnectError::SessionBusy,
        }
    }

    fn upgrade_error(&self, key: &str, error: WsError) -> ConnectError {
        match error {
            WsError::Http(response) => match rejection_reason(&response) {
                Some(reason) => Self::rejected(reason),
                None => match response.status() {
                    StatusCode::UNAUTHORIZED => ConnectError::AuthRejected,
                    StatusCode::CONFLICT => ConnectError::SessionBusy,
                    status => ConnectError::Protocol(format!("upgrade refused with HTTP {status}")),
                },
            },
            WsError::Io(source) => ConnectError::Unreachable {
                target: key.to_string(),
                source,
            },
            other => ConnectError::Protocol(other.to_string()),
        }
    }
}

/// Reads the `connect_error` frame from a rejected upgrade's body, if any.
fn rejection_reason(response: &Response<Option<Vec<u8>>>) -> Option<RejectReason> {
    let body = std::str::from_utf8(response.body().as_deref()?).ok()?;
    match decode_host_event(body).ok()? {
        HostEvent::ConnectError(rejected) => Some(rejected.reason),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
