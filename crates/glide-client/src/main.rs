//! Glide headless client: entry point.
//!
//! Connects to a Glide host, then reads a pointer script from stdin, runs it
//! through the gesture engine, and sends the resulting commands.
//!
//! # Usage
//!
//! ```text
//! glide-client --host 192.168.1.20 --pin 482913 < gestures.txt
//! glide-client --pairing '{"ip":"192.168.1.20","pin":"482913"}'
//! ```
//!
//! See [`glide_client::infrastructure::script`] for the script format.
//!
//! # Event loop (for beginners)
//!
//! The `tokio::select!` loop waits on three things at once:
//!
//! - the next stdin line, which may produce a command to send;
//! - the next event from the host (`disconnect`, or the socket dropping);
//! - Ctrl+C.
//!
//! When the connection drops the client reconnects with the same bounded
//! retry policy it used at startup, and resends the command that failed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use glide_client::application::gesture_engine::GestureEngine;
use glide_client::infrastructure::network::{
    ClientSession, ConnectOptions, Connector, SessionError, Target, TrustPolicy,
};
use glide_client::infrastructure::script::{parse_line, ScriptStep};
use glide_client::infrastructure::storage::config::{
    config_file_path, known_hosts_path, load_config_from, ClientConfig,
};
use glide_client::infrastructure::storage::known_hosts::KnownHosts;
use glide_core::protocol::messages::DisconnectReason;
use glide_core::{Credential, HostEvent, PairingPayload, SemanticCommand};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Glide headless client.
#[derive(Debug, Parser)]
#[command(name = "glide-client", about = "Drives a Glide host from a pointer script on stdin", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "GLIDE_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Host address: `ip`, `ip:port`, or a host name.
    #[arg(long, env = "GLIDE_HOST")]
    host: Option<String>,

    /// Six-digit PIN shown by the host.
    #[arg(long, env = "GLIDE_PIN")]
    pin: Option<String>,

    /// Scanned pairing payload; takes precedence over --host/--pin.
    #[arg(long)]
    pairing: Option<String>,

    /// Upper bound on one connection attempt, in milliseconds.
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Connection attempts before giving up on network errors.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Refuse hosts whose certificate is not already pinned.
    #[arg(long)]
    no_trust_on_first_use: bool,

    /// Known-hosts file [default: config dir/known_hosts.toml].
    #[arg(long)]
    known_hosts: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Overlays command-line values onto the file configuration.
    fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(ms) = self.connect_timeout_ms {
            config.connect.connect_timeout_ms = ms;
        }
        if let Some(attempts) = self.max_attempts {
            config.connect.max_attempts = attempts;
        }
        if self.no_trust_on_first_use {
            config.connect.trust_on_first_use = false;
        }
        if let Some(level) = &self.log_level {
            config.client.log_level = level.clone();
        }
        config
    }

    /// Resolves where to connect: `--pairing`, else `--host`/config host with `--pin`.
    fn target(&self, config: &ClientConfig) -> anyhow::Result<Target> {
        if let Some(text) = &self.pairing {
            let payload = PairingPayload::decode(text).context("invalid --pairing payload")?;
            return Ok(Target::from_pairing(&payload));
        }

        let host = self
            .host
            .clone()
            .or_else(|| config.client.host.clone())
            .context("no host given: pass --pairing or --host, or set [client] host")?;
        let pin = self.pin.as_deref().context("--pin is required with --host")?;
        let credential = Credential::parse(pin.trim()).context("invalid --pin")?;
        Ok(Target::new(&host, credential))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// How long shutdown waits for blocking work, such as a pending stdin read.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    let result = runtime.block_on(run(Cli::parse()));
    // A read blocked on stdin cannot be cancelled.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path().context("no --config given and no platform config dir")?,
    };
    let config = cli.apply(
        load_config_from(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?,
    );

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    // ── Connector ─────────────────────────────────────────────────────────────
    let target = cli.target(&config)?;
    let known_hosts = match &cli.known_hosts {
        Some(path) => KnownHosts::open(path)?,
        None => match known_hosts_path() {
            Ok(path) => KnownHosts::open(&path)?,
            Err(e) => {
                warn!("{e}; pinned certificates will not be saved");
                KnownHosts::in_memory()
            }
        },
    };
    let options = ConnectOptions {
        connect_timeout: config.connect.connect_timeout().max(Duration::from_millis(1)),
        max_attempts: config.connect.max_attempts,
        trust: TrustPolicy::from_consent(config.connect.trust_on_first_use),
    };
    let connector = Connector::new(target, options, known_hosts);

    info!("Glide client connecting to {}", connector.target().key());
    let mut session = connect(&connector).await?;

    // ── Main loop ─────────────────────────────────────────────────────────────
    let mut engine = GestureEngine::new(config.gesture);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    debug!("end of script");
                    break;
                };
                line_no += 1;
                let command = match parse_line(&line) {
                    Ok(Some(ScriptStep::Pointer(event))) => engine.handle(event),
                    Ok(Some(ScriptStep::Key(key))) => Some(key.command()),
                    Ok(None) => None,
                    Err(e) => {
                        warn!("line {line_no}: {e}");
                        None
                    }
                };
                if let Some(command) = command {
                    deliver(&connector, &mut session, command).await?;
                }
            }
            event = session.recv_event() => match event {
                Ok(Some(HostEvent::Disconnect(d))) => match d.reason {
                    DisconnectReason::Shutdown | DisconnectReason::Closed => {
                        info!("host ended the session ({:?})", d.reason);
                        return Ok(());
                    }
                    DisconnectReason::Protocol => {
                        warn!("host dropped the session after a protocol error; reconnecting");
                        session = connect(&connector).await?;
                    }
                },
                Ok(Some(other)) => debug!("ignoring {} from host", other.event_name()),
                Ok(None) => {
                    warn!("host closed the connection; reconnecting");
                    session = connect(&connector).await?;
                }
                Err(e) => {
                    warn!("{e}; reconnecting");
                    session = connect(&connector).await?;
                }
            },
            _ = &mut ctrl_c => {
                info!("received Ctrl+C; closing session");
                break;
            }
        }
    }

    session.close().await;
    info!("Glide client stopped");
    Ok(())
}

/// Connects, turning a failure into the user-facing prompt.
async fn connect(connector: &Connector) -> anyhow::Result<ClientSession> {
    connector.connect().await.map_err(|e| {
        error!("{e}");
        anyhow!("{}", e.user_message())
    })
}

/// Sends `command`, reconnecting once if the connection dropped.
async fn deliver(
    connector: &Connector,
    session: &mut ClientSession,
    command: SemanticCommand,
) -> anyhow::Result<()> {
    match session.send(command).await {
        Ok(()) => Ok(()),
        Err(SessionError::Encode(e)) => {
            warn!("dropping {}: {e}", command.name());
            Ok(())
        }
        Err(SessionError::Transport(e)) => {
            warn!("connection lost ({e}); reconnecting");
            *session = connect(connector).await?;
            session
                .send(command)
                .await
                .with_context(|| format!("failed to resend {}", command.name()))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
