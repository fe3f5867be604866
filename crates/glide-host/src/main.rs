//! Glide host: entry point.
//!
//! Wires together the credential manager, the TLS identity, the command
//! dispatcher and the secure channel listener, prints the pairing banner, and
//! runs until Ctrl+C or `quit`.
//!
//! # Usage
//!
//! ```text
//! glide-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>         Config file [default: platform config dir/host.toml]
//!   --port <PORT>           Listener port [config: network.port, default 3000]
//!   --bind <IP>             Bind address [config: network.bind_address]
//!   --pin <DIGITS>          Use this credential instead of a random one
//!   --rotate-every <SECS>   Rotate the credential periodically
//!   --qr-svg <PATH>         Also write the pairing QR code as SVG
//!   --log-level <LEVEL>     Log level when RUST_LOG is unset
//!   --write-default-config  Write the effective config to --config and exit
//! ```
//!
//! Command-line values override the config file.  `RUST_LOG` overrides the
//! log level from both.
//!
//! While running, the terminal accepts `close`, `status` and `quit`; see
//! [`glide_host::infrastructure::operator_console`].
//!
//! # Input injection
//!
//! The `RecordingSurface` used here moves a virtual pointer and logs every
//! action at `debug` level instead of synthesising OS input.  Platform
//! backends implement the same `InjectionSurface` trait and are swapped in
//! here.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glide_core::Credential;
use glide_host::application::{
    credentials::CredentialManager, dispatch_commands::CommandDispatcher,
    manage_sessions::SessionGate,
};
use glide_host::infrastructure::{
    injection::recording::RecordingSurface,
    network::{
        local_address::advertised_host,
        secure_channel::{run_listener, HostServices, ListenerConfig},
        tls::{subject_names, TlsIdentity},
    },
    operator_console::OperatorConsole,
    pairing_display,
    storage::config::{config_dir, config_file_path, load_config_from, save_config_to, HostConfig},
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Glide host.
///
/// Lets a paired phone drive this computer's pointer, clicks and volume.
#[derive(Debug, Parser)]
#[command(name = "glide-host", about = "Touchpad-and-volume remote host for Glide", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "GLIDE_HOST_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on.
    #[arg(long, env = "GLIDE_PORT")]
    port: Option<u16>,

    /// IP address to bind to (`0.0.0.0` for all interfaces).
    #[arg(long, env = "GLIDE_BIND")]
    bind: Option<String>,

    /// Fixed six-digit credential instead of a random one.
    #[arg(long, env = "GLIDE_PIN")]
    pin: Option<String>,

    /// Rotate the credential every this many seconds.
    #[arg(long)]
    rotate_every: Option<u64>,

    /// Write the pairing QR code as an SVG file to this path.
    #[arg(long)]
    qr_svg: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long)]
    log_level: Option<String>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    /// Overlays command-line values onto the file configuration.
    fn apply(&self, mut config: HostConfig) -> HostConfig {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(secs) = self.rotate_every {
            config.session.credential_rotation_secs = Some(secs);
        }
        if let Some(level) = &self.log_level {
            config.host.log_level = level.clone();
        }
        config
    }

    /// Parses `--pin`, if given.
    fn fixed_credential(&self) -> anyhow::Result<Option<Credential>> {
        self.pin
            .as_deref()
            .map(|pin| Credential::parse(pin.trim()).context("invalid --pin"))
            .transpose()
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// How long shutdown waits for blocking work, such as a pending stdin read.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    let result = runtime.block_on(run(Cli::parse()));
    // A console read blocked on stdin cannot be cancelled.
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
                .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level)),
        )
        .init();

    if cli.write_default_config {
        save_config_to(&config, &config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        info!("wrote configuration to {}", config_path.display());
        return Ok(());
    }

    info!("Glide host starting (config {})", config_path.display());

    // ── TLS identity ──────────────────────────────────────────────────────────
    let host = advertised_host(&config.network.bind_address);
    let cert_dir = match &config.tls.cert_dir {
        Some(dir) => dir.clone(),
        None => config_dir().unwrap_or_else(|e| {
            warn!("{e}; caching certificate in ./.glide");
            PathBuf::from(".glide")
        }),
    };
    let identity = TlsIdentity::load_or_generate(&cert_dir, subject_names(&host))
        .context("failed to prepare TLS certificate")?;
    let tls = TlsAcceptor::from(identity.server_config()?);

    // ── Credential + pairing display ──────────────────────────────────────────
    let credentials = Arc::new(match cli.fixed_credential()? {
        Some(credential) => CredentialManager::with_credential(credential),
        None => CredentialManager::new(),
    });
    let port = config.network.port;
    let svg_path = cli.qr_svg.clone().or_else(|| {
        config
            .host
            .write_qr_svg
            .then(|| cert_dir.join("pairing.svg"))
    });
    pairing_display::show(
        &pairing_display::pairing_payload(&host, port, credentials.current()),
        svg_path.as_deref(),
    )?;

    // ── Input injection ───────────────────────────────────────────────────────
    let surface = Arc::new(RecordingSurface::full_hd());
    let sessions = SessionGate::new();
    let services = HostServices {
        credentials: Arc::clone(&credentials),
        sessions: sessions.clone(),
        dispatcher: CommandDispatcher::new(surface),
        tls,
    };

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Operator console ──────────────────────────────────────────────────────
    let console = OperatorConsole::new(sessions, Arc::clone(&running));
    tokio::spawn(console.run(tokio::io::BufReader::new(tokio::io::stdin())));

    // ── Periodic credential rotation ──────────────────────────────────────────
    if let Some(secs) = config.session.credential_rotation_secs.filter(|s| *s > 0) {
        info!("credential rotates every {secs}s");
        let credentials = Arc::clone(&credentials);
        let host = host.clone();
        let svg_path = svg_path.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let credential = credentials.rotate();
                let payload = pairing_display::pairing_payload(&host, port, credential);
                if let Err(e) = pairing_display::show(&payload, svg_path.as_deref()) {
                    warn!("could not refresh pairing display: {e}");
                }
            }
        });
    }

    // ── Listener ──────────────────────────────────────────────────────────────
    let listener_config = ListenerConfig::from_network(&config.network).with_context(|| {
        format!("invalid bind address '{}'", config.network.bind_address)
    })?;
    run_listener(listener_config, services, running).await?;

    info!("Glide host stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
