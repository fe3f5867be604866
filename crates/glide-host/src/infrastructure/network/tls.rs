//! Self-signed TLS identity for the host listener.
//!
//! The host has no domain name and no certificate authority, so it creates a
//! self-signed certificate with `rcgen` the first time it runs and caches it
//! as two DER files:
//!
//! ```text
//! <cert dir>/cert.der   certificate
//! <cert dir>/key.der    PKCS#8 private key (0600 on Unix)
//! ```
//!
//! Reusing the same certificate across restarts keeps its fingerprint stable,
//! which is what the phone pins on first use.  Delete both files to force a
//! new identity; every paired phone will then see an unknown fingerprint.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glide_core::certificate_fingerprint;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tracing::{info, warn};

const CERT_FILE: &str = "cert.der";
const KEY_FILE: &str = "key.der";

/// Errors raised while loading, creating or using the host certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration rejected the certificate: {0}")]
    Tls(#[from] rustls::Error),
}

/// The host's certificate and private key.
pub struct TlsIdentity {
    cert: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
}

impl TlsIdentity {
    /// Generates a fresh self-signed identity valid for `names`.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Generate`] if `rcgen` fails.
    pub fn generate(names: Vec<String>) -> Result<Self, CertificateError> {
        let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(names)?;
        Ok(Self {
            cert: cert.der().clone(),
            key: PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
        })
    }

    /// Loads the cached identity from `dir`, generating and saving one when
    /// either file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError`] on I/O or generation failure.
    pub fn load_or_generate(dir: &Path, names: Vec<String>) -> Result<Self, CertificateError> {
        let cert_path = dir.join(CERT_FILE);
        let key_path = dir.join(KEY_FILE);

        if cert_path.exists() && key_path.exists() {
            let cert = read(&cert_path)?;
            let key = read(&key_path)?;
            let identity = Self {
                cert: CertificateDer::from(cert),
                key: PrivatePkcs8KeyDer::from(key),
            };
            info!(
                "loaded TLS certificate from {} (fingerprint {})",
                cert_path.display(),
                identity.fingerprint()
            );
            return Ok(identity);
        }

        if cert_path.exists() != key_path.exists() {
            warn!("incomplete certificate cache in {}; regenerating", dir.display());
        }

        let identity = Self::generate(names)?;
        std::fs::create_dir_all(dir).map_err(|source| CertificateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write(&cert_path, identity.cert.as_ref(), false)?;
        write(&key_path, identity.key.secret_pkcs8_der(), true)?;
        info!(
            "generated new TLS certificate in {} (fingerprint {})",
            dir.display(),
            identity.fingerprint()
        );
        Ok(identity)
    }

    /// SHA-256 fingerprint of the certificate, as phones will pin it.
    pub fn fingerprint(&self) -> String {
        certificate_fingerprint(self.cert.as_ref())
    }

    /// DER bytes of the certificate.
    pub fn certificate_der(&self) -> &[u8] {
        self.cert.as_ref()
    }

    /// Builds a rustls server configuration using the `ring` provider.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Tls`] if the key does not match the
    /// certificate or the provider rejects the protocol versions.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, CertificateError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(
                vec![self.cert.clone()],
                PrivateKeyDer::Pkcs8(self.key.clone_key()),
            )?;
        Ok(Arc::new(config))
    }
}

/// Subject alternative names for a host reachable as `address`.
pub fn subject_names(address: &str) -> Vec<String> {
    let mut names = vec!["localhost".to_string(), "glide.local".to_string()];
    if !names.iter().any(|n| n == address) {
        names.push(address.to_string());
    }
    names
}

fn read(path: &Path) -> Result<Vec<u8>, CertificateError> {
    std::fs::read(path).map_err(|source| CertificateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, bytes: &[u8], private: bool) -> Result<(), CertificateError> {
    std::fs::write(path, bytes).map_err(|source| CertificateError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if private {
        restrict_to_owner(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), CertificateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        CertificateError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), CertificateError> {
    Ok(())
}
