//! Certificate pinning for self-signed Glide hosts.
//!
//! There is no certificate authority between a phone and the computer it
//! controls.  Instead the client pins each host's certificate on first use:
//!
//! 1. Unknown host + [`TrustPolicy::TrustOnFirstUse`]: accept, log the
//!    fingerprint as a warning, and let the connector write it to the
//!    known-hosts file once the session is up.
//! 2. Known host: the presented certificate must hash to the pinned value.
//! 3. Anything else is refused and surfaces as `ConnectError::UntrustedHost`.
//!
//! Handshake signatures are still verified with the provider's algorithms,
//! so a peer cannot present a pinned certificate without its private key.

use std::sync::{Arc, Mutex, PoisonError};

use glide_core::certificate_fingerprint;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};

/// What to do with a host that has no pinned certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Accept and pin it.  The caller has obtained the user's consent.
    TrustOnFirstUse,
    /// Refuse it.
    PinnedOnly,
}

impl TrustPolicy {
    pub fn from_consent(trust_on_first_use: bool) -> Self {
        if trust_on_first_use {
            TrustPolicy::TrustOnFirstUse
        } else {
            TrustPolicy::PinnedOnly
        }
    }
}

/// Outcome of checking one presented certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustVerdict {
    /// Matches the pinned fingerprint.
    Pinned,
    /// Not seen before; accepted under [`TrustPolicy::TrustOnFirstUse`].
    FirstUse { fingerprint: String },
    /// Differs from the pinned fingerprint.
    Mismatch { expected: String, presented: String },
    /// Not seen before and the policy refuses unknown hosts.
    Unknown { presented: String },
}

impl TrustVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TrustVerdict::Pinned | TrustVerdict::FirstUse { .. })
    }
}

/// A [`ServerCertVerifier`] that checks the end-entity certificate against
/// one pinned SHA-256 fingerprint instead of a CA chain.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    expected: Option<String>,
    policy: TrustPolicy,
    provider: Arc<CryptoProvider>,
    verdict: Mutex<Option<TrustVerdict>>,
}

impl PinnedCertVerifier {
    pub fn new(expected: Option<String>, policy: TrustPolicy, provider: Arc<CryptoProvider>) -> Self {
        Self {
            expected,
            policy,
            provider,
            verdict: Mutex::new(None),
        }
    }

    /// The verdict of the last handshake, once the certificate was seen.
    pub fn verdict(&self) -> Option<TrustVerdict> {
        self.verdict
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn judge(&self, presented: String) -> TrustVerdict {
        match (&self.expected, self.policy) {
            (Some(expected), _) if *expected == presented => TrustVerdict::Pinned,
            (Some(expected), _) => TrustVerdict::Mismatch {
                expected: expected.clone(),
                presented,
            },
            (None, TrustPolicy::TrustOnFirstUse) => TrustVerdict::FirstUse { fingerprint: presented },
            (None, TrustPolicy::PinnedOnly) => TrustVerdict::Unknown { presented },
        }
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verdict = self.judge(certificate_fingerprint(end_entity.as_ref()));
        match &verdict {
            TrustVerdict::Pinned => debug!("host certificate matches pinned fingerprint"),
            TrustVerdict::FirstUse { fingerprint } => {
                warn!("host not seen before; trusting certificate {fingerprint} on first use")
            }
            TrustVerdict::Mismatch { expected, presented } => {
                warn!("host certificate {presented} does not match pinned {expected}")
            }
            TrustVerdict::Unknown { presented } => {
                warn!("refusing unknown host certificate {presented}")
            }
        }

        let accepted = verdict.is_accepted();
        *self.verdict.lock().unwrap_or_else(PoisonError::into_inner) = Some(verdict);
        if accepted {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Builds a client TLS configuration around `verifier`.
///
/// # Errors
///
/// Returns a rustls error if the provider supports no safe protocol version.
pub fn client_config(
    verifier: Arc<PinnedCertVerifier>,
    provider: Arc<CryptoProvider>,
) -> Result<ClientConfig, rustls::Error> {
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(expected: Option<&str>, policy: TrustPolicy) -> PinnedCertVerifier {
        PinnedCertVerifier::new(
            expected.map(str::to_string),
            policy,
            Arc::new(rustls::crypto::ring::default_provider()),
        )
    }

    fn present(verifier: &PinnedCertVerifier, der: &[u8]) -> Result<ServerCertVerified, rustls::Error> {
        verifier.verify_server_cert(
            &CertificateDer::from(der.to_vec()),
            &[],
            &ServerName::try_from("localhost").unwrap(),
            &[],
            UnixTime::now(),
        )
    }

    #[test]
    fn test_unknown_host_is_pinned_on_first_use() {
        // Arrange
        let v = verifier(None, TrustPolicy::TrustOnFirstUse);

        // Act
        let result = present(&v, b"certificate");

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            v.verdict(),
            Some(TrustVerdict::FirstUse {
                fingerprint: certificate_fingerprint(b"certificate")
            })
        );
    }

    #[test]
    fn test_unknown_host_is_refused_without_consent() {
        let v = verifier(None, TrustPolicy::PinnedOnly);
        assert!(present(&v, b"certificate").is_err());
        assert!(matches!(v.verdict(), Some(TrustVerdict::Unknown { .. })));
    }

    #[test]
    fn test_matching_pin_is_accepted() {
        let pinned = certificate_fingerprint(b"certificate");
        let v = verifier(Some(&pinned), TrustPolicy::PinnedOnly);

        assert!(present(&v, b"certificate").is_ok());
        assert_eq!(v.verdict(), Some(TrustVerdict::Pinned));
    }

    #[test]
    fn test_changed_certificate_is_refused_even_with_first_use_trust() {
        // Arrange
        let pinned = certificate_fingerprint(b"old certificate");
        let v = verifier(Some(&pinned), TrustPolicy::TrustOnFirstUse);

        // Act
        let result = present(&v, b"new certificate");

        // Assert
        assert!(result.is_err());
        assert_eq!(
            v.verdict(),
            Some(TrustVerdict::Mismatch {
                expected: pinned,
                presented: certificate_fingerprint(b"new certificate"),
            })
        );
    }

    #[test]
    fn test_policy_from_consent() {
        assert_eq!(TrustPolicy::from_consent(true), TrustPolicy::TrustOnFirstUse);
        assert_eq!(TrustPolicy::from_consent(false), TrustPolicy::PinnedOnly);
    }
}
