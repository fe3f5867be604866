//! Pairing payload: the content of the QR code shown by the host.
//!
//! The payload is a compact JSON object with two string fields:
//!
//! ```json
//! {"ip":"192.168.1.20","pin":"482913"}
//! ```
//!
//! `ip` is the host address as the phone should dial it.  It may be a bare IP
//! address, a host name, or either of those followed by `:port`.  When no
//! port is present the client uses [`crate::protocol::DEFAULT_PORT`].
//!
//! The payload carries no secrecy of its own: whoever can see the host screen
//! can pair.  It is only a convenience over typing the address and digits.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::credential::{Credential, CredentialError};

/// Errors produced by [`PairingPayload::decode`].
#[derive(Debug, Error, PartialEq)]
pub enum PairingDecodeError {
    /// The text is not a JSON object with string `ip` and `pin` fields.
    #[error("malformed pairing payload: {0}")]
    Malformed(String),

    /// The `ip` field is empty.
    #[error("pairing payload has an empty host address")]
    EmptyAddress,

    /// The `pin` field is not a valid credential.
    #[error("pairing payload has an invalid credential: {0}")]
    InvalidCredential(#[from] CredentialError),
}

/// Everything a client needs to connect: where, and with which credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingPayload {
    #[serde(rename = "ip")]
    pub host_address: String,
    #[serde(rename = "pin")]
    pub credential: Credential,
}

/// Wire shape used while decoding, so that a bad `pin` can be reported as a
/// credential error rather than a generic JSON error.
#[derive(Deserialize)]
struct RawPayload {
    ip: String,
    pin: String,
}

impl PairingPayload {
    pub fn new(host_address: impl Into<String>, credential: Credential) -> Self {
        Self {
            host_address: host_address.into(),
            credential,
        }
    }

    /// Serializes the payload to the compact JSON embedded in the QR code.
    pub fn encode(&self) -> String {
        serde_json::json!({
            "ip": self.host_address,
            "pin": self.credential.as_str(),
        })
        .to_string()
    }

    /// Parses a scanned QR payload.
    ///
    /// Unknown extra fields are ignored so that newer hosts can add fields
    /// without breaking older clients.
    ///
    /// # Errors
    ///
    /// Returns [`PairingDecodeError`] if the text is not a payload object, the
    /// address is blank, or the credential is not six digits.
    pub fn decode(text: &str) -> Result<Self, PairingDecodeError> {
        let raw: RawPayload = serde_json::from_str(text.trim())
            .map_err(|e| PairingDecodeError::Malformed(e.to_string()))?;

        let host_address = raw.ip.trim().to_string();
        if host_address.is_empty() {
            return Err(PairingDecodeError::EmptyAddress);
        }

        let credential = Credential::parse(&raw.pin)?;
        Ok(Self {
            host_address,
            credential,
        })
    }

    /// Splits the host address into `(host, port)`, falling back to
    /// `default_port` when the address carries none.
    ///
    /// Bare IPv6 literals (`fe80::1`) are treated as addresses without a
    /// port; use the bracketed form (`[fe80::1]:3000`) to give one.
    pub fn host_and_port(&self, default_port: u16) -> (String, u16) {
        split_host_port(&self.host_address, default_port)
    }
}

/// Splits `host[:port]`, see [`PairingPayload::host_and_port`].
pub fn split_host_port(address: &str, default_port: u16) -> (String, u16) {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return (ip.to_string(), default_port);
    }
    if let Ok(socket) = address.parse::<SocketAddr>() {
        return (socket.ip().to_string(), socket.port());
    }
    if let Some((host, port)) = address.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            if !host.is_empty() && !host.contains(':') {
                return (host.to_string(), port);
            }
        }
    }
    (address.to_string(), default_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(ip: &str, pin: &str) -> PairingPayload {
        PairingPayload::new(ip, Credential::parse(pin).unwrap())
    }

    #[test]
    fn test_encode_uses_ip_and_pin_field_names() {
        let json = payload("192.168.1.20", "482913").encode();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ip"], "192.168.1.20");
        assert_eq!(value["pin"], "482913");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_decode_reproduces_encoded_payload() {
        let cases = [
            ("192.168.1.20:3000", "000917"),
            ("192.168.1.20", "482913"),
            ("my-laptop.local", "000000"),
            ("my-laptop:4443", "999999"),
            ("[fe80::1]:3000", "000000"),
            ("fe80::1", "999999"),
        ];

        for (address, pin) in cases {
            // Arrange
            let original = payload(address, pin);

            // Act
            let decoded = PairingPayload::decode(&original.encode()).unwrap();

            // Assert
            assert_eq!(decoded, original, "address {address}");
            assert_eq!(decoded.credential.as_str(), pin);
        }
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let decoded =
            PairingPayload::decode(r#"{"ip":"10.0.0.5","pin":"123456","v":2}"#).unwrap();
        assert_eq!(decoded.host_address, "10.0.0.5");
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(matches!(
            PairingPayload::decode("https://example.com"),
            Err(PairingDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_pin() {
        assert!(matches!(
            PairingPayload::decode(r#"{"ip":"10.0.0.5"}"#),
            Err(PairingDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_numeric_pin_field() {
        // The host always writes the pin as a string; a number would lose
        // leading zeros.
        assert!(matches!(
            PairingPayload::decode(r#"{"ip":"10.0.0.5","pin":123456}"#),
            Err(PairingDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_credential() {
        assert_eq!(
            PairingPayload::decode(r#"{"ip":"10.0.0.5","pin":"12345"}"#),
            Err(PairingDecodeError::InvalidCredential(CredentialError::WrongLength(5)))
        );
    }

    #[test]
    fn test_decode_rejects_blank_address() {
        assert_eq!(
            PairingPayload::decode(r#"{"ip":"  ","pin":"123456"}"#),
            Err(PairingDecodeError::EmptyAddress)
        );
    }

    #[test]
    fn test_host_and_port_variants() {
        assert_eq!(split_host_port("10.0.0.5", 3000), ("10.0.0.5".into(), 3000));
        assert_eq!(split_host_port("10.0.0.5:4443", 3000), ("10.0.0.5".into(), 4443));
        assert_eq!(split_host_port("desk.local:8080", 3000), ("desk.local".into(), 8080));
        assert_eq!(split_host_port("desk.local", 3000), ("desk.local".into(), 3000));
        assert_eq!(split_host_port("fe80::1", 3000), ("fe80::1".into(), 3000));
        assert_eq!(split_host_port("[fe80::1]:9000", 3000), ("fe80::1".into(), 9000));
        assert_eq!(split_host_port("localhost", 3000), ("localhost".into(), 3000));
    }
}
