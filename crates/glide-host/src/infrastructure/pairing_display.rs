//! Pairing display: shows the credential, the address and a QR code.
//!
//! The QR code encodes the compact JSON pairing payload
//! (`{"ip":"...","pin":"..."}`) so the phone can pair by scanning instead of
//! typing.  It is rendered to the terminal with Unicode half blocks, and
//! optionally written as an SVG file for a GUI shell to pick up.
//!
//! This output goes to stdout, not to the log: the credential must never be
//! written to a log file.

use std::net::Ipv6Addr;
use std::path::Path;

use glide_core::protocol::messages::DEFAULT_PORT;
use glide_core::{Credential, PairingPayload};
use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;
use tracing::info;

/// Errors produced while rendering or saving the pairing QR code.
#[derive(Debug, Error)]
pub enum PairingDisplayError {
    #[error("pairing payload does not fit in a QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("could not write QR code to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builds the payload a phone needs to reach this host.
///
/// The port is only included when it differs from [`DEFAULT_PORT`], so the
/// common case stays a bare address.
pub fn pairing_payload(host: &str, port: u16, credential: Credential) -> PairingPayload {
    let address = if port == DEFAULT_PORT {
        host.to_string()
    } else if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    PairingPayload::new(address, credential)
}

fn qr(payload: &PairingPayload) -> Result<QrCode, PairingDisplayError> {
    Ok(QrCode::with_error_correction_level(
        payload.encode().as_bytes(),
        EcLevel::M,
    )?)
}

/// Renders the QR code as terminal text (two modules per character row).
///
/// # Errors
///
/// Returns [`PairingDisplayError::Encode`] if the payload is too large.
pub fn render_terminal(payload: &PairingPayload) -> Result<String, PairingDisplayError> {
    Ok(qr(payload)?
        .render::<unicode::Dense1x2>()
        // Inverted so the code scans on dark terminal backgrounds.
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Renders the QR code as an SVG document.
///
/// # Errors
///
/// Returns [`PairingDisplayError::Encode`] if the payload is too large.
pub fn render_svg(payload: &PairingPayload) -> Result<String, PairingDisplayError> {
    Ok(qr(payload)?
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build())
}

/// Prints the pairing banner to stdout and optionally writes the SVG.
///
/// # Errors
///
/// Returns [`PairingDisplayError`] if rendering or writing the SVG fails.
pub fn show(payload: &PairingPayload, svg_path: Option<&Path>) -> Result<(), PairingDisplayError> {
    let code = render_terminal(payload)?;
    println!();
    println!("  Glide is ready. On your phone, scan the code or enter:");
    println!();
    println!("    Address  {}", payload.host_address);
    println!("    PIN      {}", payload.credential);
    println!();
    println!("{code}");

    if let Some(path) = svg_path {
        std::fs::write(path, render_svg(payload)?).map_err(|source| PairingDisplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("pairing QR code written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::parse("482913").unwrap()
    }

    #[test]
    fn test_default_port_is_omitted_from_payload() {
        let payload = pairing_payload("192.168.1.20", 3000, credential());
        assert_eq!(payload.host_address, "192.168.1.20");
    }

    #[test]
    fn test_custom_port_is_included() {
        assert_eq!(
            pairing_payload("192.168.1.20", 4443, credential()).host_address,
            "192.168.1.20:4443"
        );
        assert_eq!(
            pairing_payload("fe80::1", 4443, credential()).host_address,
            "[fe80::1]:4443"
        );
    }

    #[test]
    fn test_payload_with_port_decodes_to_same_endpoint() {
        // Arrange
        let payload = pairing_payload("fe80::1", 4443, credential());

        // Act
        let decoded = PairingPayload::decode(&payload.encode()).unwrap();

        // Assert
        assert_eq!(decoded.host_and_port(DEFAULT_PORT), ("fe80::1".to_string(), 4443));
    }

    #[test]
    fn test_terminal_render_is_square_block_art() {
        let text = render_terminal(&pairing_payload("10.0.0.5", 3000, credential())).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.len() > 10);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_svg_render_is_svg() {
        let svg = render_svg(&pairing_payload("10.0.0.5", 3000, credential())).unwrap();
        assert!(svg.contains("<svg"));
    }
}
