//! The six-digit pairing credential.
//!
//! A [`Credential`] is the shared secret a client must present during the
//! handshake.  It is shown on the host screen (as digits and inside the
//! pairing QR code) and typed or scanned on the phone.
//!
//! The value is compared by exact string equality.  It is never persisted and
//! its `Debug` output is redacted so that it does not end up in log files when
//! a struct holding it is logged with `{:?}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal digits in a credential.
pub const CREDENTIAL_LEN: usize = 6;

/// Errors produced when a string or number is not a valid credential.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The value does not have exactly six characters.
    #[error("credential must be exactly {CREDENTIAL_LEN} digits, got {0} characters")]
    WrongLength(usize),

    /// The value contains a character other than `0`-`9`.
    #[error("credential must contain only ASCII digits")]
    NotNumeric,

    /// A numeric code does not fit in six digits.
    #[error("credential code {0} exceeds six digits")]
    OutOfRange(u32),
}

/// A validated six-digit decimal credential.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credential(String);

impl Credential {
    /// Parses a credential, requiring exactly six ASCII digits.
    ///
    /// Leading and trailing whitespace is **not** trimmed: `" 123456"` is
    /// rejected.  Callers reading user input should trim first.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the input is not six ASCII digits.
    pub fn parse(value: &str) -> Result<Self, CredentialError> {
        let len = value.chars().count();
        if len != CREDENTIAL_LEN {
            return Err(CredentialError::WrongLength(len));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CredentialError::NotNumeric);
        }
        Ok(Self(value.to_string()))
    }

    /// Builds a credential from a numeric code, zero-padded to six digits.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::OutOfRange`] for codes above `999_999`.
    pub fn from_code(code: u32) -> Result<Self, CredentialError> {
        if code > 999_999 {
            return Err(CredentialError::OutOfRange(code));
        }
        Ok(Self(format!("{code:06}")))
    }

    /// Returns the digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when `presented` equals this credential exactly.
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(******)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Credential {
    type Error = CredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Credential> for String {
    fn from(value: Credential) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_six_digits() {
        let credential = Credential::parse("482913").unwrap();
        assert_eq!(credential.as_str(), "482913");
    }

    #[test]
    fn test_parse_rejects_five_and_seven_digits() {
        assert_eq!(Credential::parse("48291"), Err(CredentialError::WrongLength(5)));
        assert_eq!(Credential::parse("4829130"), Err(CredentialError::WrongLength(7)));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert_eq!(Credential::parse("48291a"), Err(CredentialError::NotNumeric));
        assert_eq!(Credential::parse(" 48291"), Err(CredentialError::NotNumeric));
    }

    #[test]
    fn test_parse_rejects_non_ascii_digits_by_char_count() {
        // Arabic-Indic digits are numeric but not ASCII.
        assert_eq!(Credential::parse("٤٨٢٩١٣"), Err(CredentialError::NotNumeric));
    }

    #[test]
    fn test_from_code_zero_pads() {
        assert_eq!(Credential::from_code(42).unwrap().as_str(), "000042");
        assert!(matches!(
            Credential::from_code(1_000_000),
            Err(CredentialError::OutOfRange(1_000_000))
        ));
    }

    #[test]
    fn test_matches_is_exact() {
        // Arrange
        let credential = Credential::parse("482913").unwrap();

        // Act / Assert
        assert!(credential.matches("482913"));
        assert!(!credential.matches("482914"));
        assert!(!credential.matches("482913 "));
        assert!(!credential.matches(""));
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let credential = Credential::parse("482913").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("482913"), "debug output leaked the credential: {debug}");
    }

    #[test]
    fn test_serde_uses_plain_string_and_validates() {
        let credential = Credential::parse("000123").unwrap();
        let json = serde_json::to_string(&credential).unwrap();
        assert_eq!(json, "\"000123\"");

        let bad: Result<Credential, _> = serde_json::from_str("\"12ab56\"");
        assert!(bad.is_err());
    }
}
