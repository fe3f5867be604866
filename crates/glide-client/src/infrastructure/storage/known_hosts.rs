//! Pinned host certificates.
//!
//! Each Glide host presents a self-signed certificate.  The first time the
//! client connects to a host it records the certificate's SHA-256
//! fingerprint here; later connections must present the same certificate.
//!
//! ```toml
//! [hosts]
//! "192.168.1.20:3000" = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{write_file, ConfigError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct KnownHostsFile {
    #[serde(default)]
    hosts: BTreeMap<String, String>,
}

/// Fingerprints keyed by `host:port`, optionally backed by a file.
#[derive(Debug, Default)]
pub struct KnownHosts {
    path: Option<PathBuf>,
    hosts: BTreeMap<String, String>,
}

impl KnownHosts {
    /// An empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] on read failures and
    /// [`ConfigError::Parse`] if the file is not valid TOML.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let file: KnownHostsFile = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KnownHostsFile::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        debug!("loaded {} pinned host(s) from {}", file.hosts.len(), path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            hosts: file.hosts,
        })
    }

    /// The pinned fingerprint for `host_key`, if any.
    pub fn fingerprint(&self, host_key: &str) -> Option<&str> {
        self.hosts.get(host_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Pins `fingerprint` for `host_key` and writes the store back.
    ///
    /// # Errors
    ///
    /// Returns the write error; the in-memory pin is kept either way.
    pub fn pin(&mut self, host_key: &str, fingerprint: &str) -> Result<(), ConfigError> {
        self.hosts.insert(host_key.to_string(), fingerprint.to_string());
        self.save()
    }

    /// Forgets `host_key` (e.g. after the host regenerated its certificate).
    ///
    /// # Errors
    ///
    /// Returns the write error.
    pub fn forget(&mut self, host_key: &str) -> Result<bool, ConfigError> {
        let removed = self.hosts.remove(host_key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = KnownHostsFile {
            hosts: self.hosts.clone(),
        };
        write_file(path, &toml::to_string_pretty(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("glide-known-hosts-{}", uuid::Uuid::new_v4()))
            .join("known_hosts.toml")
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let hosts = KnownHosts::open(&temp_path()).expect("open");
        assert!(hosts.is_empty());
    }

    #[test]
    fn test_pin_persists_across_reopen() {
        // Arrange
        let path = temp_path();
        let mut hosts = KnownHosts::open(&path).expect("open");

        // Act
        hosts.pin("192.168.1.20:3000", "abcd").expect("pin");
        let reopened = KnownHosts::open(&path).expect("reopen");

        // Assert
        assert_eq!(reopened.fingerprint("192.168.1.20:3000"), Some("abcd"));
        assert_eq!(reopened.fingerprint("192.168.1.21:3000"), None);
    }

    #[test]
    fn test_forget_removes_pin() {
        let path = temp_path();
        let mut hosts = KnownHosts::open(&path).expect("open");
        hosts.pin("h:3000", "ff").unwrap();

        assert!(hosts.forget("h:3000").unwrap());
        assert!(!hosts.forget("h:3000").unwrap());
        assert!(KnownHosts::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_store_never_touches_disk() {
        let mut hosts = KnownHosts::in_memory();
        hosts.pin("h:3000", "ff").expect("in-memory pin cannot fail");
        assert_eq!(hosts.len(), 1);
    }
}
