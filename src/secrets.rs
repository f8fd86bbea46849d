//! Encrypted configuration and secret storage
//!
//! This module provides at-rest confidentiality for the collector's
//! configuration: a symmetric key lives in one file, encrypted blobs in
//! others. Losing the key file makes every blob encrypted under it
//! permanently unreadable - there is no key escrow.
//!
//! Layout of an encrypted blob: a random 12-byte nonce followed by the
//! AES-256-GCM ciphertext. The key file holds the raw 32-byte key.
//!
//! # Example
//!
//! ```no_run
//! use chart_dl::secrets::SecretStore;
//! use chart_dl::config::Config;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), chart_dl::error::SecretsError> {
//! let store = SecretStore::new("secret.key");
//! if !store.key_exists() {
//!     store.generate_key()?;
//! }
//!
//! let config = Config::default();
//! store.save_secure_config(&config, Path::new("secure_config.enc"))?;
//! let loaded = store.load_secure_config(Path::new("secure_config.enc"))?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::SecretsError;
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};

/// Nonce length for AES-256-GCM (prepended to every ciphertext)
const NONCE_LEN: usize = 12;

/// Raw key length in bytes
const KEY_LEN: usize = 32;

/// Symmetric-key store for encrypted configuration files
///
/// The store owns the key file path and exclusively performs encryption and
/// decryption. There is no caching: every operation re-reads the key and the
/// blob from disk, so external rotation of either file is observed on the
/// next call.
#[derive(Clone, Debug)]
pub struct SecretStore {
    /// Location of the raw symmetric key
    key_path: PathBuf,
}

impl SecretStore {
    /// Create a store backed by the given key file path
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    /// The key file path this store reads from
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Whether key material already exists on disk
    pub fn key_exists(&self) -> bool {
        self.key_path.exists()
    }

    /// Generate new key material and persist it to the key file
    ///
    /// Key generation is a one-time, explicit, irreversible action: an
    /// existing key file is never overwritten, because blobs encrypted under
    /// it would become permanently unreadable.
    pub fn generate_key(&self) -> Result<(), SecretsError> {
        if self.key_path.exists() {
            return Err(SecretsError::KeyExists(self.key_path.clone()));
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        write_atomic(&self.key_path, key.as_slice())?;

        tracing::info!(path = %self.key_path.display(), "encryption key generated and saved");
        Ok(())
    }

    /// Encrypt plaintext under the on-disk key
    ///
    /// Returns `nonce || ciphertext` with a fresh random nonce per call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretsError> {
        let key = self.load_key()?;
        let cipher = Aes256Gcm::new(&key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| SecretsError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce || ciphertext` produced by [`encrypt`](Self::encrypt)
    ///
    /// Fails with [`SecretsError::Decryption`] if the key does not match or
    /// the ciphertext is truncated or corrupt.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretsError> {
        let key = self.load_key()?;

        if data.len() < NONCE_LEN {
            return Err(SecretsError::Decryption(format!(
                "ciphertext is {} bytes, shorter than the {NONCE_LEN}-byte nonce",
                data.len()
            )));
        }

        let cipher = Aes256Gcm::new(&key);
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        cipher.decrypt(nonce, &data[NONCE_LEN..]).map_err(|_| {
            SecretsError::Decryption(
                "authentication failed (wrong key or corrupt ciphertext)".to_string(),
            )
        })
    }

    /// Serialize, encrypt, and atomically persist a sensitive value
    ///
    /// The write goes to a temporary file in the same directory and is
    /// renamed into place, so a crash never leaves a partial blob at `path`.
    pub fn save_sensitive<T: Serialize>(&self, value: &T, path: &Path) -> Result<(), SecretsError> {
        let plaintext = serde_json::to_vec(value)?;
        let encrypted = self.encrypt(&plaintext)?;
        write_atomic(path, &encrypted)?;

        tracing::info!(path = %path.display(), "sensitive data saved");
        Ok(())
    }

    /// Read, decrypt, and deserialize a sensitive value
    pub fn load_sensitive<T: DeserializeOwned>(&self, path: &Path) -> Result<T, SecretsError> {
        let encrypted = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SecretsError::BlobNotFound(path.to_path_buf())
            } else {
                SecretsError::Io(e)
            }
        })?;
        let plaintext = self.decrypt(&encrypted)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Persist the collector configuration encrypted at `path`
    pub fn save_secure_config(&self, config: &Config, path: &Path) -> Result<(), SecretsError> {
        self.save_sensitive(config, path)
    }

    /// Load the collector configuration from the encrypted file at `path`
    ///
    /// Re-reads and re-decrypts from disk on every call; a configuration
    /// rotated externally between scheduler ticks is picked up by the next
    /// tick.
    pub fn load_secure_config(&self, path: &Path) -> Result<Config, SecretsError> {
        self.load_sensitive(path)
    }

    /// Read and check the raw key material
    fn load_key(&self) -> Result<Key<Aes256Gcm>, SecretsError> {
        let bytes = fs::read(&self.key_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SecretsError::KeyNotFound(self.key_path.clone())
            } else {
                SecretsError::Io(e)
            }
        })?;

        if bytes.len() != KEY_LEN {
            return Err(SecretsError::InvalidKey {
                path: self.key_path.clone(),
                reason: format!("expected {KEY_LEN} bytes, found {}", bytes.len()),
            });
        }

        Ok(*Key::<Aes256Gcm>::from_slice(&bytes))
    }
}

/// Write a file atomically: temp file in the same directory, then rename
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
