//! Error types for chart-dl
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (Validation, Secrets, Mfa, Fetch, Persistence)
//! - A single top-level [`Error`] that all fallible operations converge on
//! - A clear split between fatal preconditions (environment, MFA), whole-tick
//!   configuration errors, and per-asset job errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chart-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chart-dl
///
/// Each variant wraps a domain error. Fatal preconditions ([`MfaError`]) and
/// configuration errors ([`ValidationError`], [`SecretsError`]) terminate the
/// run; fetch and persistence errors are per-asset and absorbed by the
/// pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration shape validation failed
    #[error("configuration validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encrypted store operation failed
    #[error("secret store error: {0}")]
    Secrets(#[from] SecretsError),

    /// Multi-factor / environment precondition failed
    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),

    /// Chart fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Artifact persistence failed
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration validation errors
///
/// Raised by [`Config::validate`](crate::config::Config::validate) before any
/// acquisition work begins. A tick that hits one of these aborts entirely.
/// Missing top-level keys are caught earlier, at deserialization, where serde
/// names the absent field.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A notification channel is selected but its settings section is absent
    #[error("missing required config section `{key}` (needed by notification method `{needed_by}`)")]
    MissingSettings {
        /// The absent configuration key (e.g. "email")
        key: &'static str,
        /// The notification method that requires it
        needed_by: String,
    },

    /// The per-asset parallel lists do not all have the same length
    #[error(
        "per-asset lists must have equal length: `assets` has {expected}, but {}",
        format_lengths(.mismatched)
    )]
    LengthMismatch {
        /// Expected length, taken from the asset list
        expected: usize,
        /// Every list whose length differs, with its actual length
        mismatched: Vec<(&'static str, usize)>,
    },

    /// Poll interval must be at least one minute
    #[error("`interval_minutes` must be greater than zero")]
    ZeroInterval,

    /// At least one fetch attempt is required per asset
    #[error("`retries` (max attempts) must be greater than zero")]
    ZeroRetries,

    /// An API base URL failed to parse
    #[error("`api_urls[{index}]` is not a valid URL: {url}: {reason}")]
    InvalidApiUrl {
        /// Index into the api_urls list
        index: usize,
        /// The offending value
        url: String,
        /// Parser message
        reason: String,
    },

    /// The configured time zone name is unknown
    #[error("unknown time zone `{name}`")]
    InvalidTimeZone {
        /// The unrecognized zone name
        name: String,
    },
}

fn format_lengths(mismatched: &[(&'static str, usize)]) -> String {
    mismatched
        .iter()
        .map(|(name, len)| format!("`{name}` has {len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Encrypted secret store errors
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Refusing to overwrite existing key material
    #[error("key file already exists at {0}: refusing to overwrite (blobs encrypted under it would become unreadable)")]
    KeyExists(PathBuf),

    /// Key file is absent
    #[error("key file not found at {0}")]
    KeyNotFound(PathBuf),

    /// Key file exists but does not hold valid key material
    #[error("invalid key file at {path}: {reason}")]
    InvalidKey {
        /// Location of the bad key file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key, truncated or corrupt ciphertext)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The encrypted blob file is absent
    #[error("encrypted file not found at {0}")]
    BlobNotFound(PathBuf),

    /// I/O error while reading or writing store files
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decrypted payload failed to deserialize
    #[error("store payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Multi-factor authentication and environment precondition errors
///
/// All of these are fatal: the embedding process must exit non-zero rather
/// than continue with reduced trust.
#[derive(Debug, Error)]
pub enum MfaError {
    /// The secure-environment marker variable is absent or not "true"
    #[error("not running in a secure environment: set the {variable} environment variable to 'true'")]
    InsecureEnvironment {
        /// Name of the marker variable
        variable: String,
    },

    /// One or more required environment variables are unset
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    /// Refusing to overwrite an existing TOTP secret
    #[error("TOTP secret already exists at {0}: refusing to overwrite")]
    SecretExists(PathBuf),

    /// TOTP secret file is absent
    #[error("TOTP secret not found at {0}")]
    SecretNotFound(PathBuf),

    /// Stored TOTP secret is not valid base32
    #[error("invalid TOTP secret: {0}")]
    InvalidSecret(String),

    /// The supplied one-time code did not verify
    #[error("invalid TOTP code")]
    CodeRejected,

    /// I/O error while reading or writing the secret file
    #[error("MFA I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chart fetch errors for a single asset
///
/// A small closed set of failure kinds so that retry policy can map each kind
/// to "retry" or "do not retry" explicitly (see
/// [`IsRetryable`](crate::retry::IsRetryable)).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request timed out
    #[error("request timed out: {url}")]
    Timeout {
        /// The request URL
        url: String,
    },

    /// Could not establish a connection
    #[error("connection failed: {url}: {message}")]
    Connect {
        /// The request URL
        url: String,
        /// Transport-level detail
        message: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP status {status} from {url}")]
    Status {
        /// The request URL
        url: String,
        /// The non-2xx status code
        status: u16,
    },

    /// Failed while reading the response body
    #[error("failed to read response body from {url}: {message}")]
    Body {
        /// The request URL
        url: String,
        /// Transport-level detail
        message: String,
    },

    /// Any other transport-level failure
    #[error("transport error: {url}: {message}")]
    Transport {
        /// The request URL
        url: String,
        /// Transport-level detail
        message: String,
    },
}

impl FetchError {
    /// Classify a reqwest error into one of the closed fetch failure kinds
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if e.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if e.is_body() || e.is_decode() {
            FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Artifact persistence errors for a single asset
///
/// Treated by the pipeline as job-level failures, equivalent to fetch
/// exhaustion for notification purposes.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Could not create the output directory
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// The directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Could not write the chart artifact
    #[error("failed to write chart artifact {path}: {source}")]
    WriteArtifact {
        /// The artifact path that could not be written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
