//! Process bootstrap: store provisioning and gated startup
//!
//! Two startup paths mirror the two deployment modes:
//!
//! - [`bootstrap_plain`]: ensure key material exists, then load and validate
//!   the configuration. For trusted environments.
//! - [`bootstrap_secure`]: the hardened path. Requires the secure-environment
//!   marker, the API credential variables, and a valid TOTP code before the
//!   store is touched. Every failure is fatal - the embedding binary exits
//!   non-zero instead of continuing with reduced trust.
//!
//! First-run provisioning for the hardened path is a separate, explicit step
//! ([`provision_secure`]): it creates the key, the TOTP shared secret, and
//! the initial encrypted configuration, and returns the secret exactly once
//! for out-of-band authenticator setup. A later [`bootstrap_secure`] call
//! then verifies codes against that secret.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mfa::{self, MfaGate, SECURE_ENV_VAR, TotpSecret};
use crate::secrets::SecretStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables the hardened path requires
pub const REQUIRED_ENV_VARS: &[&str] = &[SECURE_ENV_VAR, "API_KEY", "API_SECRET"];

/// Fixed locations of the store artifacts
#[derive(Clone, Debug)]
pub struct StorePaths {
    /// Raw symmetric key
    pub key_file: PathBuf,

    /// Encrypted configuration blob
    pub config_file: PathBuf,

    /// Base32 TOTP shared secret (hardened variant only)
    pub totp_secret_file: PathBuf,
}

impl StorePaths {
    /// Conventional file names inside the given directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            key_file: dir.join("secret.key"),
            config_file: dir.join("secure_config.enc"),
            totp_secret_file: dir.join("totp_secret.key"),
        }
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

/// API credentials taken from the environment and held encrypted at rest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Exchange / data-provider API key
    pub api_key: String,

    /// Matching API secret
    pub api_secret: String,
}

impl ApiCredentials {
    /// Read credentials from `API_KEY` / `API_SECRET`
    ///
    /// Fails listing every missing variable.
    pub fn from_env() -> Result<Self> {
        mfa::require_env_vars(&["API_KEY", "API_SECRET"])?;
        Ok(Self {
            // require_env_vars just checked both
            api_key: std::env::var("API_KEY").unwrap_or_default(),
            api_secret: std::env::var("API_SECRET").unwrap_or_default(),
        })
    }
}

/// Plain bootstrap: key on first run, then load + validate
pub fn bootstrap_plain(paths: &StorePaths) -> Result<(SecretStore, Config)> {
    let store = SecretStore::new(&paths.key_file);
    if !store.key_exists() {
        store.generate_key()?;
    }

    let config = store.load_secure_config(&paths.config_file)?;
    config.validate().map_err(Error::from)?;
    Ok((store, config))
}

/// Hardened bootstrap: environment gate → env vars → TOTP → load + validate
///
/// Requires prior provisioning ([`provision_secure`]); an absent TOTP secret
/// is an error, not an implicit first run. The configuration is validated
/// before being handed back, so a successful return means acquisition can
/// start immediately.
pub fn bootstrap_secure(paths: &StorePaths, totp_code: &str) -> Result<(SecretStore, Config)> {
    mfa::check_secure_environment()?;
    mfa::require_env_vars(REQUIRED_ENV_VARS)?;

    let gate = MfaGate::new(&paths.totp_secret_file);
    gate.verify(totp_code, Utc::now())?;

    let store = SecretStore::new(&paths.key_file);
    let config = store.load_secure_config(&paths.config_file)?;
    config.validate().map_err(Error::from)?;
    Ok((store, config))
}

/// First-run provisioning for the hardened variant
///
/// Creates the encryption key (if absent), generates the TOTP shared secret,
/// and writes the initial configuration encrypted. Returns the secret - the
/// only time it is ever exposed; print it for authenticator enrollment and
/// discard it.
pub fn provision_secure(paths: &StorePaths, initial_config: &Config) -> Result<TotpSecret> {
    mfa::check_secure_environment()?;

    initial_config.validate().map_err(Error::from)?;

    let store = SecretStore::new(&paths.key_file);
    if !store.key_exists() {
        store.generate_key()?;
    }

    let gate = MfaGate::new(&paths.totp_secret_file);
    let secret = gate.generate_secret()?;

    store.save_secure_config(initial_config, &paths.config_file)?;

    tracing::info!("secure store provisioned");
    Ok(secret)
}

/// Persist the environment's API credentials encrypted at `path`
pub fn save_env_credentials(store: &SecretStore, path: &Path) -> Result<()> {
    let credentials = ApiCredentials::from_env()?;
    store.save_sensitive(&credentials, path)?;
    tracing::info!(path = %path.display(), "API credentials saved to encrypted store");
    Ok(())
}

/// Load previously saved API credentials
pub fn load_credentials(store: &SecretStore, path: &Path) -> Result<ApiCredentials> {
    Ok(store.load_sensitive(path)?)
}
