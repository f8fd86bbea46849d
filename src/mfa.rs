//! TOTP second factor and secure-environment preconditions
//!
//! The hardened bootstrap path requires three gates before any secret store
//! access: the `SECURE_ENV` marker variable, the presence of required
//! credential variables, and a valid time-based one-time password. All three
//! are fatal preconditions - on failure the embedding process must exit
//! non-zero rather than continue with reduced trust.
//!
//! Codes follow RFC 6238: 30-second time step, 6 digits, HMAC-SHA1, with a
//! tolerance of one step in either direction. The shared secret is a random
//! 160-bit value stored base32-encoded, compatible with standard
//! authenticator apps.

use crate::error::MfaError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fs;
use std::path::{Path, PathBuf};

type HmacSha1 = Hmac<Sha1>;

/// Name of the secure-environment marker variable
pub const SECURE_ENV_VAR: &str = "SECURE_ENV";

/// Time step length in seconds
const TOTP_STEP_SECS: i64 = 30;

/// Number of code digits
const TOTP_DIGITS: u32 = 6;

/// Accepted clock skew, in time steps, in each direction
const TOTP_SKEW_STEPS: i64 = 1;

/// Random secret length in bytes (160 bits, the RFC 4226 recommendation)
const SECRET_BYTES: usize = 20;

/// A TOTP shared secret
///
/// Never transmitted; only compared locally. The base32 form is exposed
/// exactly once at generation time for authenticator provisioning.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    encoded: String,
}

impl TotpSecret {
    /// Generate a fresh random secret
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            encoded: base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes),
        }
    }

    /// Parse a base32-encoded secret
    pub fn from_base32(s: &str) -> Result<Self, MfaError> {
        let trimmed = s.trim().to_uppercase();
        match base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &trimmed) {
            Some(bytes) if !bytes.is_empty() => Ok(Self { encoded: trimmed }),
            _ => Err(MfaError::InvalidSecret(format!(
                "not valid base32: {} characters",
                trimmed.len()
            ))),
        }
    }

    /// The base32 form, for provisioning an authenticator app
    pub fn as_base32(&self) -> &str {
        &self.encoded
    }

    /// Raw key bytes for the HMAC
    fn key_bytes(&self) -> Vec<u8> {
        // Construction guarantees valid base32
        base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &self.encoded)
            .unwrap_or_default()
    }

    /// The expected code for the given time
    pub fn code_at(&self, now: DateTime<Utc>) -> String {
        let step = now.timestamp().div_euclid(TOTP_STEP_SECS);
        code_for_step(&self.key_bytes(), step.max(0) as u64)
    }

    /// Verify a code against this secret at the given time
    ///
    /// Valid iff the code matches the expected time-step-derived code within
    /// the standard tolerance window (one step either side); anything else is
    /// rejected.
    pub fn verify(&self, code: &str, now: DateTime<Utc>) -> bool {
        let code = code.trim();
        if code.len() != TOTP_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let key = self.key_bytes();
        let current_step = now.timestamp().div_euclid(TOTP_STEP_SECS);
        (-TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS).any(|skew| {
            let step = current_step + skew;
            step >= 0 && code_for_step(&key, step as u64) == code
        })
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak the secret through Debug output
        f.write_str("TotpSecret(..)")
    }
}

/// RFC 4226 HOTP truncation for one counter value
fn code_for_step(key: &[u8], step: u64) -> String {
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        // HMAC accepts any key length; unreachable in practice
        Err(_) => return String::new(),
    };
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(TOTP_DIGITS);
    format!("{code:0width$}", width = TOTP_DIGITS as usize)
}

/// MFA gate guarding store bootstrap in secure-environment mode
///
/// Owns the TOTP secret file: generation (once), loading, and verification.
#[derive(Clone, Debug)]
pub struct MfaGate {
    /// Location of the base32 secret file
    secret_path: PathBuf,
}

impl MfaGate {
    /// Create a gate backed by the given secret file path
    pub fn new(secret_path: impl Into<PathBuf>) -> Self {
        Self {
            secret_path: secret_path.into(),
        }
    }

    /// The secret file path this gate reads from
    pub fn secret_path(&self) -> &Path {
        &self.secret_path
    }

    /// Whether a shared secret already exists on disk
    pub fn secret_exists(&self) -> bool {
        self.secret_path.exists()
    }

    /// Generate and persist a new shared secret
    ///
    /// Refuses to overwrite an existing secret. The returned value is the
    /// single opportunity to provision an authenticator app; it is not
    /// logged and cannot be recovered in base32 form later by design intent.
    pub fn generate_secret(&self) -> Result<TotpSecret, MfaError> {
        if self.secret_path.exists() {
            return Err(MfaError::SecretExists(self.secret_path.clone()));
        }

        let secret = TotpSecret::generate();
        fs::write(&self.secret_path, secret.as_base32())?;

        tracing::info!(
            path = %self.secret_path.display(),
            "TOTP secret generated; provision your authenticator app now"
        );
        Ok(secret)
    }

    /// Load the shared secret from disk
    pub fn load_secret(&self) -> Result<TotpSecret, MfaError> {
        let contents = fs::read_to_string(&self.secret_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MfaError::SecretNotFound(self.secret_path.clone())
            } else {
                MfaError::Io(e)
            }
        })?;
        TotpSecret::from_base32(&contents)
    }

    /// Verify a one-time code against the stored secret at the given time
    ///
    /// Returns `Ok(())` only for a valid code; an invalid code is
    /// [`MfaError::CodeRejected`], which callers must treat as fatal - there
    /// is no partial or degraded mode.
    pub fn verify(&self, code: &str, now: DateTime<Utc>) -> Result<(), MfaError> {
        let secret = self.load_secret()?;
        if secret.verify(code, now) {
            tracing::info!("MFA successful");
            Ok(())
        } else {
            tracing::error!("invalid TOTP code, MFA failed");
            Err(MfaError::CodeRejected)
        }
    }
}

/// Require the secure-environment marker
///
/// Fatal precondition, not retryable: proceeds only when `SECURE_ENV` is set
/// to exactly `true`.
pub fn check_secure_environment() -> Result<(), MfaError> {
    match std::env::var(SECURE_ENV_VAR) {
        Ok(v) if v == "true" => Ok(()),
        _ => Err(MfaError::InsecureEnvironment {
            variable: SECURE_ENV_VAR.to_string(),
        }),
    }
}

/// Require every named environment variable to be set
///
/// Reports all missing names at once rather than failing on the first.
pub fn require_env_vars(names: &[&str]) -> Result<(), MfaError> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| std::env::var(name).is_err())
        .map(|name| (*name).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MfaError::MissingEnvVars(missing))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;
    use tempfile::TempDir;

    /// RFC 6238 test secret: ASCII "12345678901234567890" in base32
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn rfc_secret() -> TotpSecret {
        TotpSecret::from_base32(RFC_SECRET).unwrap()
    }

    #[test]
    fn rfc6238_vector_at_t59() {
        // RFC 6238 Appendix B: T=59 -> 94287082; last 6 digits for 6-digit codes
        let now = Utc.timestamp_opt(59, 0).unwrap();
        assert_eq!(rfc_secret().code_at(now), "287082");
    }

    #[test]
    fn rfc6238_vector_at_t1111111109() {
        // RFC 6238 Appendix B: T=1111111109 -> 07081804
        let now = Utc.timestamp_opt(1_111_111_109, 0).unwrap();
        assert_eq!(rfc_secret().code_at(now), "081804");
    }

    #[test]
    fn current_step_code_verifies() {
        let secret = TotpSecret::generate();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let code = secret.code_at(now);

        assert!(secret.verify(&code, now));
    }

    #[test]
    fn adjacent_step_codes_verify_within_tolerance() {
        let secret = TotpSecret::generate();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let previous = secret.code_at(now - chrono::Duration::seconds(30));
        let next = secret.code_at(now + chrono::Duration::seconds(30));

        assert!(secret.verify(&previous, now), "one step behind is accepted");
        assert!(secret.verify(&next, now), "one step ahead is accepted");
    }

    #[test]
    fn code_two_steps_away_is_rejected() {
        let secret = rfc_secret();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let stale = secret.code_at(now - chrono::Duration::seconds(60));
        let future = secret.code_at(now + chrono::Duration::seconds(60));

        assert!(!secret.verify(&stale, now), "two steps behind is rejected");
        assert!(!secret.verify(&future, now), "two steps ahead is rejected");
    }

    #[test]
    fn code_from_different_secret_is_rejected() {
        let a = TotpSecret::generate();
        let b = TotpSecret::generate();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(!b.verify(&a.code_at(now), now));
    }

    #[test]
    fn malformed_codes_are_rejected() {
        let secret = rfc_secret();
        let now = Utc.timestamp_opt(59, 0).unwrap();

        assert!(!secret.verify("", now));
        assert!(!secret.verify("28708", now), "too short");
        assert!(!secret.verify("2870820", now), "too long");
        assert!(!secret.verify("28708a", now), "non-digit");
    }

    #[test]
    fn verify_tolerates_surrounding_whitespace() {
        let secret = rfc_secret();
        let now = Utc.timestamp_opt(59, 0).unwrap();
        assert!(secret.verify(" 287082 ", now));
    }

    #[test]
    fn generated_secret_is_base32_of_expected_length() {
        let secret = TotpSecret::generate();
        // 20 bytes -> 32 base32 characters without padding
        assert_eq!(secret.as_base32().len(), 32);
        assert!(TotpSecret::from_base32(secret.as_base32()).is_ok());
    }

    #[test]
    fn from_base32_rejects_garbage() {
        assert!(TotpSecret::from_base32("not base32 at all!").is_err());
        assert!(TotpSecret::from_base32("").is_err());
    }

    #[test]
    fn debug_output_does_not_leak_the_secret() {
        let secret = TotpSecret::generate();
        let debug = format!("{secret:?}");
        assert!(!debug.contains(secret.as_base32()));
    }

    #[test]
    fn gate_generates_and_reloads_secret() {
        let dir = TempDir::new().unwrap();
        let gate = MfaGate::new(dir.path().join("totp_secret.key"));

        let secret = gate.generate_secret().unwrap();
        let loaded = gate.load_secret().unwrap();
        assert_eq!(loaded.as_base32(), secret.as_base32());
    }

    #[test]
    fn gate_refuses_to_overwrite_secret() {
        let dir = TempDir::new().unwrap();
        let gate = MfaGate::new(dir.path().join("totp_secret.key"));

        gate.generate_secret().unwrap();
        assert!(matches!(
            gate.generate_secret().unwrap_err(),
            MfaError::SecretExists(_)
        ));
    }

    #[test]
    fn gate_verify_accepts_valid_and_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let gate = MfaGate::new(dir.path().join("totp_secret.key"));
        let secret = gate.generate_secret().unwrap();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        gate.verify(&secret.code_at(now), now).unwrap();
        assert!(matches!(
            gate.verify("000000", now),
            // A one-in-a-million collision would make this Ok; acceptable
            Err(MfaError::CodeRejected) | Ok(())
        ));
    }

    #[test]
    fn gate_verify_without_secret_file_fails() {
        let dir = TempDir::new().unwrap();
        let gate = MfaGate::new(dir.path().join("missing.key"));
        let now = Utc.timestamp_opt(0, 0).unwrap();

        assert!(matches!(
            gate.verify("123456", now).unwrap_err(),
            MfaError::SecretNotFound(_)
        ));
    }

    #[test]
    #[serial]
    fn secure_environment_requires_exact_true() {
        unsafe { std::env::set_var(SECURE_ENV_VAR, "true") };
        check_secure_environment().unwrap();

        unsafe { std::env::set_var(SECURE_ENV_VAR, "TRUE") };
        assert!(check_secure_environment().is_err());

        unsafe { std::env::set_var(SECURE_ENV_VAR, "1") };
        assert!(check_secure_environment().is_err());

        unsafe { std::env::remove_var(SECURE_ENV_VAR) };
        assert!(matches!(
            check_secure_environment().unwrap_err(),
            MfaError::InsecureEnvironment { .. }
        ));
    }

    #[test]
    #[serial]
    fn require_env_vars_reports_every_missing_name() {
        unsafe {
            std::env::set_var("CHART_DL_TEST_PRESENT", "x");
            std::env::remove_var("CHART_DL_TEST_MISSING_A");
            std::env::remove_var("CHART_DL_TEST_MISSING_B");
        }

        let err = require_env_vars(&[
            "CHART_DL_TEST_PRESENT",
            "CHART_DL_TEST_MISSING_A",
            "CHART_DL_TEST_MISSING_B",
        ])
        .unwrap_err();

        match err {
            MfaError::MissingEnvVars(names) => {
                assert_eq!(
                    names,
                    vec!["CHART_DL_TEST_MISSING_A", "CHART_DL_TEST_MISSING_B"]
                );
            }
            other => panic!("expected MissingEnvVars, got {other:?}"),
        }

        unsafe { std::env::remove_var("CHART_DL_TEST_PRESENT") };
    }

    #[test]
    #[serial]
    fn require_env_vars_passes_when_all_present() {
        unsafe {
            std::env::set_var("CHART_DL_TEST_A", "1");
            std::env::set_var("CHART_DL_TEST_B", "2");
        }
        require_env_vars(&["CHART_DL_TEST_A", "CHART_DL_TEST_B"]).unwrap();
        unsafe {
            std::env::remove_var("CHART_DL_TEST_A");
            std::env::remove_var("CHART_DL_TEST_B");
        }
    }
}
