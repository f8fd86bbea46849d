//! Configuration types for chart-dl

use crate::error::ValidationError;
use crate::types::{AssetJob, NotificationMethod};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Backoff strategy selecting how inter-attempt delays are computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base_delay * 2^attempt_index` doubling backoff, capped at `max_delay` (default)
    #[default]
    Exponential,
    /// Constant `fixed_delay` between attempts
    Fixed,
    /// Uniformly sampled delay in `[random_min_delay, random_max_delay]`,
    /// to desynchronize retries across assets processed in sequence
    Random,
}

/// Retry configuration for chart fetches
///
/// Attached to a single fetch operation; stateless across invocations. Every
/// tick starts every asset's attempt counter at zero - no counters are shared
/// between assets or carried across ticks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of fetch attempts, counting the first (total tries)
    #[serde(rename = "retries")]
    pub max_attempts: u32,

    /// Which backoff strategy governs inter-attempt delays
    #[serde(rename = "retry_strategy")]
    pub strategy: BackoffStrategy,

    /// Exponential base delay (default: 1 second)
    #[serde(default = "default_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Constant delay for the fixed strategy (default: 5 seconds)
    #[serde(default = "default_fixed_delay", with = "duration_serde")]
    pub fixed_delay: Duration,

    /// Cap on any computed delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Lower bound for the random strategy (default: 1 second)
    #[serde(default = "default_random_min_delay", with = "duration_serde")]
    pub random_min_delay: Duration,

    /// Upper bound for the random strategy (default: 10 seconds)
    #[serde(default = "default_random_max_delay", with = "duration_serde")]
    pub random_max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: default_base_delay(),
            fixed_delay: default_fixed_delay(),
            max_delay: default_max_delay(),
            random_min_delay: default_random_min_delay(),
            random_max_delay: default_random_max_delay(),
        }
    }
}

/// SMTP settings for the email notification channel
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSettings {
    /// Sender address
    pub from_email: String,

    /// Recipient address
    pub to_email: String,

    /// SMTP submission host
    pub smtp_server: String,

    /// SMTP submission port (typically 587 for STARTTLS)
    pub smtp_port: u16,

    /// SMTP username
    pub smtp_user: String,

    /// SMTP password
    pub smtp_password: String,
}

/// HTTP gateway settings for the SMS notification channel
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsSettings {
    /// Gateway endpoint the message is POSTed to
    pub api_url: String,

    /// Destination phone number
    pub to_phone: String,

    /// Gateway API key
    pub api_key: String,
}

/// Log output format for the tracing subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default human-readable format
    #[default]
    Full,
    /// Terser single-line format
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Main configuration for the chart collector
///
/// Loaded from the encrypted store on startup and re-loaded fresh on every
/// scheduler tick; immutable for the duration of one tick. The six per-asset
/// lists are parallel: entry `i` of each describes asset `i`'s job. Their
/// lengths must all be equal - enforced by [`Config::validate`], which must
/// run on every freshly loaded configuration before it is used.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Asset symbols to collect charts for
    pub assets: Vec<String>,

    /// Chart timeframe per asset
    pub timeframes: Vec<String>,

    /// Artifact file format per asset
    pub file_formats: Vec<String>,

    /// API base URL per asset
    pub api_urls: Vec<String>,

    /// Output directory per asset
    pub output_dirs: Vec<PathBuf>,

    /// Notification channel name per asset
    pub notification_methods: Vec<String>,

    /// Minutes between scheduler ticks
    pub interval_minutes: u64,

    /// Retry count, strategy, and delay tuning
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// Email channel settings (required only if any asset notifies by email)
    #[serde(default)]
    pub email: Option<EmailSettings>,

    /// SMS channel settings (required only if any asset notifies by SMS)
    #[serde(default)]
    pub sms: Option<SmsSettings>,

    /// Log level directive (e.g. "info", "chart_dl=debug")
    pub logging_level: String,

    /// Log output format
    pub logging_format: LogFormat,

    /// IANA time-zone name used when logging tick activity
    pub time_zone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            timeframes: Vec::new(),
            file_formats: Vec::new(),
            api_urls: Vec::new(),
            output_dirs: Vec::new(),
            notification_methods: Vec::new(),
            interval_minutes: 60,
            retry: RetryConfig::default(),
            email: None,
            sms: None,
            logging_level: "info".to_string(),
            logging_format: LogFormat::default(),
            time_zone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Validate the configuration shape
    ///
    /// Pure: no I/O, no mutation. Checks, in order:
    /// 1. channel settings present for every selected known channel
    ///    (failure names the absent section);
    /// 2. the per-asset parallel lists all have the same length
    ///    (failure names every offending list and its length);
    /// 3. a usable poll interval and attempt count;
    /// 4. parseable API base URLs and time-zone name.
    ///
    /// Missing top-level keys never reach this point - serde reports them by
    /// name at deserialization time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for method in &self.notification_methods {
            match NotificationMethod::from_name(method) {
                Some(NotificationMethod::Email) if self.email.is_none() => {
                    return Err(ValidationError::MissingSettings {
                        key: "email",
                        needed_by: method.clone(),
                    });
                }
                Some(NotificationMethod::Sms) if self.sms.is_none() => {
                    return Err(ValidationError::MissingSettings {
                        key: "sms",
                        needed_by: method.clone(),
                    });
                }
                // Unknown names are a dispatch-time warning, not a config error
                _ => {}
            }
        }

        let expected = self.assets.len();
        let lengths: [(&'static str, usize); 5] = [
            ("timeframes", self.timeframes.len()),
            ("file_formats", self.file_formats.len()),
            ("api_urls", self.api_urls.len()),
            ("output_dirs", self.output_dirs.len()),
            ("notification_methods", self.notification_methods.len()),
        ];
        let mismatched: Vec<(&'static str, usize)> = lengths
            .iter()
            .filter(|(_, len)| *len != expected)
            .copied()
            .collect();
        if !mismatched.is_empty() {
            return Err(ValidationError::LengthMismatch {
                expected,
                mismatched,
            });
        }

        if self.interval_minutes == 0 {
            return Err(ValidationError::ZeroInterval);
        }
        if self.retry.max_attempts == 0 {
            return Err(ValidationError::ZeroRetries);
        }

        for (index, api_url) in self.api_urls.iter().enumerate() {
            if let Err(e) = url::Url::parse(api_url) {
                return Err(ValidationError::InvalidApiUrl {
                    index,
                    url: api_url.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if chrono_tz::Tz::from_str(&self.time_zone).is_err() {
            return Err(ValidationError::InvalidTimeZone {
                name: self.time_zone.clone(),
            });
        }

        Ok(())
    }

    /// Derive the tick's asset jobs by zipping the parallel lists
    ///
    /// Call only on a validated configuration; entries are produced in
    /// configuration list order, which is also processing order.
    pub fn jobs(&self) -> Vec<AssetJob> {
        self.assets
            .iter()
            .zip(&self.timeframes)
            .zip(&self.file_formats)
            .zip(&self.api_urls)
            .zip(&self.output_dirs)
            .zip(&self.notification_methods)
            .map(
                |(((((symbol, timeframe), file_format), api_url), output_dir), method)| AssetJob {
                    symbol: symbol.clone(),
                    timeframe: timeframe.clone(),
                    file_format: file_format.clone(),
                    api_url: api_url.clone(),
                    output_dir: output_dir.clone(),
                    notification_method: method.clone(),
                },
            )
            .collect()
    }

    /// Tick interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// The configured time zone, falling back to UTC for unparseable names
    ///
    /// Validation rejects unknown names up front; the fallback only matters
    /// for callers that skip validation.
    pub fn tz(&self) -> chrono_tz::Tz {
        chrono_tz::Tz::from_str(&self.time_zone).unwrap_or(chrono_tz::Tz::UTC)
    }
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_fixed_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_random_min_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_random_max_delay() -> Duration {
    Duration::from_secs(10)
}

// Duration serialization helper (integer seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
