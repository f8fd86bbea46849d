//! Core types for chart-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a scheduler tick
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TickId(pub u64);

impl TickId {
    /// Create a new TickId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The identifier of the following tick
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for TickId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<TickId> for u64 {
    fn from(id: TickId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TickId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One asset's fetch/persist/notify unit of work within a tick
///
/// Built by zipping the configuration's per-asset parallel lists; created per
/// tick and discarded once the tick's notifications are sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetJob {
    /// Asset symbol (e.g. "BTC")
    pub symbol: String,

    /// Chart timeframe (e.g. "1D")
    pub timeframe: String,

    /// Artifact file format / extension (e.g. "png")
    pub file_format: String,

    /// API base URL for this asset's chart endpoint
    pub api_url: String,

    /// Directory the chart artifact is written to
    pub output_dir: PathBuf,

    /// Notification channel name for this asset ("log", "email", "sms")
    pub notification_method: String,
}

impl AssetJob {
    /// Full request URL: `{api_url}/{symbol}/{timeframe}`
    pub fn request_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.symbol,
            self.timeframe
        )
    }

    /// Artifact destination: `{output_dir}/{symbol}_{timeframe}.{format}`
    ///
    /// A later tick writing the same path silently replaces the prior
    /// artifact (overwrite semantics, no versioning).
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.symbol, self.timeframe, self.file_format))
    }
}

/// Known notification channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    /// Structured log line, always succeeds
    Log,
    /// SMTP email, best-effort
    Email,
    /// HTTP SMS gateway, best-effort
    Sms,
}

impl NotificationMethod {
    /// Parse a channel name from configuration
    ///
    /// Returns `None` for unknown names; the dispatcher logs a warning and
    /// drops the event in that case rather than failing the job.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "log" => Some(NotificationMethod::Log),
            "email" => Some(NotificationMethod::Email),
            "sms" => Some(NotificationMethod::Sms),
            _ => None,
        }
    }

    /// Canonical channel name
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMethod::Log => "log",
            NotificationMethod::Email => "email",
            NotificationMethod::Sms => "sms",
        }
    }
}

impl std::fmt::Display for NotificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification to be dispatched
///
/// Ephemeral: built by the pipeline after a job finishes, consumed by the
/// dispatcher, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Human-readable message text
    pub message: String,

    /// Channel name as configured for the asset (may be unknown)
    pub method: String,
}

/// Aggregate result of one pipeline tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Jobs whose artifact was fetched and persisted
    pub succeeded: usize,

    /// Jobs that exhausted retries or failed persistence
    pub failed: usize,
}

impl TickSummary {
    /// Total number of jobs processed this tick
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Events emitted by the collector
///
/// Consumers subscribe via a broadcast channel; events are observability
/// only and lossy under slow consumption.
#[derive(Clone, Debug)]
pub enum Event {
    /// A scheduler tick began
    TickStarted {
        /// Tick identifier
        tick: TickId,
        /// Number of asset jobs in this tick
        jobs: usize,
    },

    /// A scheduler tick finished
    TickCompleted {
        /// Tick identifier
        tick: TickId,
        /// Aggregate outcome
        summary: TickSummary,
    },

    /// A chart artifact was fetched and written
    ChartDownloaded {
        /// Asset symbol
        symbol: String,
        /// Chart timeframe
        timeframe: String,
        /// Where the artifact was written
        path: PathBuf,
        /// Number of fetch attempts used
        attempts: u32,
    },

    /// A job failed after exhausting all attempts (or failed persistence)
    ChartFailed {
        /// Asset symbol
        symbol: String,
        /// Chart timeframe
        timeframe: String,
        /// Number of fetch attempts used
        attempts: u32,
        /// Final error message
        error: String,
    },

    /// A notification was dispatched successfully
    NotificationSent {
        /// Channel name
        method: String,
    },

    /// A notification could not be delivered (best-effort: never fatal)
    NotificationFailed {
        /// Channel name
        method: String,
        /// Transport error message
        error: String,
    },
}
