//! # chart-dl
//!
//! Highly configurable backend library for scheduled market-chart collection.
//!
//! ## Design Philosophy
//!
//! chart-dl is designed to be:
//! - **Highly configurable** - Every asset carries its own timeframe, format,
//!   endpoint, output directory, and notification channel
//! - **Confidential at rest** - Configuration lives in an encrypted store;
//!   the hardened variant gates bootstrap behind a TOTP second factor
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use chart_dl::{CollectorScheduler, HttpChartSource, SecretStore, run_with_shutdown};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SecretStore::new("secret.key");
//!     let scheduler = CollectorScheduler::new(
//!         store,
//!         "secure_config.enc",
//!         Arc::new(HttpChartSource::new()),
//!     );
//!
//!     // Subscribe to events
//!     let mut events = scheduler.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Run ticks until SIGTERM/SIGINT
//!     run_with_shutdown(scheduler).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Process bootstrap and store provisioning
pub mod bootstrap;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Chart source abstraction and HTTP implementation
pub mod fetch;
/// Tracing subscriber setup
pub mod logging;
/// TOTP second factor and environment preconditions
pub mod mfa;
/// Notification dispatch (log, email, SMS)
pub mod notify;
/// Per-tick acquisition pipeline
pub mod pipeline;
/// Retry logic with pluggable backoff strategies
pub mod retry;
/// Recurring tick scheduling
pub mod scheduler;
/// Encrypted configuration and secret storage
pub mod secrets;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use bootstrap::{StorePaths, bootstrap_plain, bootstrap_secure, provision_secure};
pub use config::{BackoffStrategy, Config, EmailSettings, LogFormat, RetryConfig, SmsSettings};
pub use error::{
    Error, FetchError, MfaError, PersistenceError, Result, SecretsError, ValidationError,
};
pub use fetch::{ChartSource, HttpChartSource};
pub use mfa::{MfaGate, TotpSecret};
pub use notify::NotificationDispatcher;
pub use pipeline::AcquisitionPipeline;
pub use scheduler::CollectorScheduler;
pub use secrets::SecretStore;
pub use types::{AssetJob, Event, NotificationEvent, NotificationMethod, TickId, TickSummary};

/// Helper function to run the scheduler with graceful signal handling.
///
/// Waits for a termination signal and then cancels the scheduler's run loop,
/// which finishes the in-flight tick before exiting.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use chart_dl::{CollectorScheduler, HttpChartSource, SecretStore, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SecretStore::new("secret.key");
///     let scheduler = CollectorScheduler::new(
///         store,
///         "secure_config.enc",
///         Arc::new(HttpChartSource::new()),
///     );
///
///     run_with_shutdown(scheduler).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(scheduler: CollectorScheduler) -> Result<()> {
    let token = scheduler.shutdown_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        token.cancel();
    });
    scheduler.run().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
