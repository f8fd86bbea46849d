//! Recurring tick scheduling for the chart collector
//!
//! The scheduler owns the only long-lived mutable state in the system: the
//! tick counter and the next-due deadline. On every tick it reloads the
//! configuration from the encrypted store, validates it, and runs the full
//! acquisition pipeline. Ticks never overlap: the next deadline is computed
//! only after the current tick completes, so an overrunning tick delays the
//! next one rather than racing it.
//!
//! # Example
//!
//! ```no_run
//! use chart_dl::scheduler::CollectorScheduler;
//! use chart_dl::secrets::SecretStore;
//! use chart_dl::fetch::HttpChartSource;
//! use std::sync::Arc;
//!
//! # async fn example() -> chart_dl::error::Result<()> {
//! let store = SecretStore::new("secret.key");
//! let scheduler = CollectorScheduler::new(
//!     store,
//!     "secure_config.enc",
//!     Arc::new(HttpChartSource::new()),
//! );
//!
//! // Subscribe to events
//! let mut events = scheduler.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! // Run until cancelled (blocks)
//! scheduler.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::fetch::ChartSource;
use crate::pipeline::AcquisitionPipeline;
use crate::secrets::SecretStore;
use crate::types::{Event, TickId};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Event bus capacity; slow consumers lose old events rather than block
const EVENT_CAPACITY: usize = 256;

/// Runs the acquisition pipeline on a fixed cadence until cancelled
pub struct CollectorScheduler {
    /// Encrypted store holding the configuration blob's key
    store: SecretStore,

    /// Path of the encrypted configuration blob
    config_path: PathBuf,

    /// The per-tick pipeline
    pipeline: AcquisitionPipeline,

    /// Event bus shared with the pipeline and dispatcher
    event_tx: tokio::sync::broadcast::Sender<Event>,

    /// Cooperative shutdown signal, observed between ticks
    shutdown: CancellationToken,
}

impl CollectorScheduler {
    /// Create a scheduler reading configuration from `config_path` via `store`
    pub fn new(
        store: SecretStore,
        config_path: impl Into<PathBuf>,
        source: Arc<dyn ChartSource>,
    ) -> Self {
        let (event_tx, _) = tokio::sync::broadcast::channel(EVENT_CAPACITY);
        let pipeline = AcquisitionPipeline::new(source, event_tx.clone());
        Self {
            store,
            config_path: config_path.into(),
            pipeline,
            event_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to collector events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// A handle that cancels the run loop when triggered
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run ticks forever, until cancelled
    ///
    /// The first tick is due immediately. Every tick reloads and re-validates
    /// the configuration, so store rotations between ticks take effect; the
    /// poll interval itself may therefore change from tick to tick.
    ///
    /// Per-asset failures are absorbed by the pipeline and never interrupt
    /// the cadence. A configuration error (unreadable store, failed
    /// validation) aborts the entire tick and terminates the loop with the
    /// error - the embedding process is expected to exit non-zero.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("chart collection scheduler started");

        let mut tick = TickId::default();
        let mut next_due = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep_until(next_due) => {}
            }

            tick = tick.next();
            let config = match self.load_and_validate() {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(tick = %tick, error = %e, "configuration error, aborting");
                    return Err(e);
                }
            };

            let local_now = Utc::now().with_timezone(&config.tz());
            tracing::info!(
                tick = %tick,
                time = %local_now.format("%Y-%m-%d %H:%M:%S %Z"),
                "tick due"
            );

            let interval = config.interval();
            self.pipeline.run_tick(tick, &config).await;

            // Computed deadline, not a busy poll. If the tick overran its
            // interval the next tick is due now; the missed nominal slot is
            // simply skipped.
            next_due += interval;
            let now = Instant::now();
            if next_due < now {
                tracing::warn!(
                    tick = %tick,
                    "tick overran its interval, scheduling next tick immediately"
                );
                next_due = now;
            }
        }

        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Reload the configuration from the encrypted store and validate it
    fn load_and_validate(&self) -> Result<crate::config::Config> {
        let config = self.store.load_secure_config(&self.config_path)?;
        config.validate().map_err(Error::from)?;
        Ok(config)
    }
}
