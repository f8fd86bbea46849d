//! Per-tick chart acquisition pipeline
//!
//! A tick processes every [`AssetJob`] sequentially, in configuration list
//! order. Each job moves through fetch (governed by the retry policy),
//! persist, and notify; one asset's failure never blocks or aborts the jobs
//! after it. Exactly one notification is dispatched per job per tick -
//! success or failure, never both, never neither.

use crate::config::Config;
use crate::error::PersistenceError;
use crate::fetch::ChartSource;
use crate::notify::NotificationDispatcher;
use crate::retry::fetch_with_retry;
use crate::types::{AssetJob, Event, NotificationEvent, TickId, TickSummary};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::broadcast;

/// Orchestrates fetch → persist → notify for every asset job in a tick
///
/// Holds no per-job state: retry counters live inside a single job's
/// execution and reset for every job and every tick.
pub struct AcquisitionPipeline {
    /// Chart provider (HTTP in production, scripted in tests)
    source: Arc<dyn ChartSource>,

    /// Event bus for library consumers
    event_tx: broadcast::Sender<Event>,
}

impl AcquisitionPipeline {
    /// Create a pipeline over the given chart source
    pub fn new(source: Arc<dyn ChartSource>, event_tx: broadcast::Sender<Event>) -> Self {
        Self { source, event_tx }
    }

    /// Run one full tick over all jobs derived from `config`
    ///
    /// The configuration must already be validated; this method assumes the
    /// per-asset lists zip cleanly.
    pub async fn run_tick(&self, tick: TickId, config: &Config) -> TickSummary {
        let jobs = config.jobs();
        let dispatcher = NotificationDispatcher::new(config, self.event_tx.clone());

        tracing::info!(tick = %tick, jobs = jobs.len(), "starting chart collection tick");
        self.event_tx
            .send(Event::TickStarted {
                tick,
                jobs: jobs.len(),
            })
            .ok();

        let mut summary = TickSummary::default();
        for job in &jobs {
            if self.run_job(job, config, &dispatcher).await {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            tick = %tick,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "completed chart collection tick"
        );
        self.event_tx
            .send(Event::TickCompleted { tick, summary })
            .ok();

        summary
    }

    /// Process a single job; returns true on success
    ///
    /// Per-job state machine: fetch (with retry) → persist → notify success,
    /// or → notify failure once retries are exhausted or persistence fails.
    async fn run_job(
        &self,
        job: &AssetJob,
        config: &Config,
        dispatcher: &NotificationDispatcher,
    ) -> bool {
        let attempts = Arc::new(AtomicU32::new(0));

        let fetched = fetch_with_retry(&config.retry, || {
            let source = self.source.clone();
            let job = job.clone();
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                source.fetch_chart(&job).await
            }
        })
        .await;
        let attempts = attempts.load(Ordering::SeqCst);

        let outcome = match fetched {
            Ok(bytes) => persist_artifact(job, &bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(path) => {
                tracing::info!(
                    symbol = %job.symbol,
                    timeframe = %job.timeframe,
                    path = %path.display(),
                    attempts,
                    "downloaded chart"
                );
                self.event_tx
                    .send(Event::ChartDownloaded {
                        symbol: job.symbol.clone(),
                        timeframe: job.timeframe.clone(),
                        path,
                        attempts,
                    })
                    .ok();

                dispatcher
                    .notify(&NotificationEvent {
                        message: format!("Downloaded chart for {}", job.symbol),
                        method: job.notification_method.clone(),
                    })
                    .await;
                true
            }
            Err(error) => {
                tracing::error!(
                    symbol = %job.symbol,
                    timeframe = %job.timeframe,
                    attempts,
                    error = %error,
                    "chart acquisition failed"
                );
                self.event_tx
                    .send(Event::ChartFailed {
                        symbol: job.symbol.clone(),
                        timeframe: job.timeframe.clone(),
                        attempts,
                        error: error.clone(),
                    })
                    .ok();

                dispatcher
                    .notify(&NotificationEvent {
                        message: format!(
                            "Failed to download chart for {} after {} attempts: {}",
                            job.symbol, attempts, error
                        ),
                        method: job.notification_method.clone(),
                    })
                    .await;
                false
            }
        }
    }
}

/// Ensure the output directory exists, then write the artifact
///
/// Overwrite semantics: a later tick silently replaces the prior artifact
/// for the same asset and timeframe.
async fn persist_artifact(job: &AssetJob, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
    tokio::fs::create_dir_all(&job.output_dir)
        .await
        .map_err(|source| PersistenceError::CreateDir {
            path: job.output_dir.clone(),
            source,
        })?;

    let path = job.artifact_path();
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| PersistenceError::WriteArtifact {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
