//! Basic collector example
//!
//! This example demonstrates the core functionality of chart-dl:
//! - Building a collector configuration
//! - Provisioning the encrypted store on first run
//! - Subscribing to events
//! - Running the scheduler with graceful signal handling

use chart_dl::bootstrap::StorePaths;
use chart_dl::config::{Config, LogFormat, RetryConfig};
use chart_dl::{
    BackoffStrategy, CollectorScheduler, Event, HttpChartSource, SecretStore, run_with_shutdown,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    chart_dl::logging::init("info", LogFormat::Full);

    let paths = StorePaths::default();
    let store = SecretStore::new(&paths.key_file);

    // One-time setup: key material and an initial configuration
    if !store.key_exists() {
        store.generate_key()?;
    }
    if !paths.config_file.exists() {
        let config = Config {
            assets: vec!["BTC".into(), "ETH".into(), "SOL".into()],
            timeframes: vec!["1D".into(), "1D".into(), "4H".into()],
            file_formats: vec!["png".into(), "png".into(), "png".into()],
            api_urls: vec!["https://api.tradingview.example/chart".into(); 3],
            output_dirs: vec!["charts".into(); 3],
            notification_methods: vec!["log".into(); 3],
            interval_minutes: 60,
            retry: RetryConfig {
                max_attempts: 3,
                strategy: BackoffStrategy::Exponential,
                ..RetryConfig::default()
            },
            ..Config::default()
        };
        store.save_secure_config(&config, &paths.config_file)?;
        println!(
            "Wrote initial configuration to {}",
            paths.config_file.display()
        );
    }

    // Create the scheduler over the HTTP chart source
    let scheduler = CollectorScheduler::new(
        store,
        &paths.config_file,
        Arc::new(HttpChartSource::new()),
    );

    // Subscribe to events
    let mut events = scheduler.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TickStarted { tick, jobs } => {
                    println!("▸ Tick {tick}: collecting {jobs} charts");
                }
                Event::ChartDownloaded {
                    symbol,
                    timeframe,
                    path,
                    attempts,
                } => {
                    println!(
                        "✓ {symbol}/{timeframe} -> {} (attempt {attempts})",
                        path.display()
                    );
                }
                Event::ChartFailed {
                    symbol, attempts, ..
                } => {
                    println!("✗ {symbol} failed after {attempts} attempts");
                }
                Event::TickCompleted { tick, summary } => {
                    println!(
                        "▸ Tick {tick} done: {} ok, {} failed",
                        summary.succeeded, summary.failed
                    );
                }
                _ => {}
            }
        }
    });

    // Run ticks until SIGTERM/SIGINT
    run_with_shutdown(scheduler).await?;

    Ok(())
}
