//! End-to-end pipeline scenarios over a real HTTP mock server
//!
//! These drive the full fetch → persist → notify path with the production
//! `HttpChartSource`, exercising retry exhaustion, whole-tick validation
//! aborts, and backoff timing.

mod common;

use chart_dl::config::BackoffStrategy;
use chart_dl::fetch::HttpChartSource;
use chart_dl::pipeline::AcquisitionPipeline;
use chart_dl::scheduler::CollectorScheduler;
use chart_dl::types::{Event, TickId, TickSummary};
use chart_dl::{Error, ValidationError};
use common::{collector_config, mount_chart_failing, mount_chart_ok, provision_store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::MockServer;

fn drain(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(e) = events.try_recv() {
        out.push(e);
    }
    out
}

/// Two assets, one attempt each; the first asset's endpoint is down.
/// Exactly one failure notification for it, and the second asset is
/// processed without the tick aborting.
#[tokio::test]
async fn failing_first_asset_does_not_abort_the_tick() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_chart_failing(&server, "AAA", "1D", 500).await;
    mount_chart_ok(&server, "BBB", "1D", b"CHART-BBB").await;

    let api_url = format!("{}/chart", server.uri());
    let config = collector_config(&dir, &api_url, &["AAA", "BBB"]);

    let (event_tx, mut events) = broadcast::channel(64);
    let pipeline = AcquisitionPipeline::new(Arc::new(HttpChartSource::new()), event_tx);

    let summary = pipeline.run_tick(TickId::new(1), &config).await;

    assert_eq!(summary, TickSummary { succeeded: 1, failed: 1 });
    assert_eq!(
        std::fs::read(dir.path().join("charts/BBB_1D.png")).unwrap(),
        b"CHART-BBB"
    );
    assert!(!dir.path().join("charts/AAA_1D.png").exists());

    let events = drain(&mut events);
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ChartFailed { symbol, attempts, .. } => Some((symbol.clone(), *attempts)),
            _ => None,
        })
        .collect();
    assert_eq!(
        failed,
        vec![("AAA".to_string(), 1)],
        "exactly one failure, after exactly one attempt"
    );

    let notifications = events
        .iter()
        .filter(|e| matches!(e, Event::NotificationSent { .. }))
        .count();
    assert_eq!(notifications, 2, "one notification per asset, never both, never neither");
}

/// Mismatched list lengths (3 assets, 2 timeframes). The tick aborts before
/// any fetch is issued, naming the offending lists and their lengths.
#[tokio::test]
async fn mismatched_lists_abort_before_any_fetch() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let api_url = format!("{}/chart", server.uri());
    let mut config = collector_config(&dir, &api_url, &["AAA", "BBB", "CCC"]);
    config.timeframes.pop(); // 3 assets, 2 timeframes

    let (store, blob) = provision_store(&dir, &config);
    let scheduler =
        CollectorScheduler::new(store, blob, Arc::new(HttpChartSource::new()));

    let err = scheduler.run().await.unwrap_err();
    match err {
        Error::Validation(ValidationError::LengthMismatch {
            expected,
            mismatched,
        }) => {
            assert_eq!(expected, 3, "length of the asset list");
            assert_eq!(mismatched, vec![("timeframes", 2)]);
        }
        other => panic!("expected LengthMismatch, got {other:?}"),
    }

    assert!(
        server.received_requests().await.unwrap_or_default().is_empty(),
        "no fetch may be issued for an invalid configuration"
    );
}

/// One asset, fetch succeeds on attempt 2 of 3 under exponential backoff
/// with base 1 second. Total sleep before success is exactly one base delay
/// (1 * 2^0), the artifact is written, and exactly one success notification
/// goes out.
#[tokio::test]
async fn second_attempt_success_sleeps_one_base_delay() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    // First request fails, every later one succeeds
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/chart/AAA/1D"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_chart_ok(&server, "AAA", "1D", b"CHART-AAA").await;

    let api_url = format!("{}/chart", server.uri());
    let mut config = collector_config(&dir, &api_url, &["AAA"]);
    config.retry.max_attempts = 3;
    config.retry.strategy = BackoffStrategy::Exponential;
    config.retry.base_delay = Duration::from_secs(1);

    let (event_tx, mut events) = broadcast::channel(64);
    let pipeline = AcquisitionPipeline::new(Arc::new(HttpChartSource::new()), event_tx);

    let start = std::time::Instant::now();
    let summary = pipeline.run_tick(TickId::new(1), &config).await;
    let elapsed = start.elapsed();

    assert_eq!(summary, TickSummary { succeeded: 1, failed: 0 });
    assert!(
        elapsed >= Duration::from_secs(1),
        "the single backoff sleep is 1 * 2^0 = 1s, elapsed {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(3),
        "no second backoff may run after success on attempt 2, elapsed {elapsed:?}"
    );

    assert_eq!(
        std::fs::read(dir.path().join("charts/AAA_1D.png")).unwrap(),
        b"CHART-AAA"
    );

    let events = drain(&mut events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::ChartDownloaded { attempts: 2, .. })),
        "success is recorded on the second attempt"
    );
    let notifications = events
        .iter()
        .filter(|e| matches!(e, Event::NotificationSent { .. }))
        .count();
    assert_eq!(notifications, 1, "exactly one success notification");
    assert!(
        !events.iter().any(|e| matches!(e, Event::ChartFailed { .. })),
        "zero failure notifications"
    );
}

/// A full scheduler pass over the store: provision, run one tick, cancel.
#[tokio::test]
async fn scheduler_runs_a_tick_from_the_encrypted_store() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_chart_ok(&server, "AAA", "1D", b"CHART").await;

    let api_url = format!("{}/chart", server.uri());
    let config = collector_config(&dir, &api_url, &["AAA"]);
    let (store, blob) = provision_store(&dir, &config);

    let scheduler = Arc::new(CollectorScheduler::new(
        store,
        blob,
        Arc::new(HttpChartSource::new()),
    ));
    let mut events = scheduler.subscribe();
    let token = scheduler.shutdown_token();

    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    // The first tick is due immediately
    loop {
        match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Ok(Event::TickCompleted { summary, .. })) => {
                assert_eq!(summary, TickSummary { succeeded: 1, failed: 0 });
                break;
            }
            Ok(Ok(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    token.cancel();
    runner.await.unwrap().unwrap();

    assert!(dir.path().join("charts/AAA_1D.png").exists());
}
