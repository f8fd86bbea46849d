//! Test configuration helpers: store fixtures and mock chart endpoints

use chart_dl::config::{BackoffStrategy, Config, RetryConfig};
use chart_dl::secrets::SecretStore;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a configuration with `n` parallel entries, all pointing at the
/// given API base URL and writing into `charts/` under the temp dir.
pub fn collector_config(dir: &TempDir, api_url: &str, symbols: &[&str]) -> Config {
    Config {
        assets: symbols.iter().map(|s| s.to_string()).collect(),
        timeframes: vec!["1D".into(); symbols.len()],
        file_formats: vec!["png".into(); symbols.len()],
        api_urls: vec![api_url.to_string(); symbols.len()],
        output_dirs: vec![dir.path().join("charts"); symbols.len()],
        notification_methods: vec!["log".into(); symbols.len()],
        interval_minutes: 1,
        retry: RetryConfig {
            max_attempts: 1,
            strategy: BackoffStrategy::Fixed,
            fixed_delay: Duration::from_millis(10),
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

/// Create a key and an encrypted configuration blob inside the temp dir
pub fn provision_store(dir: &TempDir, config: &Config) -> (SecretStore, PathBuf) {
    let store = SecretStore::new(dir.path().join("secret.key"));
    store.generate_key().expect("key generation");
    let blob = dir.path().join("secure_config.enc");
    store
        .save_secure_config(config, &blob)
        .expect("config save");
    (store, blob)
}

/// Mount a chart endpoint answering 200 with fixed bytes
pub async fn mount_chart_ok(server: &MockServer, symbol: &str, timeframe: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/chart/{symbol}/{timeframe}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mount a chart endpoint that always fails with the given status
pub async fn mount_chart_failing(server: &MockServer, symbol: &str, timeframe: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/chart/{symbol}/{timeframe}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
