//! Hardened collector example: TOTP-gated bootstrap
//!
//! Demonstrates the secure-environment mode:
//! - `SECURE_ENV=true` plus `API_KEY` / `API_SECRET` must be set
//! - First run provisions the store and prints the TOTP secret once
//! - Later runs require a valid authenticator code before any store access
//!
//! Exit code is 0 on graceful shutdown, 1 on any fatal precondition
//! (missing environment marker, missing variables, rejected code) or
//! configuration failure.

use chart_dl::bootstrap::{StorePaths, bootstrap_secure, provision_secure};
use chart_dl::config::{Config, LogFormat, RetryConfig};
use chart_dl::mfa::MfaGate;
use chart_dl::{BackoffStrategy, CollectorScheduler, HttpChartSource, run_with_shutdown};
use std::io::Write;
use std::sync::Arc;

fn initial_config() -> Config {
    Config {
        assets: vec!["BTC".into(), "ETH".into()],
        timeframes: vec!["1D".into(), "1D".into()],
        file_formats: vec!["png".into(), "png".into()],
        api_urls: vec!["https://api.tradingview.example/chart".into(); 2],
        output_dirs: vec!["charts".into(); 2],
        notification_methods: vec!["log".into(); 2],
        interval_minutes: 60,
        retry: RetryConfig {
            max_attempts: 3,
            strategy: BackoffStrategy::Exponential,
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

fn read_code() -> String {
    if let Some(code) = std::env::args().nth(1) {
        return code;
    }
    print!("Enter the TOTP code from your authenticator app: ");
    std::io::stdout().flush().ok();
    let mut code = String::new();
    std::io::stdin().read_line(&mut code).ok();
    code.trim().to_string()
}

#[tokio::main]
async fn main() {
    chart_dl::logging::init("info", LogFormat::Full);

    let paths = StorePaths::default();

    // First run: provision and stop, so the operator can enroll the secret
    let gate = MfaGate::new(&paths.totp_secret_file);
    if !gate.secret_exists() {
        match provision_secure(&paths, &initial_config()) {
            Ok(secret) => {
                println!("Store provisioned.");
                println!(
                    "TOTP secret (shown once - enroll it in your authenticator now): {}",
                    secret.as_base32()
                );
                println!("Re-run with a current code to start collecting.");
                return;
            }
            Err(e) => {
                eprintln!("Provisioning failed: {e}");
                std::process::exit(1);
            }
        }
    }

    // Gated bootstrap: environment marker, credential vars, then the code
    let code = read_code();
    let (store, _config) = match bootstrap_secure(&paths, &code) {
        Ok(bootstrapped) => bootstrapped,
        Err(e) => {
            eprintln!("Secure bootstrap failed: {e}");
            std::process::exit(1);
        }
    };

    let scheduler = CollectorScheduler::new(
        store,
        &paths.config_file,
        Arc::new(HttpChartSource::new()),
    );

    if let Err(e) = run_with_shutdown(scheduler).await {
        eprintln!("Collector terminated: {e}");
        std::process::exit(1);
    }
}
