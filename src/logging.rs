//! Tracing subscriber setup from configuration
//!
//! The collector's configuration carries a logging level directive and an
//! output format; embedding binaries call [`init`] once at startup to turn
//! those into a global subscriber. Library code never installs a subscriber
//! itself.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `level` is an `EnvFilter` directive ("info", "chart_dl=debug,warn", ...);
/// an unparseable directive falls back to "info". Calling this more than
/// once is a no-op: the first subscriber wins.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // try_init fails if a subscriber is already installed (tests, embedders
    // with their own setup); that is fine
    let result = match format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping the existing one");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("info", LogFormat::Full);
        init("debug", LogFormat::Json);
        init("not a ! valid directive ((", LogFormat::Compact);
    }
}
