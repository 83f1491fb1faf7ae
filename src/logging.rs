//! Console logging for native hosts.
//!
//! The core logs through `tracing` and installs nothing itself. Call
//! [`install`] once at startup to print those events to stderr, filtered by
//! the `RAVEN_LOG` environment variable (`EnvFilter` syntax, e.g.
//! `RAVEN_LOG=raven_core=trace`).

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "RAVEN_LOG";

const DEFAULT_FILTER: &str = "info";

static TRACING_INSTALLED: Once = Once::new();

/// Installs the console subscriber, filtered by `RAVEN_LOG` (default `info`). Idempotent.
pub fn install() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install_filter(filter);
}

/// Installs the console subscriber with an explicit filter directive. Idempotent.
///
/// An invalid directive falls back to `info`.
pub fn install_with_filter(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install_filter(filter);
}

fn install_filter(filter: EnvFilter) {
    TRACING_INSTALLED.call_once(|| {
        let result = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_filter(filter))
            .try_init();
        if result.is_err() {
            tracing::debug!("a global tracing subscriber is already installed, keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        install_with_filter("raven_core=debug");
        install();
        tracing::info!("logging installed");
        assert!(TRACING_INSTALLED.is_completed());
    }
}
