//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; answers and prompts stay on
//! stdout. `RUST_LOG` takes precedence over the configured level:
//! ```bash
//! RUST_LOG=law_rag=debug law-rag --question "How do I file an FIR?"
//! ```

use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call has an effect.
///
/// `verbose` raises the configured default to `debug`.
pub fn init(config: &LoggingConfig, verbose: bool) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(&config.default).unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}
