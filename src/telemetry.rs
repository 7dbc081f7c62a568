//! Logging setup
//!
//! Plain `tracing` output on stderr. Stdout is left to the test runner's
//! forwarded log so the two can be redirected separately.
//!
//! # Example
//!
//! ```no_run
//! use operator_e2e::telemetry::init_logging;
//!
//! init_logging();
//! tracing::info!("starting");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Initialize logging with tracing-subscriber
///
/// Uses the `RUST_LOG` env var for filtering (default: info). Safe to call
/// more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
