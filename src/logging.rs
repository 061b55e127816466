//! Logging configuration for newsreport.
//!
//! Diagnostics go to stderr so that stdout carries only the progress lines
//! and the final report path.

use crate::error::ReportError;
use std::io::Write;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "warn,newsreport=info";

/// Initializes logging to stderr, honouring `RUST_LOG`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Reports a failed run on the log and directly on `console`.
///
/// The console line is written even when `RUST_LOG` silences the log.
pub fn report_failure(err: &ReportError, console: &mut impl Write) {
    error!("{}: {}", err.category(), err);
    // Nothing useful is left to do if the console itself is gone
    let _ = writeln!(console, "{}: {}", err.category(), err);
}
