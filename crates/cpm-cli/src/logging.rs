//! Diagnostic output on stderr.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive such as `debug` or `cpm_pkg=trace`.
pub const LOG_ENV: &str = "CPM_LOG";

/// Level used when `CPM_LOG` is not set.
pub fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level(verbosity)))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
