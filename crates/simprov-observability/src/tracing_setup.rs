//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the log filter.
pub const LOG_ENV: &str = "SIMPROV_LOG";

/// Initialize the global tracing subscriber.
///
/// Respects the `SIMPROV_LOG` environment variable for filtering and
/// defaults to `info`. Logs go to stderr so stdout stays free for graph
/// output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize tracing with an explicit filter string.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing_with_filter(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        assert!(init_tracing_with_filter("simprov=debug"));
        assert!(!init_tracing_with_filter("info"));
    }
}
