//! provides logging helpers

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Level used when `RUST_LOG` is unset, from the number of `-v` flags.
pub fn default_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// initiate the global tracing subscriber
///
/// Poll attempts are logged at debug, so `-v` shows every retry.
pub fn init(verbosity: u8) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level(verbosity).into())
        .from_env_lossy();

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(env_filter);

    // a subscriber may already be installed when running under a test harness
    let _ = registry().with(fmt_layer).try_init();
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(default_level(0), LevelFilter::INFO);
        assert_eq!(default_level(1), LevelFilter::DEBUG);
        assert_eq!(default_level(4), LevelFilter::TRACE);
    }
}
