//! Log output for the `testplan` binary.
//!
//! Everything is written to stderr: stdout carries the plan JSON that CI
//! steps capture.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default level for the `--verbose` flag.
pub fn default_level(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Filter honouring `RUST_LOG`, falling back to `level` for anything it
/// leaves unset. Malformed directives in `RUST_LOG` are skipped.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Install the global subscriber, as text lines or as JSON objects.
///
/// Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(text_layer)
        .with(json_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), Level::DEBUG);
        assert_eq!(default_level(false), Level::INFO);
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(true, Level::INFO);
        init_tracing(false, Level::DEBUG);
        tracing::debug!(axes = 3, "second init ignored");
    }
}
