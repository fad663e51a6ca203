//! Log output for the `maturity` admin CLI and services embedding the engine.
//!
//! Log lines always go to stderr. Stdout carries command results only, so
//! `maturity ... --json | jq` never sees a log line. `RUST_LOG` overrides
//! the caller's default level when it parses. JSON mode writes one flat
//! object per event, which keeps the governance events emitted by
//! [`crate::obs`] (`event = "exam.finished"` and friends) as top-level keys.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber.
///
/// Returns `false` when a subscriber was already installed, in which case
/// the earlier configuration stays in effect.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let json_layer = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .flatten_event(true)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_installation_wins() {
        // Another test in this binary may have installed one already.
        let _ = init_tracing(false, Level::WARN);
        assert!(!init_tracing(true, Level::DEBUG));
    }
}
