//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::error::{NodeError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; `verbose` forces `debug`.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let json = config.format.eq_ignore_ascii_case("json");
    let json_layer = json.then(|| fmt::layer().json().with_target(true));
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_ansi(config.color)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| NodeError::Logging(e.to_string()))
}
