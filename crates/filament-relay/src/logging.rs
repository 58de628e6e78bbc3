//! Global tracing subscriber setup.

use filament_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the filter: `RUST_LOG` wins, else the configured level.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_filter_str()))
}

/// Initialize the global subscriber on stderr.
///
/// Human-readable compact output by default, one JSON object per line when
/// `settings.json` is set. Subsequent calls are no-ops.
pub fn init(settings: &LoggingSettings) {
    let registry = tracing_subscriber::registry().with(env_filter(settings));
    let _ = if settings.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    };
}
