//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable plaintext format
    #[default]
    Plaintext,
    /// Structured JSON format
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: Level, format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},tower_http=info",
            default_level.as_str().to_lowercase()
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Plaintext => registry
            .with(fmt::layer().with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?,
    }

    Ok(())
}
