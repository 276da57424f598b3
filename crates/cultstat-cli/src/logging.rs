use cultstat_core::{LogConfig, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::CliError;

/// Installs the global subscriber. Logs go to stderr; stdout carries output.
///
/// `RUST_LOG` wins when set, then `--log-level`, then the `[log]` section.
pub fn init(cli_level: Option<&str>, config: LogConfig) -> Result<(), CliError> {
    let directive = cli_level.unwrap_or(config.level.as_str());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|error| CliError::Logging(error.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|error| CliError::Logging(error.to_string()))
}
