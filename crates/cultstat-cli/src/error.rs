use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] cultstat_core::ValidationError),

    #[error(transparent)]
    Config(#[from] cultstat_core::ConfigError),

    #[error(transparent)]
    Tracked(#[from] cultstat_core::TrackedError),

    #[error("setup failed: {0}")]
    Setup(#[from] cultstat_core::SetupError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Tracked(_) | Self::Logging(_) => 2,
            Self::Serialization(_) => 4,
            Self::Setup(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
