use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

/// Invalid run configuration. Always fatal, reported before any pass starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("You can not use both --age and --before together")]
    ConflictingCutoff,

    #[error("Invalid timestamp '{0}' (format: yyyy-mm-ddThh:mm:ssZ)")]
    InvalidTimestamp(String),

    #[error("Can not use --untagged-only and --no-untagged together")]
    NoOrphanMode,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed entity on line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
