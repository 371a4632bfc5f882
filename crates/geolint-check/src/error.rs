use thiserror::Error;

use geolint_index::IndexError;
use geolint_model::{ConfigError, ModelError};
use geolint_output::OutputError;

pub type Result<T> = std::result::Result<T, CheckError>;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl CheckError {
    /// Configuration errors are reported with a distinct exit status.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            CheckError::Config(_) | CheckError::Model(ModelError::Config(_))
        )
    }
}
