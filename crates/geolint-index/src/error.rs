use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("can't access bucket file '{path}': {source}")]
    Bucket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bucket file '{path}' is corrupt: {message}")]
    BucketFormat { path: PathBuf, message: String },

    #[error(transparent)]
    Model(#[from] geolint_model::ModelError),
}

impl IndexError {
    pub(crate) fn bucket(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Bucket {
            path: path.into(),
            source,
        }
    }
}
