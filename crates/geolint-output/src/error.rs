use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OutputError>;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("can't create output '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("feature store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("layer '{layer}' expects {expected} fields, got {found}")]
    FieldCount {
        layer: String,
        expected: usize,
        found: usize,
    },

    #[error("layer '{layer}': field '{field}' expects {expected}")]
    FieldType {
        layer: String,
        field: String,
        expected: &'static str,
    },

    #[error("layer '{layer}' holds {expected} geometries")]
    GeometryType {
        layer: String,
        expected: &'static str,
    },

    #[error("counter '{key}' = {value} does not fit the stats table")]
    CounterOverflow { key: String, value: u64 },

    #[error(transparent)]
    Model(#[from] geolint_model::ModelError),
}
