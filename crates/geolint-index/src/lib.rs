//! Geolint indexes
//!
//! - [`bucket`]: disk-spilled, bucketed detection of locations shared by two
//!   or more points
//! - [`reference`]: which `(kind, id)` pairs are referenced by a line or group
//! - [`id_set`]: the dense and sorted id set representations both build on

pub mod bucket;
mod error;
pub mod id_set;
pub mod kind_array;
pub mod reference;

pub use bucket::{
    bucket_of, BucketedDedupIndex, DedupConfig, DuplicateLocations, ExtractedBuckets,
    ResolveStats, DEFAULT_BUFFER_CAPACITY, NUM_BUCKETS,
};
pub use error::{IndexError, Result};
pub use id_set::{DenseIdSet, IdSet, SortedIdSet};
pub use kind_array::KindArray;
pub use reference::{ReferenceIndex, ReferenceIndexBuilder};
