//! Geolint entity model
//!
//! Types shared by every geolint crate:
//!
//! - the closed entity union ([`Entity`]: point, line, group)
//! - kind masks and positive ids used for indexing
//! - timestamps, the run [`Cutoff`] and [`TimestampTracker`]
//! - re-openable streaming sources ([`EntitySource`]) and the JSON-lines
//!   reader/writer used for input and flagged-entity output

pub mod entity;
mod error;
pub mod jsonl;
pub mod source;
pub mod time;

pub use entity::{
    has_tag, positive_id, Entity, EntityKind, Group, KindMask, Line, Location, Member, NodeRef,
    Point, Tags, COORDINATE_PRECISION,
};
pub use error::{ConfigError, ModelError, Result};
pub use jsonl::{JsonlSource, JsonlWriter};
pub use source::{for_each_entity, EntityReader, EntitySource, MemorySource, PassSummary};
pub use time::{parse_timestamp, to_iso, Cutoff, Timestamp, TimestampTracker};
