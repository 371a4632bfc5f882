//! Geolint output
//!
//! Everything a check writes goes through a [`ChannelSet`]: flagged entities
//! as JSON lines per channel, derived point/line features in a SQLite
//! [`FeatureStore`], and run counters via [`StatsDb`].

pub mod channel;
mod error;
pub mod feature_store;
pub mod geometry;
pub mod stats;

pub use channel::{Channel, ChannelId, ChannelSet, MemberKey};
pub use error::{OutputError, Result};
pub use feature_store::{FeatureStore, FieldDef, FieldType, FieldValue, LayerId};
pub use geometry::{Geometry, GeometryError, GeometryType};
pub use stats::{Counters, StatsDb};
