//! Geolint checks
//!
//! Each check is a fixed sequence of full passes over an [`EntitySource`]
//! and ends by writing its channels, features and counters into the output
//! directory:
//!
//! | check | passes |
//! |-------|--------|
//! | [`colocated`] | bucket extraction, then all kinds |
//! | [`orphans`] | reference index, then all kinds |
//! | [`relations`] | groups, wanted lines, members (via [`RelationMemberResolver`]) |
//! | [`unusual_tags`] | all kinds |
//!
//! [`EntitySource`]: geolint_model::EntitySource

pub mod colocated;
pub mod config;
mod error;
pub mod orphans;
pub mod relations;
mod report;
pub mod resolver;
pub mod rules;
pub mod unusual_tags;

pub use config::{CheckConfig, OrphanPolicy};
pub use error::{CheckError, Result};
pub use relations::RelationMode;
pub use report::{ChannelSummary, CheckReport};
pub use resolver::{
    CandidateGroups, GroupHandler, MemberCache, RelationMemberResolver, ResolvedGroups,
    ResolvedMembers, ResolverStats,
};
pub use rules::{Category, Finding, Rule, RuleInput, RuleSet};
