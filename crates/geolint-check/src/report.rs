//! Result of one check run.

use std::path::Path;

use geolint_model::{Timestamp, TimestampTracker};
use geolint_output::{ChannelSet, Counters, StatsDb};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub name: String,
    pub emitted: u64,
    pub members: u64,
    pub geometry_errors: u64,
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub check: &'static str,
    /// Newest entity timestamp seen during the run.
    pub run_timestamp: Timestamp,
    pub counters: Counters,
    pub channels: Vec<ChannelSummary>,
}

impl CheckReport {
    pub fn channel(&self, name: &str) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Close all outputs of a check and append its counters to
/// `<dir>/stats-<check>.db`.
pub(crate) fn finish(
    check: &'static str,
    channels: ChannelSet,
    counters: Counters,
    tracker: &TimestampTracker,
    output_dir: &Path,
) -> Result<CheckReport> {
    let summaries = channels
        .channels()
        .map(|c| ChannelSummary {
            name: c.name().to_string(),
            emitted: c.emitted(),
            members: c.members_written(),
            geometry_errors: c.geometry_errors(),
        })
        .collect();
    channels.close()?;

    let run_timestamp = tracker.latest();
    StatsDb::write(
        &output_dir.join(format!("stats-{check}.db")),
        run_timestamp,
        &counters,
    )?;
    tracing::info!(check, "done");
    Ok(CheckReport {
        check,
        run_timestamp,
        counters,
        channels: summaries,
    })
}
