//! Points sharing an identical location.

use geolint_index::{BucketedDedupIndex, DedupConfig, IdSet, SortedIdSet};
use geolint_model::{
    for_each_entity, positive_id, to_iso, Entity, EntityKind, EntitySource, KindMask,
    TimestampTracker,
};
use geolint_output::{
    ChannelSet, Counters, FieldDef, FieldType, FieldValue, Geometry, GeometryType,
};

use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::report::{self, CheckReport};

pub const CHECK_NAME: &str = "colocated-nodes";

/// Find locations held by two or more points, then write every point at such
/// a location plus the lines and groups referencing those points.
///
/// Bucket files go to `dedup.work_dir`; the cutoff applies to the points
/// taking part in the location count.
pub fn run<S>(source: &S, config: &CheckConfig, dedup: &DedupConfig) -> Result<CheckReport>
where
    S: EntitySource + ?Sized,
{
    tracing::info!(check = CHECK_NAME, cutoff = ?config.cutoff.instant(), "starting check");
    let mut counters = Counters::new();
    for name in [
        "locations_with_colocated_nodes",
        "colocated_nodes",
        "ways_referencing_colocated_nodes",
        "relations_referencing_colocated_nodes",
    ] {
        counters.declare(name);
    }

    let extracted = BucketedDedupIndex::extract(source, &config.cutoff, dedup)?;
    tracing::debug!(
        entities = extracted.summary().entities,
        used_buckets = extracted.bucket_entries().filter(|&n| n > 0).count(),
        "bucket fill"
    );
    let (duplicates, stats) = extracted.resolve()?;
    counters.set("locations_with_colocated_nodes", duplicates.len() as u64);
    tracing::info!(
        locations = duplicates.len(),
        max_bucket_entries = stats.max_bucket_entries,
        "found colocated locations"
    );

    let mut channels = ChannelSet::create(&config.output_dir, "geoms-colocated-nodes.db")?;
    let channel = channels.add_channel("colocated_nodes")?;
    let layer = channels.create_layer(
        "colocated_nodes",
        GeometryType::Point,
        vec![
            FieldDef::new("node_id", FieldType::Integer),
            FieldDef::new("timestamp", FieldType::Text),
        ],
    )?;

    // Only colocated points go in, so the set stays sparse. Points precede
    // lines and groups in the stream; the set is sealed when the first
    // container arrives.
    let mut point_ids = SortedIdSet::new();
    let mut tracker = TimestampTracker::new();
    for_each_entity(source, KindMask::ALL, "write colocated", |entity| {
        tracker.observe(entity.timestamp());
        match &entity {
            Entity::Point(point) => {
                if !duplicates.contains(point.loc) {
                    return Ok(());
                }
                point_ids.insert(positive_id(point.id));
                counters.incr("colocated_nodes");
                channels.emit(channel, &entity)?;
                channels.add_feature(
                    channel,
                    layer,
                    &entity,
                    Ok(Geometry::point(point.loc)),
                    vec![
                        FieldValue::Integer(point.id),
                        FieldValue::Text(to_iso(point.timestamp)),
                    ],
                )?;
            }
            Entity::Line(line) => {
                point_ids.seal();
                if line.refs.iter().any(|r| point_ids.contains(positive_id(r.id))) {
                    counters.incr("ways_referencing_colocated_nodes");
                    channels.emit(channel, &entity)?;
                }
            }
            Entity::Group(group) => {
                point_ids.seal();
                if group
                    .members
                    .iter()
                    .any(|m| m.kind == EntityKind::Point && point_ids.contains(m.positive_id()))
                {
                    counters.incr("relations_referencing_colocated_nodes");
                    channels.emit(channel, &entity)?;
                }
            }
        }
        Ok::<_, CheckError>(())
    })?;

    report::finish(CHECK_NAME, channels, counters, &tracker, &config.output_dir)
}
