//! Entities nobody references.

use geolint_index::{DenseIdSet, ReferenceIndex};
use geolint_model::{
    for_each_entity, to_iso, Entity, EntityKind, EntitySource, KindMask, Tags, TimestampTracker,
};
use geolint_output::{
    ChannelSet, Counters, FieldDef, FieldType, FieldValue, Geometry, GeometryType,
};

use crate::config::{CheckConfig, OrphanPolicy};
use crate::error::{CheckError, Result};
use crate::report::{self, CheckReport};

pub const CHECK_NAME: &str = "orphans";

/// Tag keys that do not count as content.
pub const IGNORABLE_KEYS: &[&str] = &["created_by", "source"];

impl OrphanPolicy {
    /// Whether an unreferenced entity with `tags` is reported.
    pub fn admits(&self, tags: &Tags) -> bool {
        if tags.is_empty() {
            return self.untagged;
        }
        self.tagged && tags.keys().all(|k| IGNORABLE_KEYS.contains(&k.as_str()))
    }
}

const fn counter_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Point => "orphan_nodes",
        EntityKind::Line => "orphan_ways",
        EntityKind::Group => "orphan_relations",
    }
}

/// Report entities of any kind that no line or group references and whose
/// tags pass `policy`.
pub fn run<S>(source: &S, config: &CheckConfig, policy: OrphanPolicy) -> Result<CheckReport>
where
    S: EntitySource + ?Sized,
{
    let policy = policy.validate()?;
    tracing::info!(
        check = CHECK_NAME,
        cutoff = ?config.cutoff.instant(),
        untagged = policy.untagged,
        tagged = policy.tagged,
        "starting check"
    );

    let (index, _) = ReferenceIndex::<DenseIdSet>::build(source)?;

    let mut counters = Counters::new();
    for kind in EntityKind::ALL {
        counters.declare(counter_name(kind));
    }

    let mut channels = ChannelSet::create(&config.output_dir, "geoms-orphans.db")?;
    let point_channel = channels.add_channel("orphan_points")?;
    let line_channel = channels.add_channel("orphan_lines")?;
    let group_channel = channels.add_channel("orphan_groups")?;
    let point_layer = channels.create_layer(
        "orphan_points",
        GeometryType::Point,
        vec![
            FieldDef::new("node_id", FieldType::Integer),
            FieldDef::new("timestamp", FieldType::Text),
        ],
    )?;
    let line_layer = channels.create_layer(
        "orphan_lines",
        GeometryType::LineString,
        vec![
            FieldDef::new("way_id", FieldType::Integer),
            FieldDef::new("timestamp", FieldType::Text),
        ],
    )?;

    let mut tracker = TimestampTracker::new();
    for_each_entity(source, KindMask::ALL, "find orphans", |entity| {
        tracker.observe(entity.timestamp());
        if !config.cutoff.admits(entity.timestamp())
            || index.contains(entity.kind(), entity.positive_id())
            || !policy.admits(entity.tags())
        {
            return Ok(());
        }
        counters.incr(counter_name(entity.kind()));

        let fields = vec![
            FieldValue::Integer(entity.id()),
            FieldValue::Text(to_iso(entity.timestamp())),
        ];
        match &entity {
            Entity::Point(point) => {
                channels.emit(point_channel, &entity)?;
                channels.add_feature(
                    point_channel,
                    point_layer,
                    &entity,
                    Ok(Geometry::point(point.loc)),
                    fields,
                )?;
            }
            Entity::Line(line) => {
                channels.emit(line_channel, &entity)?;
                channels.add_feature(
                    line_channel,
                    line_layer,
                    &entity,
                    Geometry::linestring(&line.refs),
                    fields,
                )?;
            }
            Entity::Group(_) => channels.emit(group_channel, &entity)?,
        }
        Ok::<_, CheckError>(())
    })?;

    report::finish(CHECK_NAME, channels, counters, &tracker, &config.output_dir)
}
