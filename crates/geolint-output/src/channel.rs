//! Named output channels.
//!
//! A channel receives flagged entities and writes them to `<dir>/<name>.jsonl`.
//! Member channels additionally remember the members of every group they
//! receive; [`ChannelSet::write_members`] then streams the input once more and
//! writes those members to `<dir>/<name>_all.jsonl` and to the point and line
//! layers `<name>_points` / `<name>_lines` of the feature store.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use geolint_model::{
    for_each_entity, to_iso, Entity, EntityKind, EntitySource, Group, JsonlWriter, KindMask,
};

use crate::error::{OutputError, Result};
use crate::feature_store::{FeatureStore, FieldDef, FieldType, FieldValue, LayerId};
use crate::geometry::{Geometry, GeometryError, GeometryType};

/// A member as channels see it: kind plus positive id.
pub type MemberKey = (EntityKind, u64);

/// Handle to a channel in a [`ChannelSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

#[derive(Debug, Clone, Copy)]
struct MemberRef {
    group_id: i64,
    mark: bool,
}

struct MemberTracking {
    members: AHashMap<MemberKey, Vec<MemberRef>>,
    points: LayerId,
    lines: LayerId,
    written: u64,
}

pub struct Channel {
    name: String,
    writer: JsonlWriter,
    geometry_errors: u64,
    tracking: Option<MemberTracking>,
}

impl Channel {
    fn open(dir: &Path, name: &str, tracking: Option<MemberTracking>) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            writer: JsonlWriter::create(dir.join(format!("{name}.jsonl")))?,
            geometry_errors: 0,
            tracking,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entities emitted so far.
    pub fn emitted(&self) -> u64 {
        self.writer.written()
    }

    pub fn geometry_errors(&self) -> u64 {
        self.geometry_errors
    }

    /// Members written by [`ChannelSet::write_members`].
    pub fn members_written(&self) -> u64 {
        self.tracking.as_ref().map_or(0, |t| t.written)
    }

    fn emit(&mut self, entity: &Entity) -> Result<()> {
        self.writer.write(entity)?;
        Ok(())
    }

    fn record_geometry_error(&mut self, entity: &str, id: i64, err: &GeometryError) {
        self.geometry_errors += 1;
        tracing::debug!(channel = %self.name, entity, id, %err, "skipping feature geometry");
    }
}

/// All channels of one run plus the shared feature store.
pub struct ChannelSet {
    dir: PathBuf,
    store: FeatureStore,
    channels: Vec<Channel>,
}

impl ChannelSet {
    /// Create `dir` if needed and open a fresh feature store
    /// `<dir>/<feature_db_name>`.
    pub fn create(dir: impl Into<PathBuf>, feature_db_name: &str) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| OutputError::Create {
            path: dir.clone(),
            source,
        })?;
        let store = FeatureStore::create(dir.join(feature_db_name))?;
        Ok(Self {
            dir,
            store,
            channels: Vec::new(),
        })
    }

    pub fn add_channel(&mut self, name: &str) -> Result<ChannelId> {
        let channel = Channel::open(&self.dir, name, None)?;
        self.channels.push(channel);
        Ok(ChannelId(self.channels.len() - 1))
    }

    /// Add a channel that also tracks the members of the groups it receives.
    pub fn add_member_channel(&mut self, name: &str) -> Result<ChannelId> {
        let points = self.store.create_layer(
            &format!("{name}_points"),
            GeometryType::Point,
            member_fields(),
        )?;
        let lines = self.store.create_layer(
            &format!("{name}_lines"),
            GeometryType::LineString,
            member_fields(),
        )?;
        let tracking = MemberTracking {
            members: AHashMap::new(),
            points,
            lines,
            written: 0,
        };
        let channel = Channel::open(&self.dir, name, Some(tracking))?;
        self.channels.push(channel);
        Ok(ChannelId(self.channels.len() - 1))
    }

    #[cfg(test)]
    fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0]
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter()
    }

    pub fn emit(&mut self, id: ChannelId, entity: &Entity) -> Result<()> {
        self.channels[id.0].emit(entity)
    }

    /// Emit `group` and register its members. Members listed in `marks` get
    /// `mark = true` on their features.
    pub fn add_group(&mut self, id: ChannelId, group: &Group, marks: &[MemberKey]) -> Result<()> {
        let channel = &mut self.channels[id.0];
        channel.emit(&Entity::Group(group.clone()))?;
        let Some(tracking) = channel.tracking.as_mut() else {
            return Ok(());
        };
        for member in &group.members {
            let key = (member.kind, member.positive_id());
            let mark = marks.contains(&key);
            tracking
                .members
                .entry(key)
                .or_default()
                .push(MemberRef {
                    group_id: group.id,
                    mark,
                });
        }
        Ok(())
    }

    pub fn create_layer(
        &mut self,
        name: &str,
        geometry: GeometryType,
        fields: Vec<FieldDef>,
    ) -> Result<LayerId> {
        self.store.create_layer(name, geometry, fields)
    }

    /// Add a feature for an entity of channel `id`. A failed geometry is
    /// counted on the channel and skipped; returns whether a feature was
    /// written.
    pub fn add_feature(
        &mut self,
        id: ChannelId,
        layer: LayerId,
        entity: &Entity,
        geometry: std::result::Result<Geometry, GeometryError>,
        values: Vec<FieldValue>,
    ) -> Result<bool> {
        match geometry {
            Ok(geometry) => {
                self.store.add_feature(layer, &geometry, values)?;
                Ok(true)
            }
            Err(err) => {
                self.channels[id.0].record_geometry_error(
                    entity.kind().as_str(),
                    entity.id(),
                    &err,
                );
                Ok(false)
            }
        }
    }

    /// True if some member channel registered at least one member.
    pub fn has_members(&self) -> bool {
        self.channels
            .iter()
            .filter_map(|c| c.tracking.as_ref())
            .any(|t| !t.members.is_empty())
    }

    /// Stream `source` once and write every registered member.
    ///
    /// Does nothing (and skips the pass) when no member was registered.
    pub fn write_members<S>(&mut self, source: &S) -> Result<()>
    where
        S: EntitySource + ?Sized,
    {
        if !self.has_members() {
            return Ok(());
        }
        let mut kinds = KindMask::NONE;
        for tracking in self.channels.iter().filter_map(|c| c.tracking.as_ref()) {
            for (kind, _) in tracking.members.keys() {
                kinds = kinds | KindMask::of(*kind);
            }
        }

        let mut writers: Vec<Option<JsonlWriter>> = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let writer = match &channel.tracking {
                Some(t) if !t.members.is_empty() => Some(JsonlWriter::create(
                    self.dir.join(format!("{}_all.jsonl", channel.name)),
                )?),
                _ => None,
            };
            writers.push(writer);
        }

        let Self {
            store, channels, ..
        } = self;
        for_each_entity(source, kinds, "write members", |entity| {
            for (channel, writer) in channels.iter_mut().zip(writers.iter_mut()) {
                let Some(writer) = writer.as_mut() else {
                    continue;
                };
                write_member(channel, writer, store, &entity)?;
            }
            Ok::<_, OutputError>(())
        })?;

        for (channel, writer) in self.channels.iter().zip(writers.iter_mut()) {
            if let Some(writer) = writer {
                writer.flush()?;
                tracing::debug!(
                    channel = %channel.name,
                    members = channel.members_written(),
                    "wrote channel members"
                );
            }
        }
        Ok(())
    }

    /// Flush every channel and commit the feature store.
    pub fn close(mut self) -> Result<()> {
        for channel in &mut self.channels {
            channel.writer.flush()?;
            tracing::debug!(
                channel = %channel.name,
                path = %channel.writer.path().display(),
                emitted = channel.emitted(),
                geometry_errors = channel.geometry_errors,
                "closed channel"
            );
        }
        self.store.commit()
    }
}

fn member_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("group_id", FieldType::Integer),
        FieldDef::new("member_id", FieldType::Integer),
        FieldDef::new("timestamp", FieldType::Text),
        FieldDef::new("mark", FieldType::Bool),
    ]
}

fn write_member(
    channel: &mut Channel,
    writer: &mut JsonlWriter,
    store: &mut FeatureStore,
    entity: &Entity,
) -> Result<()> {
    let Some(tracking) = channel.tracking.as_mut() else {
        return Ok(());
    };
    let Some(refs) = tracking.members.get(&(entity.kind(), entity.positive_id())) else {
        return Ok(());
    };
    writer.write(entity)?;
    tracking.written += 1;

    let (layer, geometry) = match entity {
        Entity::Point(point) => (tracking.points, Ok(Geometry::point(point.loc))),
        Entity::Line(line) => (tracking.lines, Geometry::linestring(&line.refs)),
        Entity::Group(_) => return Ok(()),
    };
    let geometry = match geometry {
        Ok(geometry) => geometry,
        Err(err) => {
            channel.geometry_errors += refs.len() as u64;
            tracing::debug!(
                channel = %channel.name,
                id = entity.id(),
                %err,
                "skipping member geometry"
            );
            return Ok(());
        }
    };
    let timestamp = to_iso(entity.timestamp());
    for member in refs {
        store.add_feature(
            layer,
            &geometry,
            vec![
                FieldValue::Integer(member.group_id),
                FieldValue::Integer(entity.id()),
                FieldValue::Text(timestamp.clone()),
                FieldValue::Bool(member.mark),
            ],
        )?;
    }
    Ok(())
}
