//! Reference presence index.
//!
//! Records every `(kind, id)` named as a member by a container entity (line
//! point references and group members). Building and querying are separate
//! types: [`ReferenceIndexBuilder`] only accepts inserts, and
//! [`ReferenceIndex`] only answers queries, so the index can't change once
//! the query pass starts.

use geolint_model::{
    for_each_entity, positive_id, Entity, EntityKind, EntitySource, KindMask, PassSummary,
};

use crate::error::Result;
use crate::id_set::{DenseIdSet, IdSet};
use crate::kind_array::KindArray;

/// Collects references during the index-building pass.
#[derive(Debug, Default)]
pub struct ReferenceIndexBuilder<S: IdSet = DenseIdSet> {
    sets: KindArray<S>,
}

impl<S: IdSet> ReferenceIndexBuilder<S> {
    pub fn new() -> Self {
        Self {
            sets: KindArray::from_fn(|_| S::default()),
        }
    }

    /// Record the references held by `entity`. Points hold none.
    pub fn record(&mut self, entity: &Entity) {
        match entity {
            Entity::Point(_) => {}
            Entity::Line(line) => {
                let points = &mut self.sets[EntityKind::Point];
                for node_ref in &line.refs {
                    points.insert(positive_id(node_ref.id));
                }
            }
            Entity::Group(group) => {
                for member in &group.members {
                    self.sets[member.kind].insert(member.positive_id());
                }
            }
        }
    }

    pub fn finish(mut self) -> ReferenceIndex<S> {
        for (_, set) in self.sets.iter_mut() {
            set.seal();
        }
        ReferenceIndex { sets: self.sets }
    }
}

/// Read-only set of referenced ids per kind.
#[derive(Debug)]
pub struct ReferenceIndex<S: IdSet = DenseIdSet> {
    sets: KindArray<S>,
}

impl<S: IdSet> ReferenceIndex<S> {
    /// Build the index in one pass over the container entities of `source`.
    pub fn build<Src>(source: &Src) -> Result<(Self, PassSummary)>
    where
        Src: EntitySource + ?Sized,
    {
        let mut builder = ReferenceIndexBuilder::<S>::new();
        let summary = for_each_entity(
            source,
            KindMask::LINE | KindMask::GROUP,
            "reference index",
            |entity| {
                builder.record(&entity);
                Ok::<_, crate::IndexError>(())
            },
        )?;
        let index = builder.finish();
        tracing::debug!(
            points = index.referenced(EntityKind::Point),
            lines = index.referenced(EntityKind::Line),
            groups = index.referenced(EntityKind::Group),
            "reference index built"
        );
        Ok((index, summary))
    }

    /// True iff some container lists `(kind, positive id)` as a member.
    pub fn contains(&self, kind: EntityKind, id: u64) -> bool {
        self.sets[kind].contains(id)
    }

    /// Number of distinct referenced ids of `kind`.
    pub fn referenced(&self, kind: EntityKind) -> u64 {
        self.sets[kind].len()
    }
}
