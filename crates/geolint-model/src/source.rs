//! Re-openable entity sources.
//!
//! Every check is a sequence of full passes. A pass opens the source with a
//! [`KindMask`] and consumes the reader to the end; passes never overlap.

use crate::entity::{Entity, KindMask};
use crate::error::{ModelError, Result};

/// One pass over an entity source.
pub trait EntityReader: Iterator<Item = Result<Entity>> {
    /// Amount of input consumed so far (bytes for files, records in memory).
    fn offset(&self) -> u64;
}

/// A dataset that can be streamed any number of times.
pub trait EntitySource {
    /// Start a new pass yielding only entities whose kind is in `kinds`.
    fn open(&self, kinds: KindMask) -> Result<Box<dyn EntityReader + '_>>;

    /// Total input size in the same unit as [`EntityReader::offset`].
    fn size_hint(&self) -> u64;

    /// Human readable name for log lines.
    fn describe(&self) -> String;
}

/// Summary of one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub entities: u64,
    pub offset: u64,
}

/// Drive one full pass, handing each entity to `f`.
///
/// Stops at the first error from either the reader or `f`.
pub fn for_each_entity<S, E, F>(
    source: &S,
    kinds: KindMask,
    label: &str,
    mut f: F,
) -> std::result::Result<PassSummary, E>
where
    S: EntitySource + ?Sized,
    E: From<ModelError>,
    F: FnMut(Entity) -> std::result::Result<(), E>,
{
    tracing::info!(pass = label, source = %source.describe(), "starting pass");
    let mut reader = source.open(kinds)?;
    let mut summary = PassSummary::default();
    for entity in reader.by_ref() {
        f(entity?)?;
        summary.entities += 1;
    }
    summary.offset = reader.offset();
    tracing::info!(
        pass = label,
        entities = summary.entities,
        offset = summary.offset,
        total = source.size_hint(),
        "finished pass"
    );
    Ok(summary)
}

// ============================================================================
// In-memory source
// ============================================================================

/// Source over an owned vector of entities, in stream order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: Vec<Entity>,
}

impl MemorySource {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

impl FromIterator<Entity> for MemorySource {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

struct MemoryReader<'a> {
    entities: &'a [Entity],
    kinds: KindMask,
    pos: usize,
}

impl Iterator for MemoryReader<'_> {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entity) = self.entities.get(self.pos) {
            self.pos += 1;
            if self.kinds.contains(entity.kind()) {
                return Some(Ok(entity.clone()));
            }
        }
        None
    }
}

impl EntityReader for MemoryReader<'_> {
    fn offset(&self) -> u64 {
        self.pos as u64
    }
}

impl EntitySource for MemorySource {
    fn open(&self, kinds: KindMask) -> Result<Box<dyn EntityReader + '_>> {
        Ok(Box::new(MemoryReader {
            entities: &self.entities,
            kinds,
            pos: 0,
        }))
    }

    fn size_hint(&self) -> u64 {
        self.entities.len() as u64
    }

    fn describe(&self) -> String {
        format!("memory ({} entities)", self.entities.len())
    }
}
