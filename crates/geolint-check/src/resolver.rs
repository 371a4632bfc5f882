//! Three-stage group member resolution.
//!
//! Groups may appear before or after the lines they reference, and group
//! rules need the full line data (tags and geometry), not just ids. The
//! resolver therefore makes two passes and then replays:
//!
//! 1. [`RelationMemberResolver::scan_groups`]: stream groups, let the handler
//!    pick candidates, record the line ids they need in a wanted set
//! 2. [`CandidateGroups::collect_members`]: stream lines, cache exactly the
//!    wanted ones
//! 3. [`ResolvedGroups::replay`]: hand every complete candidate and its
//!    resolved members back to the handler
//!
//! Each stage consumes the previous one, so they can only run in order.
//!
//! Memory is proportional to the candidates and the lines they reference, not
//! to the dataset.

use ahash::AHashMap;
use geolint_index::{DenseIdSet, IdSet};
use geolint_model::{
    for_each_entity, positive_id, Cutoff, Entity, EntityKind, EntitySource, Group, KindMask, Line,
    Member, TimestampTracker,
};

use crate::error::{CheckError, Result};

/// Callbacks driving one resolver run.
pub trait GroupHandler {
    /// Stage A: inspect a group admitted by the cutoff. Return `true` to keep
    /// it for replay.
    fn scan_group(&mut self, group: &Group) -> Result<bool>;

    /// Stage A: whether `member` of a kept group must be materialized.
    fn want_member(&self, _group: &Group, member: &Member) -> bool {
        member.kind == EntityKind::Line
    }

    /// Stage C: evaluate a kept group whose wanted members were all found.
    fn complete_group(&mut self, group: &Group, members: &ResolvedMembers<'_>) -> Result<()>;
}

/// Lines collected in Stage B, keyed by positive id.
#[derive(Debug, Default)]
pub struct MemberCache {
    lines: AHashMap<u64, Line>,
}

impl MemberCache {
    pub fn get(&self, id: i64) -> Option<&Line> {
        self.lines.get(&positive_id(id))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lines.contains_key(&positive_id(id))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// View of the member cache handed to [`GroupHandler::complete_group`].
pub struct ResolvedMembers<'a> {
    cache: &'a MemberCache,
}

impl<'a> ResolvedMembers<'a> {
    /// The cached line for `member`.
    ///
    /// # Panics
    ///
    /// If `member` was not wanted in Stage A. Wanted members of a replayed
    /// group are always cached.
    pub fn line(&self, member: &Member) -> &'a Line {
        match self.cache.get(member.id) {
            Some(line) => line,
            None => panic!(
                "member cache miss for {} {}: only members wanted during the group scan can be resolved",
                member.kind, member.id
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub groups_scanned: u64,
    pub candidates: u64,
    pub wanted: u64,
    pub cached: u64,
    /// Candidates skipped because a wanted member is missing from the input.
    pub incomplete: u64,
    pub replayed: u64,
}

struct Candidate {
    group: Group,
    /// Positive ids of the members that must be in the cache.
    wanted: Vec<u64>,
}

pub struct RelationMemberResolver<H> {
    handler: H,
    cutoff: Cutoff,
    tracker: TimestampTracker,
}

impl<H: GroupHandler> RelationMemberResolver<H> {
    pub fn new(handler: H, cutoff: Cutoff) -> Self {
        Self {
            handler,
            cutoff,
            tracker: TimestampTracker::new(),
        }
    }

    /// Run all three stages.
    pub fn run<S>(self, source: &S) -> Result<(H, ResolverStats, TimestampTracker)>
    where
        S: EntitySource + ?Sized,
    {
        self.scan_groups(source)?
            .collect_members(source)?
            .replay()
    }

    /// Stage A.
    pub fn scan_groups<S>(mut self, source: &S) -> Result<CandidateGroups<H>>
    where
        S: EntitySource + ?Sized,
    {
        let mut stats = ResolverStats::default();
        let mut candidates = Vec::new();
        let mut wanted = DenseIdSet::new();
        let handler = &mut self.handler;
        let tracker = &mut self.tracker;
        let cutoff = &self.cutoff;

        for_each_entity(source, KindMask::GROUP, "group scan", |entity| {
            let Entity::Group(group) = entity else {
                return Ok(());
            };
            tracker.observe(group.timestamp);
            if !cutoff.admits(group.timestamp) {
                return Ok(());
            }
            stats.groups_scanned += 1;
            if !handler.scan_group(&group)? {
                return Ok(());
            }
            let ids: Vec<u64> = group
                .members
                .iter()
                .filter(|m| handler.want_member(&group, m))
                .map(Member::positive_id)
                .collect();
            for &id in &ids {
                wanted.insert(id);
            }
            candidates.push(Candidate { group, wanted: ids });
            Ok::<_, CheckError>(())
        })?;

        stats.candidates = candidates.len() as u64;
        stats.wanted = wanted.len();
        tracing::debug!(
            candidates = stats.candidates,
            wanted = stats.wanted,
            "group scan complete"
        );
        Ok(CandidateGroups {
            resolver: self,
            candidates,
            wanted,
            stats,
        })
    }
}

/// Output of Stage A.
pub struct CandidateGroups<H> {
    resolver: RelationMemberResolver<H>,
    candidates: Vec<Candidate>,
    wanted: DenseIdSet,
    stats: ResolverStats,
}

impl<H: GroupHandler> CandidateGroups<H> {
    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// True if Stage A marked the line with this positive id as needed.
    pub fn is_wanted(&self, id: u64) -> bool {
        self.wanted.contains(id)
    }

    /// Stage B.
    pub fn collect_members<S>(mut self, source: &S) -> Result<ResolvedGroups<H>>
    where
        S: EntitySource + ?Sized,
    {
        let mut cache = MemberCache::default();
        let wanted = &self.wanted;
        let tracker = &mut self.resolver.tracker;

        for_each_entity(source, KindMask::LINE, "member scan", |entity| {
            if let Entity::Line(line) = entity {
                tracker.observe(line.timestamp);
                let id = positive_id(line.id);
                if wanted.contains(id) {
                    cache.lines.insert(id, line);
                }
            }
            Ok::<_, CheckError>(())
        })?;

        self.stats.cached = cache.len() as u64;
        tracing::debug!(cached = self.stats.cached, "member scan complete");
        Ok(ResolvedGroups {
            resolver: self.resolver,
            candidates: self.candidates,
            cache,
            stats: self.stats,
        })
    }
}

/// Output of Stage B.
pub struct ResolvedGroups<H> {
    resolver: RelationMemberResolver<H>,
    candidates: Vec<Candidate>,
    cache: MemberCache,
    stats: ResolverStats,
}

impl<H: GroupHandler> ResolvedGroups<H> {
    pub fn cache(&self) -> &MemberCache {
        &self.cache
    }

    /// Stage C. Returns the handler together with run statistics and the
    /// timestamps observed by both passes.
    pub fn replay(self) -> Result<(H, ResolverStats, TimestampTracker)> {
        let ResolvedGroups {
            resolver,
            candidates,
            cache,
            mut stats,
        } = self;
        let RelationMemberResolver {
            mut handler,
            tracker,
            ..
        } = resolver;
        let members = ResolvedMembers { cache: &cache };

        for candidate in &candidates {
            if let Some(missing) = candidate
                .wanted
                .iter()
                .find(|&&id| !cache.lines.contains_key(&id))
            {
                stats.incomplete += 1;
                tracing::debug!(
                    group = candidate.group.id,
                    missing,
                    "skipping group with member missing from input"
                );
                continue;
            }
            handler.complete_group(&candidate.group, &members)?;
            stats.replayed += 1;
        }

        tracing::info!(
            candidates = stats.candidates,
            replayed = stats.replayed,
            incomplete = stats.incomplete,
            "replayed candidate groups"
        );
        Ok((handler, stats, tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolint_model::{has_tag, parse_timestamp, MemorySource, NodeRef, Tags};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn line(id: i64) -> Entity {
        Entity::Line(Line {
            id,
            timestamp: parse_timestamp("2020-01-01T00:00:00Z").unwrap(),
            tags: tags(&[("name", &format!("l{id}"))]),
            refs: vec![NodeRef::new(1), NodeRef::new(2)],
        })
    }

    fn group(id: i64, ts: &str, members: Vec<Member>) -> Entity {
        Entity::Group(Group {
            id,
            timestamp: parse_timestamp(ts).unwrap(),
            tags: tags(&[("type", "multipolygon")]),
            members,
        })
    }

    #[derive(Default)]
    struct Recorder {
        scanned: Vec<i64>,
        completed: Vec<(i64, Vec<String>)>,
    }

    impl GroupHandler for Recorder {
        fn scan_group(&mut self, group: &Group) -> Result<bool> {
            self.scanned.push(group.id);
            Ok(has_tag(&group.tags, "type", "multipolygon"))
        }

        fn complete_group(&mut self, group: &Group, members: &ResolvedMembers<'_>) -> Result<()> {
            let names = group
                .members
                .iter()
                .filter(|m| m.kind == EntityKind::Line)
                .map(|m| members.line(m).tags["name"].clone())
                .collect();
            self.completed.push((group.id, names));
            Ok(())
        }
    }

    #[test]
    fn members_resolve_in_either_stream_order() {
        // Line 10 comes before the group, line 11 after it.
        let source = MemorySource::new(vec![
            line(10),
            group(
                1,
                "2020-01-01T00:00:00Z",
                vec![
                    Member::new(EntityKind::Line, 10, "outer"),
                    Member::new(EntityKind::Point, 5, ""),
                    Member::new(EntityKind::Line, -11, "inner"),
                ],
            ),
            line(11),
            line(12),
        ]);
        let (handler, stats, tracker) = RelationMemberResolver::new(Recorder::default(), Cutoff::none())
            .run(&source)
            .unwrap();
        assert_eq!(stats.wanted, 2);
        assert_eq!(stats.cached, 2);
        assert_eq!(
            handler.completed,
            vec![(1, vec!["l10".to_string(), "l11".to_string()])]
        );
        assert_eq!(
            tracker.latest(),
            parse_timestamp("2020-01-01T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn cutoff_applies_to_groups() {
        let source = MemorySource::new(vec![
            group(1, "2020-01-01T00:00:00Z", vec![]),
            group(2, "2022-01-01T00:00:00Z", vec![]),
        ]);
        let cutoff = Cutoff::before(parse_timestamp("2021-01-01T00:00:00Z").unwrap());
        let (handler, stats, _) = RelationMemberResolver::new(Recorder::default(), cutoff)
            .run(&source)
            .unwrap();
        assert_eq!(handler.scanned, vec![1]);
        assert_eq!(stats.groups_scanned, 1);
    }

    #[test]
    fn groups_with_missing_members_are_not_replayed() {
        let source = MemorySource::new(vec![
            group(
                1,
                "2020-01-01T00:00:00Z",
                vec![Member::new(EntityKind::Line, 99, "outer")],
            ),
            group(
                2,
                "2020-01-01T00:00:00Z",
                vec![Member::new(EntityKind::Line, 10, "outer")],
            ),
            line(10),
        ]);
        let (handler, stats, _) = RelationMemberResolver::new(Recorder::default(), Cutoff::none())
            .run(&source)
            .unwrap();
        assert_eq!(stats.incomplete, 1);
        assert_eq!(handler.completed.len(), 1);
        assert_eq!(handler.completed[0].0, 2);
    }

    #[test]
    fn stages_can_be_driven_one_at_a_time() {
        let source = MemorySource::new(vec![
            group(
                1,
                "2020-01-01T00:00:00Z",
                vec![Member::new(EntityKind::Line, 10, "outer")],
            ),
            line(10),
            line(20),
        ]);
        let candidates = RelationMemberResolver::new(Recorder::default(), Cutoff::none())
            .scan_groups(&source)
            .unwrap();
        assert!(candidates.is_wanted(10));
        assert!(!candidates.is_wanted(20));
        let resolved = candidates.collect_members(&source).unwrap();
        assert!(resolved.cache().contains(10));
        assert!(!resolved.cache().contains(20));
        let (handler, _, _) = resolved.replay().unwrap();
        assert_eq!(handler.completed.len(), 1);
    }

    #[test]
    #[should_panic(expected = "member cache miss")]
    fn unwanted_lookup_panics() {
        let cache = MemberCache::default();
        let members = ResolvedMembers { cache: &cache };
        members.line(&Member::new(EntityKind::Line, 1, ""));
    }
}
