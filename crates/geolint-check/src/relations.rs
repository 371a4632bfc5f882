//! Relation problems and multipolygon problems.
//!
//! Both checks are the [`RuleSet`] driven through the
//! [`RelationMemberResolver`]: rules that only need the group run during the
//! group scan, member tag comparisons run on replay.

use ahash::AHashMap;
use geolint_model::{has_tag, Cutoff, EntityKind, EntitySource, Group};
use geolint_output::{ChannelId, ChannelSet, Counters};

use crate::config::CheckConfig;
use crate::error::Result;
use crate::report::{self, CheckReport};
use crate::resolver::{GroupHandler, RelationMemberResolver, ResolvedMembers};
use crate::rules::{Category, Finding, RuleInput, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationMode {
    /// Every group rule.
    RelationProblems,
    /// Multipolygon member tag comparisons only.
    MultipolygonProblems,
}

impl RelationMode {
    pub const fn check_name(self) -> &'static str {
        match self {
            RelationMode::RelationProblems => "relation-problems",
            RelationMode::MultipolygonProblems => "multipolygon-problems",
        }
    }

    /// Multipolygon problems covers every multipolygon regardless of age.
    fn cutoff(self, configured: Cutoff) -> Cutoff {
        match self {
            RelationMode::RelationProblems => configured,
            RelationMode::MultipolygonProblems => Cutoff::none(),
        }
    }

    fn rules(self) -> RuleSet {
        match self {
            RelationMode::RelationProblems => RuleSet::relation_problems(),
            RelationMode::MultipolygonProblems => RuleSet::multipolygon_problems(),
        }
    }

    /// Counters always reported, in report order.
    fn declared_counters(self) -> &'static [&'static str] {
        match self {
            RelationMode::RelationProblems => &[
                "relation_member_count",
                "multipolygon_node_member",
                "multipolygon_relation_member",
                "multipolygon_unknown_role_members",
                "multipolygon_empty_role_members",
                "boundary_empty_role_members",
            ],
            RelationMode::MultipolygonProblems => &[
                "multipolygon_relations",
                "multipolygon_relations_without_tags",
                "multipolygon_relation_members",
                "multipolygon_relation_way_members",
                "multipolygon_relation_members_with_same_tags",
                "multipolygon_relation_members_with_same_keys",
            ],
        }
    }
}

struct RelationCheck<'a> {
    mode: RelationMode,
    rules: RuleSet,
    channels: &'a mut ChannelSet,
    channel_ids: AHashMap<Category, ChannelId>,
    counters: Counters,
}

impl<'a> RelationCheck<'a> {
    fn new(mode: RelationMode, channels: &'a mut ChannelSet) -> Result<Self> {
        let rules = mode.rules();
        let mut counters = Counters::new();
        let mut channel_ids = AHashMap::new();
        for category in rules.categories() {
            counters.declare(category.name());
            let id = if category.tracks_members() {
                channels.add_member_channel(category.name())?
            } else {
                channels.add_channel(category.name())?
            };
            channel_ids.insert(category, id);
        }
        for name in mode.declared_counters() {
            counters.declare(name);
        }
        Ok(Self {
            mode,
            rules,
            channels,
            channel_ids,
            counters,
        })
    }

    fn record(&mut self, group: &Group, findings: Vec<(Category, Finding)>) -> Result<()> {
        for (category, finding) in findings {
            self.counters.incr(category.name());
            for (name, n) in finding.tallies {
                self.counters.add(name, n);
            }
            let id = self.channel_ids[&category];
            self.channels.add_group(id, group, &finding.marks)?;
        }
        Ok(())
    }

    fn count_members(&mut self, group: &Group) {
        let lines = group
            .members
            .iter()
            .filter(|m| m.kind == EntityKind::Line)
            .count() as u64;
        match self.mode {
            RelationMode::RelationProblems => {
                self.counters
                    .add("relation_member_count", group.members.len() as u64);
            }
            RelationMode::MultipolygonProblems => {
                self.counters.incr("multipolygon_relations");
                self.counters
                    .add("multipolygon_relation_members", group.members.len() as u64);
                self.counters.add("multipolygon_relation_way_members", lines);
            }
        }
    }
}

impl GroupHandler for RelationCheck<'_> {
    fn scan_group(&mut self, group: &Group) -> Result<bool> {
        if self.mode == RelationMode::MultipolygonProblems
            && !has_tag(&group.tags, "type", "multipolygon")
        {
            return Ok(false);
        }
        self.count_members(group);

        let input = RuleInput::new(group, None);
        let findings = self.rules.evaluate(&input, false);
        self.record(group, findings)?;

        if self.mode == RelationMode::MultipolygonProblems && input.legacy {
            self.counters.incr("multipolygon_relations_without_tags");
        }
        Ok(self.rules.needs_members(&input))
    }

    fn complete_group(&mut self, group: &Group, members: &ResolvedMembers<'_>) -> Result<()> {
        let input = RuleInput::new(group, Some(members));
        let findings = self.rules.evaluate(&input, true);
        self.record(group, findings)
    }
}

/// Run the group rules of `mode` over `source`.
///
/// The cutoff of `config` only limits [`RelationMode::RelationProblems`].
pub fn run<S>(source: &S, config: &CheckConfig, mode: RelationMode) -> Result<CheckReport>
where
    S: EntitySource + ?Sized,
{
    let check = mode.check_name();
    let cutoff = mode.cutoff(config.cutoff);
    if cutoff != config.cutoff {
        tracing::warn!(check, "ignoring the configured cutoff");
    }
    tracing::info!(check, cutoff = ?cutoff.instant(), "starting check");
    let mut channels = ChannelSet::create(&config.output_dir, &format!("geoms-{check}.db"))?;

    let handler = RelationCheck::new(mode, &mut channels)?;
    let (handler, stats, tracker) = RelationMemberResolver::new(handler, cutoff).run(source)?;
    let counters = handler.counters;
    tracing::info!(
        groups = stats.groups_scanned,
        candidates = stats.candidates,
        cached_lines = stats.cached,
        "group rules evaluated"
    );

    channels.write_members(source)?;
    report::finish(check, channels, counters, &tracker, &config.output_dir)
}
