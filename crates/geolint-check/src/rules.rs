//! Group anomaly rules.
//!
//! Every anomaly is one [`Rule`] row: the [`Category`] it reports, the kind of
//! group it applies to, whether a legacy-style group suppresses it, whether
//! it needs resolved member lines, and a pure evaluation function returning
//! the member marks and member-level tallies of a hit.

use std::collections::BTreeMap;

use geolint_model::{has_tag, positive_id, EntityKind, Group, Line, Member, Tags};
use geolint_output::MemberKey;

use crate::resolver::ResolvedMembers;

/// Tag keys ignored when comparing group and member tags.
pub const EXCLUDED_KEYS: [&str; 4] = ["type", "created_by", "source", "note"];

/// Groups with at least this many members are reported as large.
pub const LARGE_GROUP_MEMBERS: usize = 1000;

/// Tags with [`EXCLUDED_KEYS`] removed.
pub fn filtered(tags: &Tags) -> BTreeMap<&str, &str> {
    tags.iter()
        .filter(|(k, _)| !EXCLUDED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// The member carries the group's filtered tags, key and value, and nothing
/// else.
pub fn same_tags(group: &Tags, member: &Tags) -> bool {
    let member = filtered(member);
    !member.is_empty() && member == filtered(group)
}

/// A closed, non-inner member with the group's filtered key set but at least
/// one different value.
pub fn conflicting_tags(group: &Tags, member: &Line, role: &str) -> bool {
    if !member.is_closed() || role == "inner" {
        return false;
    }
    let member = filtered(&member.tags);
    let group = filtered(group);
    !member.is_empty() && member.keys().eq(group.keys()) && member != group
}

/// Line member ids occurring more than once, each reported once, ascending.
pub fn duplicate_lines(members: &[Member]) -> Vec<i64> {
    let mut ids: Vec<i64> = members
        .iter()
        .filter(|m| m.kind == EntityKind::Line)
        .map(|m| m.id)
        .collect();
    ids.sort_unstable();
    let mut dups: Vec<i64> = ids
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| w[0])
        .collect();
    dups.dedup();
    dups
}

/// The group carries nothing but excluded keys.
pub fn is_legacy_style(tags: &Tags) -> bool {
    filtered(tags).is_empty()
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    RelationNoMembers,
    RelationNoTag,
    RelationNoTypeTag,
    RelationOnlyTypeTag,
    RelationLarge,
    MultipolygonNonWayMember,
    MultipolygonUnknownRole,
    MultipolygonEmptyRole,
    MultipolygonSingleWay,
    MultipolygonDuplicateWay,
    MultipolygonOldStyle,
    MultipolygonAreaTag,
    MultipolygonBoundaryAdministrativeTag,
    MultipolygonSameTags,
    MultipolygonSameKeys,
    BoundaryEmptyRole,
    BoundaryDuplicateWay,
    BoundaryAreaTag,
    BoundaryNoBoundaryTag,
}

impl Category {
    /// Channel and counter name.
    pub const fn name(self) -> &'static str {
        match self {
            Category::RelationNoMembers => "relation_no_members",
            Category::RelationNoTag => "relation_no_tag",
            Category::RelationNoTypeTag => "relation_no_type_tag",
            Category::RelationOnlyTypeTag => "relation_only_type_tag",
            Category::RelationLarge => "relation_large",
            Category::MultipolygonNonWayMember => "multipolygon_non_way_member",
            Category::MultipolygonUnknownRole => "multipolygon_unknown_role",
            Category::MultipolygonEmptyRole => "multipolygon_empty_role",
            Category::MultipolygonSingleWay => "multipolygon_single_way",
            Category::MultipolygonDuplicateWay => "multipolygon_duplicate_way",
            Category::MultipolygonOldStyle => "multipolygon_old_style",
            Category::MultipolygonAreaTag => "multipolygon_area_tag",
            Category::MultipolygonBoundaryAdministrativeTag => {
                "multipolygon_boundary_administrative_tag"
            }
            Category::MultipolygonSameTags => "multipolygon_same_tags",
            Category::MultipolygonSameKeys => "multipolygon_same_keys",
            Category::BoundaryEmptyRole => "boundary_empty_role",
            Category::BoundaryDuplicateWay => "boundary_duplicate_way",
            Category::BoundaryAreaTag => "boundary_area_tag",
            Category::BoundaryNoBoundaryTag => "boundary_no_boundary_tag",
        }
    }

    /// Channels whose group members are written out with geometry.
    pub const fn tracks_members(self) -> bool {
        matches!(
            self,
            Category::RelationNoTag
                | Category::RelationNoTypeTag
                | Category::RelationOnlyTypeTag
                | Category::MultipolygonSameTags
                | Category::MultipolygonSameKeys
        )
    }
}

// ============================================================================
// Rule table
// ============================================================================

/// Groups a rule looks at, by their `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AnyGroup,
    Multipolygon,
    Boundary,
}

impl Scope {
    fn matches(self, group: &Group) -> bool {
        match self {
            Scope::AnyGroup => true,
            Scope::Multipolygon => has_tag(&group.tags, "type", "multipolygon"),
            Scope::Boundary => has_tag(&group.tags, "type", "boundary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Always,
    /// Skipped for legacy-style groups.
    UnlessLegacy,
}

/// What a rule sees of a group.
pub struct RuleInput<'g, 'm> {
    pub group: &'g Group,
    /// Only present during replay.
    pub members: Option<&'g ResolvedMembers<'m>>,
    pub legacy: bool,
}

impl<'g, 'm> RuleInput<'g, 'm> {
    pub fn new(group: &'g Group, members: Option<&'g ResolvedMembers<'m>>) -> Self {
        Self {
            group,
            members,
            legacy: is_legacy_style(&group.tags),
        }
    }
}

/// A rule hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finding {
    /// Specifically implicated members.
    pub marks: Vec<MemberKey>,
    /// Member-level counters to bump.
    pub tallies: Vec<(&'static str, u64)>,
}

impl Finding {
    fn marked(marks: Vec<MemberKey>) -> Option<Self> {
        Some(Self {
            marks,
            tallies: Vec::new(),
        })
    }
}

type Eval = fn(&RuleInput<'_, '_>) -> Option<Finding>;

#[derive(Clone, Copy)]
pub struct Rule {
    pub category: Category,
    pub scope: Scope,
    pub applies: Applies,
    pub needs_members: bool,
    eval: Eval,
}

impl Rule {
    const fn new(category: Category, scope: Scope, applies: Applies, eval: Eval) -> Self {
        Self {
            category,
            scope,
            applies,
            needs_members: false,
            eval,
        }
    }

    const fn with_members(self) -> Self {
        Self {
            needs_members: true,
            ..self
        }
    }

    /// True if the rule would be evaluated for this group.
    pub fn is_applicable(&self, input: &RuleInput<'_, '_>) -> bool {
        self.scope.matches(input.group) && !(self.applies == Applies::UnlessLegacy && input.legacy)
    }

    pub fn check(&self, input: &RuleInput<'_, '_>) -> Option<Finding> {
        if !self.is_applicable(input) || (self.needs_members && input.members.is_none()) {
            return None;
        }
        (self.eval)(input)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("category", &self.category)
            .field("scope", &self.scope)
            .field("applies", &self.applies)
            .field("needs_members", &self.needs_members)
            .finish()
    }
}

fn no_members(input: &RuleInput<'_, '_>) -> Option<Finding> {
    input.group.members.is_empty().then(Finding::default)
}

fn no_tag(input: &RuleInput<'_, '_>) -> Option<Finding> {
    input.group.tags.is_empty().then(Finding::default)
}

fn no_type_tag(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let tags = &input.group.tags;
    (!tags.is_empty() && !tags.contains_key("type")).then(Finding::default)
}

fn only_type_tag(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let tags = &input.group.tags;
    (tags.len() == 1 && tags.contains_key("type")).then(Finding::default)
}

fn large(input: &RuleInput<'_, '_>) -> Option<Finding> {
    (input.group.members.len() >= LARGE_GROUP_MEMBERS).then(Finding::default)
}

fn non_line_member(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let count = |kind| input.group.members.iter().filter(|m| m.kind == kind).count() as u64;
    let points = count(EntityKind::Point);
    let groups = count(EntityKind::Group);
    if points + groups == 0 {
        return None;
    }
    Some(Finding {
        marks: Vec::new(),
        tallies: vec![
            ("multipolygon_node_member", points),
            ("multipolygon_relation_member", groups),
        ],
    })
}

fn member_key(member: &Member) -> MemberKey {
    (member.kind, member.positive_id())
}

fn line_members(group: &Group) -> impl Iterator<Item = &Member> {
    group.members.iter().filter(|m| m.kind == EntityKind::Line)
}

fn unknown_role(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let marks: Vec<MemberKey> = line_members(input.group)
        .filter(|m| !m.role.is_empty() && m.role != "inner" && m.role != "outer")
        .map(member_key)
        .collect();
    (!marks.is_empty()).then(|| Finding {
        tallies: vec![("multipolygon_unknown_role_members", marks.len() as u64)],
        marks,
    })
}

fn empty_line_role(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let marks: Vec<MemberKey> = line_members(input.group)
        .filter(|m| m.role.is_empty())
        .map(member_key)
        .collect();
    (!marks.is_empty()).then(|| Finding {
        tallies: vec![("multipolygon_empty_role_members", marks.len() as u64)],
        marks,
    })
}

fn single_line(input: &RuleInput<'_, '_>) -> Option<Finding> {
    match input.group.members.as_slice() {
        [only] if only.kind == EntityKind::Line => Finding::marked(vec![member_key(only)]),
        _ => None,
    }
}

fn duplicate_line(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let dups = duplicate_lines(&input.group.members);
    (!dups.is_empty()).then(|| Finding {
        marks: dups
            .into_iter()
            .map(|id| (EntityKind::Line, positive_id(id)))
            .collect(),
        tallies: Vec::new(),
    })
}

fn legacy_style(input: &RuleInput<'_, '_>) -> Option<Finding> {
    input.legacy.then(Finding::default)
}

fn area_tag(input: &RuleInput<'_, '_>) -> Option<Finding> {
    input.group.tags.contains_key("area").then(Finding::default)
}

fn boundary_administrative(input: &RuleInput<'_, '_>) -> Option<Finding> {
    has_tag(&input.group.tags, "boundary", "administrative").then(Finding::default)
}

fn missing_boundary_tag(input: &RuleInput<'_, '_>) -> Option<Finding> {
    (!input.group.tags.contains_key("boundary")).then(Finding::default)
}

fn empty_role_any(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let marks: Vec<MemberKey> = input
        .group
        .members
        .iter()
        .filter(|m| m.role.is_empty())
        .map(member_key)
        .collect();
    (!marks.is_empty()).then(|| Finding {
        tallies: vec![("boundary_empty_role_members", marks.len() as u64)],
        marks,
    })
}

fn members_with_same_tags(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let members = input.members?;
    let marks: Vec<MemberKey> = line_members(input.group)
        .filter(|m| same_tags(&input.group.tags, &members.line(m).tags))
        .map(member_key)
        .collect();
    (!marks.is_empty()).then(|| Finding {
        tallies: vec![(
            "multipolygon_relation_members_with_same_tags",
            marks.len() as u64,
        )],
        marks,
    })
}

fn members_with_same_keys(input: &RuleInput<'_, '_>) -> Option<Finding> {
    let members = input.members?;
    let marks: Vec<MemberKey> = line_members(input.group)
        .filter(|m| {
            let line = members.line(m);
            !same_tags(&input.group.tags, &line.tags)
                && conflicting_tags(&input.group.tags, line, &m.role)
        })
        .map(member_key)
        .collect();
    (!marks.is_empty()).then(|| Finding {
        tallies: vec![(
            "multipolygon_relation_members_with_same_keys",
            marks.len() as u64,
        )],
        marks,
    })
}

const GENERAL_RULES: [Rule; 5] = [
    Rule::new(Category::RelationNoMembers, Scope::AnyGroup, Applies::Always, no_members),
    Rule::new(Category::RelationNoTag, Scope::AnyGroup, Applies::Always, no_tag),
    Rule::new(Category::RelationNoTypeTag, Scope::AnyGroup, Applies::Always, no_type_tag),
    Rule::new(Category::RelationOnlyTypeTag, Scope::AnyGroup, Applies::Always, only_type_tag),
    Rule::new(Category::RelationLarge, Scope::AnyGroup, Applies::Always, large),
];

const MULTIPOLYGON_STRUCTURE_RULES: [Rule; 8] = [
    Rule::new(Category::MultipolygonNonWayMember, Scope::Multipolygon, Applies::Always, non_line_member),
    Rule::new(Category::MultipolygonUnknownRole, Scope::Multipolygon, Applies::Always, unknown_role),
    Rule::new(Category::MultipolygonEmptyRole, Scope::Multipolygon, Applies::Always, empty_line_role),
    Rule::new(Category::MultipolygonSingleWay, Scope::Multipolygon, Applies::Always, single_line),
    Rule::new(Category::MultipolygonDuplicateWay, Scope::Multipolygon, Applies::Always, duplicate_line),
    Rule::new(Category::MultipolygonOldStyle, Scope::Multipolygon, Applies::Always, legacy_style),
    Rule::new(Category::MultipolygonAreaTag, Scope::Multipolygon, Applies::UnlessLegacy, area_tag),
    Rule::new(
        Category::MultipolygonBoundaryAdministrativeTag,
        Scope::Multipolygon,
        Applies::UnlessLegacy,
        boundary_administrative,
    ),
];

const MEMBER_TAG_RULES: [Rule; 2] = [
    Rule::new(Category::MultipolygonSameTags, Scope::Multipolygon, Applies::UnlessLegacy, members_with_same_tags)
        .with_members(),
    Rule::new(Category::MultipolygonSameKeys, Scope::Multipolygon, Applies::UnlessLegacy, members_with_same_keys)
        .with_members(),
];

const BOUNDARY_RULES: [Rule; 4] = [
    Rule::new(Category::BoundaryEmptyRole, Scope::Boundary, Applies::Always, empty_role_any),
    Rule::new(Category::BoundaryDuplicateWay, Scope::Boundary, Applies::Always, duplicate_line),
    Rule::new(Category::BoundaryAreaTag, Scope::Boundary, Applies::Always, area_tag),
    Rule::new(Category::BoundaryNoBoundaryTag, Scope::Boundary, Applies::Always, missing_boundary_tag),
];

/// An ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Every group rule: general, multipolygon structure and member tags,
    /// boundary.
    pub fn relation_problems() -> Self {
        let rules = GENERAL_RULES
            .iter()
            .chain(&MULTIPOLYGON_STRUCTURE_RULES)
            .chain(&MEMBER_TAG_RULES)
            .chain(&BOUNDARY_RULES)
            .copied()
            .collect();
        Self { rules }
    }

    /// Only the multipolygon member tag comparisons.
    pub fn multipolygon_problems() -> Self {
        Self {
            rules: MEMBER_TAG_RULES.to_vec(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.rules.iter().map(|r| r.category)
    }

    /// True if some member-needing rule applies to the group.
    pub fn needs_members(&self, input: &RuleInput<'_, '_>) -> bool {
        self.rules
            .iter()
            .any(|r| r.needs_members && r.is_applicable(input))
    }

    /// Evaluate the rules whose `needs_members` equals `with_members`.
    pub fn evaluate(
        &self,
        input: &RuleInput<'_, '_>,
        with_members: bool,
    ) -> Vec<(Category, Finding)> {
        self.rules
            .iter()
            .filter(|r| r.needs_members == with_members)
            .filter_map(|r| r.check(input).map(|f| (r.category, f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolint_model::{parse_timestamp, NodeRef};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn group(tag_pairs: &[(&str, &str)], members: Vec<Member>) -> Group {
        Group {
            id: 1,
            timestamp: parse_timestamp("2020-01-01T00:00:00Z").unwrap(),
            tags: tags(tag_pairs),
            members,
        }
    }

    fn closed_line(tag_pairs: &[(&str, &str)]) -> Line {
        Line {
            id: 7,
            timestamp: parse_timestamp("2020-01-01T00:00:00Z").unwrap(),
            tags: tags(tag_pairs),
            refs: vec![NodeRef::new(1), NodeRef::new(2), NodeRef::new(3), NodeRef::new(1)],
        }
    }

    fn categories(set: &RuleSet, group: &Group) -> Vec<Category> {
        set.evaluate(&RuleInput::new(group, None), false)
            .into_iter()
            .map(|(c, _)| c)
            .collect()
    }

    #[test]
    fn filtered_drops_excluded_keys() {
        let t = tags(&[("type", "multipolygon"), ("note", "x"), ("landuse", "forest")]);
        assert_eq!(filtered(&t), BTreeMap::from([("landuse", "forest")]));
    }

    #[test]
    fn same_tags_needs_identical_filtered_tags() {
        let g = tags(&[("type", "multipolygon"), ("landuse", "forest")]);
        assert!(same_tags(&g, &tags(&[("landuse", "forest"), ("source", "survey")])));
        assert!(!same_tags(&g, &tags(&[("landuse", "meadow")])));
        assert!(!same_tags(&g, &tags(&[("landuse", "forest"), ("name", "x")])));
        // Nothing left after filtering never matches.
        assert!(!same_tags(&tags(&[("type", "multipolygon")]), &tags(&[("source", "x")])));
    }

    #[test]
    fn conflicting_tags_checks_closed_outer_rings_only() {
        let g = tags(&[("type", "multipolygon"), ("landuse", "forest")]);
        let line = closed_line(&[("landuse", "meadow")]);
        assert!(conflicting_tags(&g, &line, "outer"));
        assert!(conflicting_tags(&g, &line, ""));
        assert!(!conflicting_tags(&g, &line, "inner"));

        let mut open = line.clone();
        open.refs.pop();
        assert!(!conflicting_tags(&g, &open, "outer"));

        assert!(!conflicting_tags(&g, &closed_line(&[("landuse", "forest")]), "outer"));
        assert!(!conflicting_tags(&g, &closed_line(&[("natural", "wood")]), "outer"));
    }

    #[test]
    fn duplicate_lines_reports_each_id_once() {
        let members = vec![
            Member::new(EntityKind::Line, 5, "outer"),
            Member::new(EntityKind::Line, 7, "outer"),
            Member::new(EntityKind::Line, 5, "outer"),
            Member::new(EntityKind::Line, 5, "inner"),
            Member::new(EntityKind::Point, 7, ""),
        ];
        assert_eq!(duplicate_lines(&members), vec![5]);
        assert_eq!(duplicate_lines(&members[..2]), Vec::<i64>::new());
    }

    #[test]
    fn legacy_style_suppresses_tag_rules() {
        let set = RuleSet::relation_problems();
        let g = group(
            &[("type", "multipolygon"), ("area", "yes")],
            vec![Member::new(EntityKind::Line, 1, "outer"), Member::new(EntityKind::Line, 2, "outer")],
        );
        // `area` is a real tag, so this is not legacy style.
        assert!(categories(&set, &g).contains(&Category::MultipolygonAreaTag));

        let g = group(
            &[("type", "multipolygon"), ("source", "survey")],
            vec![Member::new(EntityKind::Line, 1, "outer"), Member::new(EntityKind::Line, 2, "outer")],
        );
        let found = categories(&set, &g);
        assert_eq!(found, vec![Category::MultipolygonOldStyle]);
        assert!(!set.needs_members(&RuleInput::new(&g, None)));
    }

    #[test]
    fn general_rules() {
        let set = RuleSet::relation_problems();
        assert_eq!(
            categories(&set, &group(&[], vec![])),
            vec![Category::RelationNoMembers, Category::RelationNoTag]
        );
        assert_eq!(
            categories(&set, &group(&[("name", "x")], vec![Member::new(EntityKind::Point, 1, "")])),
            vec![Category::RelationNoTypeTag]
        );
        assert_eq!(
            categories(&set, &group(&[("type", "route")], vec![Member::new(EntityKind::Point, 1, "")])),
            vec![Category::RelationOnlyTypeTag]
        );
        let many: Vec<Member> = (0..LARGE_GROUP_MEMBERS as i64)
            .map(|i| Member::new(EntityKind::Point, i, ""))
            .collect();
        assert!(categories(&set, &group(&[("type", "route"), ("name", "x")], many))
            .contains(&Category::RelationLarge));
    }

    #[test]
    fn multipolygon_structure_rules() {
        let set = RuleSet::relation_problems();
        let g = group(
            &[("type", "multipolygon"), ("landuse", "forest")],
            vec![
                Member::new(EntityKind::Line, 1, ""),
                Member::new(EntityKind::Line, 2, "hole"),
                Member::new(EntityKind::Line, 2, "outer"),
                Member::new(EntityKind::Point, 3, ""),
            ],
        );
        let findings = set.evaluate(&RuleInput::new(&g, None), false);
        let by_cat: BTreeMap<Category, Finding> = findings.into_iter().collect();
        assert_eq!(by_cat[&Category::MultipolygonEmptyRole].marks, vec![(EntityKind::Line, 1)]);
        assert_eq!(by_cat[&Category::MultipolygonUnknownRole].marks, vec![(EntityKind::Line, 2)]);
        assert_eq!(by_cat[&Category::MultipolygonDuplicateWay].marks, vec![(EntityKind::Line, 2)]);
        assert_eq!(
            by_cat[&Category::MultipolygonNonWayMember].tallies,
            vec![("multipolygon_node_member", 1), ("multipolygon_relation_member", 0)]
        );
        assert!(!by_cat.contains_key(&Category::MultipolygonSingleWay));

        let single = group(
            &[("type", "multipolygon"), ("landuse", "forest")],
            vec![Member::new(EntityKind::Line, 9, "outer")],
        );
        assert!(categories(&set, &single).contains(&Category::MultipolygonSingleWay));
        assert!(set.needs_members(&RuleInput::new(&single, None)));
    }

    #[test]
    fn marks_use_kind_and_positive_id() {
        let set = RuleSet::relation_problems();
        let g = group(
            &[("type", "boundary"), ("boundary", "administrative")],
            vec![
                Member::new(EntityKind::Line, -4, ""),
                Member::new(EntityKind::Point, 4, "label"),
                Member::new(EntityKind::Point, -5, ""),
            ],
        );
        let findings: BTreeMap<Category, Finding> =
            set.evaluate(&RuleInput::new(&g, None), false).into_iter().collect();
        assert_eq!(
            findings[&Category::BoundaryEmptyRole].marks,
            vec![(EntityKind::Line, 4), (EntityKind::Point, 5)]
        );

        let single = group(
            &[("type", "multipolygon"), ("landuse", "forest")],
            vec![Member::new(EntityKind::Line, -9, "outer")],
        );
        let findings: BTreeMap<Category, Finding> =
            set.evaluate(&RuleInput::new(&single, None), false).into_iter().collect();
        assert_eq!(
            findings[&Category::MultipolygonSingleWay].marks,
            vec![(EntityKind::Line, 9)]
        );
    }

    #[test]
    fn boundary_rules() {
        let set = RuleSet::relation_problems();
        let g = group(
            &[("type", "boundary"), ("area", "yes")],
            vec![
                Member::new(EntityKind::Line, 1, ""),
                Member::new(EntityKind::Point, 2, ""),
                Member::new(EntityKind::Line, 1, "outer"),
            ],
        );
        let findings: BTreeMap<Category, Finding> =
            set.evaluate(&RuleInput::new(&g, None), false).into_iter().collect();
        assert_eq!(
            findings.keys().copied().collect::<Vec<_>>(),
            vec![
                Category::BoundaryEmptyRole,
                Category::BoundaryDuplicateWay,
                Category::BoundaryAreaTag,
                Category::BoundaryNoBoundaryTag,
            ]
        );
        assert_eq!(
            findings[&Category::BoundaryEmptyRole].tallies,
            vec![("boundary_empty_role_members", 2)]
        );
    }

    #[test]
    fn multipolygon_problems_has_only_member_rules() {
        let set = RuleSet::multipolygon_problems();
        assert!(set.rules().iter().all(|r| r.needs_members));
        assert_eq!(
            set.categories().collect::<Vec<_>>(),
            vec![Category::MultipolygonSameTags, Category::MultipolygonSameKeys]
        );
    }
}
