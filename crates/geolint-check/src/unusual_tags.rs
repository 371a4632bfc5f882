//! Odd tag keys, values and misplaced type tags.
//!
//! Every tag of every entity before the cutoff is classified on its own; an
//! entity goes to each channel at most once, however many of its tags hit
//! the same issue, while the counters tally tags.

use geolint_model::{
    for_each_entity, has_tag, Entity, EntityKind, EntitySource, KindMask, TimestampTracker,
};
use geolint_output::{ChannelId, ChannelSet, Counters};

use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::report::{self, CheckReport};

pub const CHECK_NAME: &str = "unusual-tags";

/// Keys longer than this many bytes are reported.
pub const MAX_KEY_LEN: usize = 80;

const BAD_CHARACTERS: &[u8] = b"=/&<>;'\"?%#@\\,";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagIssue {
    KeyEmpty,
    KeyShort,
    KeyLong,
    KeyRole,
    KeyBadChars,
    KeyUnusualChars,
    ValueEmpty,
    ValueWhitespace,
}

impl TagIssue {
    pub const ALL: [TagIssue; 8] = [
        TagIssue::KeyEmpty,
        TagIssue::KeyShort,
        TagIssue::KeyLong,
        TagIssue::KeyRole,
        TagIssue::KeyBadChars,
        TagIssue::KeyUnusualChars,
        TagIssue::ValueEmpty,
        TagIssue::ValueWhitespace,
    ];

    /// Channel and counter name.
    pub const fn name(self) -> &'static str {
        match self {
            TagIssue::KeyEmpty => "nwr_key_empty",
            TagIssue::KeyShort => "nwr_key_short",
            TagIssue::KeyLong => "nwr_key_long",
            TagIssue::KeyRole => "nwr_key_role",
            TagIssue::KeyBadChars => "nwr_key_bad_chars",
            TagIssue::KeyUnusualChars => "nwr_key_unusual_chars",
            TagIssue::ValueEmpty => "nwr_value_empty",
            TagIssue::ValueWhitespace => "nwr_value_whitespace",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

fn is_c_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

fn is_usual_key_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':'
}

/// Issues raised by a single tag. Lengths are in bytes.
pub fn tag_issues(key: &str, value: &str) -> Vec<TagIssue> {
    let mut issues = Vec::new();
    let key_bytes = key.as_bytes();

    match key_bytes.len() {
        0 => issues.push(TagIssue::KeyEmpty),
        1 => issues.push(TagIssue::KeyShort),
        n if n > MAX_KEY_LEN => issues.push(TagIssue::KeyLong),
        _ if key == "role" => issues.push(TagIssue::KeyRole),
        _ => {}
    }

    if key_bytes.iter().any(|b| BAD_CHARACTERS.contains(b)) {
        issues.push(TagIssue::KeyBadChars);
    } else if !key_bytes.iter().all(|&b| is_usual_key_char(b)) {
        issues.push(TagIssue::KeyUnusualChars);
    }

    match (value.as_bytes().first(), value.as_bytes().last()) {
        (Some(&first), Some(&last)) => {
            if is_c_space(first) || is_c_space(last) {
                issues.push(TagIssue::ValueWhitespace);
            }
        }
        _ => issues.push(TagIssue::ValueEmpty),
    }
    issues
}

/// Tags that are valid but belong on another kind of entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Misplaced {
    TypeMultipolygon,
    TypeBoundary,
    NaturalCoastline,
    BoundaryOnMultipolygon,
}

impl Misplaced {
    const CHANNELS: [&'static str; 4] = [
        "nw_tag_type_multipolygon",
        "nw_tag_type_boundary",
        "nr_tag_natural_coastline",
        "r_tag_boundary_multipolygon",
    ];

    const fn index(self) -> usize {
        self as usize
    }

    fn counter(self, kind: EntityKind) -> Option<&'static str> {
        match (self, kind) {
            (Misplaced::TypeMultipolygon, EntityKind::Point) => Some("n_tag_type_multipolygon"),
            (Misplaced::TypeMultipolygon, EntityKind::Line) => Some("w_tag_type_multipolygon"),
            (Misplaced::TypeBoundary, EntityKind::Point) => Some("n_tag_type_boundary"),
            (Misplaced::TypeBoundary, EntityKind::Line) => Some("w_tag_type_boundary"),
            (Misplaced::NaturalCoastline, EntityKind::Point) => Some("n_tag_natural_coastline"),
            (Misplaced::NaturalCoastline, EntityKind::Group) => Some("r_tag_natural_coastline"),
            (Misplaced::BoundaryOnMultipolygon, EntityKind::Group) => {
                Some("r_tag_boundary_multipolygon")
            }
            _ => None,
        }
    }
}

fn misplaced_tags(entity: &Entity) -> Vec<Misplaced> {
    let tags = entity.tags();
    let mut found = Vec::new();
    match entity.kind() {
        EntityKind::Point | EntityKind::Line => {
            if has_tag(tags, "type", "multipolygon") {
                found.push(Misplaced::TypeMultipolygon);
            }
            if has_tag(tags, "type", "boundary") {
                found.push(Misplaced::TypeBoundary);
            }
        }
        EntityKind::Group => {}
    }
    if entity.kind() != EntityKind::Line && has_tag(tags, "natural", "coastline") {
        found.push(Misplaced::NaturalCoastline);
    }
    if entity.kind() == EntityKind::Group
        && has_tag(tags, "type", "multipolygon")
        && has_tag(tags, "boundary", "administrative")
    {
        found.push(Misplaced::BoundaryOnMultipolygon);
    }
    found
}

const fn kind_counter(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Point => "nodes",
        EntityKind::Line => "ways",
        EntityKind::Group => "relations",
    }
}

const KIND_COUNTERS: [&str; 3] = ["nodes", "ways", "relations"];

const MISPLACED_COUNTERS: [&str; 7] = [
    "n_tag_type_multipolygon",
    "w_tag_type_multipolygon",
    "n_tag_type_boundary",
    "w_tag_type_boundary",
    "n_tag_natural_coastline",
    "r_tag_natural_coastline",
    "r_tag_boundary_multipolygon",
];

struct TagChannels {
    issues: Vec<ChannelId>,
    misplaced: Vec<ChannelId>,
}

impl TagChannels {
    fn create(channels: &mut ChannelSet) -> Result<Self> {
        let issues = TagIssue::ALL
            .iter()
            .map(|issue| channels.add_channel(issue.name()))
            .collect::<geolint_output::Result<Vec<_>>>()?;
        let misplaced = Misplaced::CHANNELS
            .iter()
            .map(|name| channels.add_channel(name))
            .collect::<geolint_output::Result<Vec<_>>>()?;
        Ok(Self { issues, misplaced })
    }
}

/// Classify every tag of every entity in one pass.
pub fn run<S>(source: &S, config: &CheckConfig) -> Result<CheckReport>
where
    S: EntitySource + ?Sized,
{
    tracing::info!(check = CHECK_NAME, cutoff = ?config.cutoff.instant(), "starting check");

    let mut counters = Counters::new();
    for name in KIND_COUNTERS {
        counters.declare(name);
    }
    for issue in TagIssue::ALL {
        counters.declare(issue.name());
    }
    for name in MISPLACED_COUNTERS {
        counters.declare(name);
    }

    let mut channels = ChannelSet::create(&config.output_dir, "geoms-unusual-tags.db")?;
    let ids = TagChannels::create(&mut channels)?;

    let mut tracker = TimestampTracker::new();
    for_each_entity(source, KindMask::ALL, "check tags", |entity| {
        tracker.observe(entity.timestamp());
        if !config.cutoff.admits(entity.timestamp()) {
            return Ok(());
        }
        counters.incr(kind_counter(entity.kind()));

        let mut hit = [false; TagIssue::ALL.len()];
        for (key, value) in entity.tags() {
            for issue in tag_issues(key, value) {
                counters.incr(issue.name());
                hit[issue.index()] = true;
            }
        }
        for issue in TagIssue::ALL {
            if hit[issue.index()] {
                channels.emit(ids.issues[issue.index()], &entity)?;
            }
        }

        for misplaced in misplaced_tags(&entity) {
            if let Some(name) = misplaced.counter(entity.kind()) {
                counters.incr(name);
            }
            channels.emit(ids.misplaced[misplaced.index()], &entity)?;
        }
        Ok::<_, CheckError>(())
    })?;

    report::finish(CHECK_NAME, channels, counters, &tracker, &config.output_dir)
}
