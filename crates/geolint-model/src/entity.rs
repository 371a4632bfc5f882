//! Entity data model.
//!
//! The input is a stream of three entity kinds linked by integer id
//! references:
//!
//! - [`Point`]: a tagged location
//! - [`Line`]: an ordered list of point references
//! - [`Group`]: an ordered list of typed, role-carrying members
//!
//! Ids are signed (test and historical data may use negative ids). Every
//! index in this workspace keys on [`positive_id`] instead.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Tag set of an entity. Keys are unique per entity.
pub type Tags = BTreeMap<String, String>;

/// Canonical index key for a signed entity id.
pub fn positive_id(id: i64) -> u64 {
    id.unsigned_abs()
}

/// True if `tags` contains `key` with exactly `value`.
pub fn has_tag(tags: &Tags, key: &str, value: &str) -> bool {
    tags.get(key).map(String::as_str) == Some(value)
}

// ============================================================================
// Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Point,
    Line,
    Group,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Point, EntityKind::Line, EntityKind::Group];

    /// Dense index (0..3), used by per-kind arrays.
    pub const fn index(self) -> usize {
        match self {
            EntityKind::Point => 0,
            EntityKind::Line => 1,
            EntityKind::Group => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Point => "point",
            EntityKind::Line => "line",
            EntityKind::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask of entity kinds a pass wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindMask(u8);

impl KindMask {
    pub const NONE: KindMask = KindMask(0);
    pub const POINT: KindMask = KindMask(1);
    pub const LINE: KindMask = KindMask(1 << 1);
    pub const GROUP: KindMask = KindMask(1 << 2);
    pub const ALL: KindMask = KindMask(0b111);

    pub const fn of(kind: EntityKind) -> Self {
        KindMask(1 << kind.index())
    }

    pub const fn contains(self, kind: EntityKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for KindMask {
    type Output = KindMask;

    fn bitor(self, rhs: KindMask) -> KindMask {
        KindMask(self.0 | rhs.0)
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Number of fixed-precision units per degree.
pub const COORDINATE_PRECISION: i32 = 10_000_000;

/// Fixed-precision coordinate pair. Ordered by `x`, then `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn lon(self) -> f64 {
        f64::from(self.x) / f64::from(COORDINATE_PRECISION)
    }

    pub fn lat(self) -> f64 {
        f64::from(self.y) / f64::from(COORDINATE_PRECISION)
    }
}

impl From<(i32, i32)> for Location {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Location> for (i32, i32) {
    fn from(loc: Location) -> Self {
        (loc.x, loc.y)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: i64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    pub loc: Location,
}

/// Reference from a line to a point, optionally carrying the point's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

impl NodeRef {
    pub const fn new(id: i64) -> Self {
        Self { id, loc: None }
    }

    pub const fn located(id: i64, loc: Location) -> Self {
        Self { id, loc: Some(loc) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: i64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    #[serde(default)]
    pub refs: Vec<NodeRef>,
}

impl Line {
    /// A line is closed when its first and last reference name the same point.
    pub fn is_closed(&self) -> bool {
        match (self.refs.first(), self.refs.last()) {
            (Some(first), Some(last)) => first.id == last.id,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub kind: EntityKind,
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

impl Member {
    pub fn new(kind: EntityKind, id: i64, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }

    pub fn positive_id(&self) -> u64 {
        positive_id(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// One record of the input stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Point(Point),
    Line(Line),
    Group(Group),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Point(_) => EntityKind::Point,
            Entity::Line(_) => EntityKind::Line,
            Entity::Group(_) => EntityKind::Group,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Entity::Point(p) => p.id,
            Entity::Line(l) => l.id,
            Entity::Group(g) => g.id,
        }
    }

    pub fn positive_id(&self) -> u64 {
        positive_id(self.id())
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Entity::Point(p) => p.timestamp,
            Entity::Line(l) => l.timestamp,
            Entity::Group(g) => g.timestamp,
        }
    }

    pub fn tags(&self) -> &Tags {
        match self {
            Entity::Point(p) => &p.tags,
            Entity::Line(l) => &l.tags,
            Entity::Group(g) => &g.tags,
        }
    }
}

impl From<Point> for Entity {
    fn from(p: Point) -> Self {
        Entity::Point(p)
    }
}

impl From<Line> for Entity {
    fn from(l: Line) -> Self {
        Entity::Line(l)
    }
}

impl From<Group> for Entity {
    fn from(g: Group) -> Self {
        Entity::Group(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    #[test]
    fn positive_id_folds_negative_ids() {
        assert_eq!(positive_id(-17), 17);
        assert_eq!(positive_id(17), 17);
        assert_eq!(positive_id(i64::MIN), 1u64 << 63);
    }

    #[test]
    fn kind_mask_contains() {
        let mask = KindMask::LINE | KindMask::GROUP;
        assert!(!mask.contains(EntityKind::Point));
        assert!(mask.contains(EntityKind::Line));
        assert!(mask.contains(EntityKind::Group));
        assert!(KindMask::NONE.is_empty());
        assert_eq!(KindMask::of(EntityKind::Point), KindMask::POINT);
    }

    #[test]
    fn closed_line_needs_matching_ends() {
        let ts = parse_timestamp("2020-01-01T00:00:00Z").unwrap();
        let mut line = Line {
            id: 1,
            timestamp: ts,
            tags: Tags::new(),
            refs: vec![NodeRef::new(1), NodeRef::new(2), NodeRef::new(1)],
        };
        assert!(line.is_closed());
        line.refs.pop();
        assert!(!line.is_closed());
        line.refs.clear();
        assert!(!line.is_closed());
    }

    #[test]
    fn entity_json_shape() {
        let json = r#"{"type":"group","id":-5,"timestamp":"2020-01-01T00:00:00Z","tags":{"type":"multipolygon"},"members":[{"kind":"line","id":3,"role":"outer"},{"kind":"point","id":4}]}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind(), EntityKind::Group);
        assert_eq!(entity.positive_id(), 5);
        let Entity::Group(group) = entity else {
            panic!("expected group");
        };
        assert_eq!(group.members[0].role, "outer");
        assert_eq!(group.members[1].role, "");
        assert!(has_tag(&group.tags, "type", "multipolygon"));
    }

    #[test]
    fn location_serializes_as_pair() {
        let point = Point {
            id: 1,
            timestamp: parse_timestamp("2020-01-01T00:00:00Z").unwrap(),
            tags: Tags::new(),
            loc: Location::new(10, 20),
        };
        let json = serde_json::to_string(&Entity::Point(point)).unwrap();
        assert!(json.contains(r#""loc":[10,20]"#), "{json}");
        assert!(!json.contains("tags"));
    }
}
