//! Point and linestring geometry for derived features.

use std::fmt::Write as _;

use geolint_model::{Location, NodeRef};
use thiserror::Error;

/// Per-entity geometry failure. Never fatal: the feature is skipped and
/// counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("point {0} has no location")]
    MissingLocation(i64),

    #[error("line needs at least two distinct locations, found {0}")]
    TooFewPoints(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    LineString,
}

impl GeometryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Geometry {
    Point(Location),
    LineString(Vec<Location>),
}

impl Geometry {
    pub fn point(loc: Location) -> Self {
        Geometry::Point(loc)
    }

    /// Linestring through the located references of a line.
    ///
    /// Consecutive repeats are collapsed; the remainder must have at least two
    /// vertices.
    pub fn linestring(refs: &[NodeRef]) -> Result<Self, GeometryError> {
        let mut coords: Vec<Location> = Vec::with_capacity(refs.len());
        for node_ref in refs {
            let loc = node_ref
                .loc
                .ok_or(GeometryError::MissingLocation(node_ref.id))?;
            if coords.last() != Some(&loc) {
                coords.push(loc);
            }
        }
        if coords.len() < 2 {
            return Err(GeometryError::TooFewPoints(coords.len()));
        }
        Ok(Geometry::LineString(coords))
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
        }
    }

    /// Well-known text in degrees, e.g. `POINT(1.5 2)`.
    pub fn to_wkt(&self) -> String {
        let mut out = String::new();
        match self {
            Geometry::Point(loc) => {
                let _ = write!(out, "POINT({} {})", loc.lon(), loc.lat());
            }
            Geometry::LineString(coords) => {
                out.push_str("LINESTRING(");
                for (i, loc) in coords.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{} {}", loc.lon(), loc.lat());
                }
                out.push(')');
            }
        }
        out
    }
}
