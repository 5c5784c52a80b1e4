//! Wrapper around the 2D polygon boolean.
//!
//! `geo`'s `BooleanOps` panics on near-coincident vertex configurations
//! (georust/geo#913). We run every call under `catch_unwind` and surface the
//! panic as a typed [`BooleanFault`], so callers can route it into the
//! degeneracy-recovery path instead of crashing the generation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use glam::DVec2;
use thiserror::Error;

use crate::polygon::{fuse2, signed_area};

/// A simple 2D ring, open form (no repeated closing vertex).
pub type Ring = Vec<DVec2>;

/// A region: an exterior ring plus any holes punched out of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Region {
    pub fn ring(exterior: Ring) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Every ring of the region, exterior first.
    pub fn outlines(self) -> impl Iterator<Item = Ring> {
        std::iter::once(self.exterior).chain(self.holes)
    }
}

#[derive(Error, Debug, Clone)]
pub enum BooleanFault {
    #[error("polygon boolean hit a degenerate configuration: {0}")]
    Degeneracy(String),
}

pub type BooleanResult = std::result::Result<Vec<Region>, BooleanFault>;

/// `a ∪ b` over region sets.
pub fn union(a: &[Region], b: &[Region], epsilon: f64) -> BooleanResult {
    let lhs = to_geo(a, epsilon);
    let rhs = to_geo(b, epsilon);
    if lhs.0.is_empty() {
        return Ok(from_geo(rhs));
    }
    if rhs.0.is_empty() {
        return Ok(from_geo(lhs));
    }
    guarded(move || lhs.union(&rhs))
}

/// `subject − clip` over region sets.
pub fn difference(subject: &[Region], clip: &[Region], epsilon: f64) -> BooleanResult {
    let lhs = to_geo(subject, epsilon);
    let rhs = to_geo(clip, epsilon);
    if lhs.0.is_empty() || rhs.0.is_empty() {
        return Ok(from_geo(lhs));
    }
    guarded(move || lhs.difference(&rhs))
}

fn guarded<F>(op: F) -> BooleanResult
where
    F: FnOnce() -> MultiPolygon<f64>,
{
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => Ok(from_geo(result)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(BooleanFault::Degeneracy(message))
        }
    }
}

fn to_geo(regions: &[Region], epsilon: f64) -> MultiPolygon<f64> {
    let eps_sq = epsilon * epsilon;
    let polygons = regions
        .iter()
        .filter_map(|region| {
            let exterior = oriented(fuse2(&region.exterior, eps_sq), true)?;
            let holes = region
                .holes
                .iter()
                .filter_map(|hole| oriented(fuse2(hole, eps_sq), false))
                .collect();
            Some(Polygon::new(exterior, holes))
        })
        .collect();
    MultiPolygon::new(polygons)
}

// Exteriors CCW, holes CW. Rings that fused below three vertices vanish.
fn oriented(mut ring: Ring, ccw: bool) -> Option<LineString<f64>> {
    if ring.len() < 3 {
        return None;
    }
    if (signed_area(&ring) > 0.0) != ccw {
        ring.reverse();
    }
    Some(LineString::new(
        ring.into_iter().map(|p| Coord { x: p.x, y: p.y }).collect(),
    ))
}

fn from_geo(mp: MultiPolygon<f64>) -> Vec<Region> {
    mp.0.into_iter()
        .map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            Region {
                exterior: open_ring(exterior),
                holes: interiors.into_iter().map(open_ring).collect(),
            }
        })
        .filter(|region| region.exterior.len() >= 3)
        .collect()
}

// geo closes rings with a repeated first vertex; our rings are open.
fn open_ring(line: LineString<f64>) -> Ring {
    let mut ring: Ring = line.0.into_iter().map(|c| DVec2::new(c.x, c.y)).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}
