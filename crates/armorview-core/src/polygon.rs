//! 2D/3D polygon helpers: axis drop/insert, vertex fusion, area, containment
//! and triangulation.

use glam::{DVec2, DVec3};

use crate::error::{ArmorCoreError, Result};

/// Drops the `axis` coordinate, keeping the remaining two in order.
pub fn convert_down(polygon: &[DVec3], axis: usize) -> Vec<DVec2> {
    polygon
        .iter()
        .map(|p| match axis {
            0 => DVec2::new(p.y, p.z),
            1 => DVec2::new(p.x, p.z),
            _ => DVec2::new(p.x, p.y),
        })
        .collect()
}

/// Re-inserts the `axis` coordinate as zero.
pub fn convert_up(polygon: &[DVec2], axis: usize) -> Vec<DVec3> {
    polygon
        .iter()
        .map(|p| match axis {
            0 => DVec3::new(0.0, p.x, p.y),
            1 => DVec3::new(p.x, 0.0, p.y),
            _ => DVec3::new(p.x, p.y, 0.0),
        })
        .collect()
}

/// Collapses consecutive ring vertices closer than `min_dist_sq` (squared
/// metric), including the wrap-around pair.
pub fn fuse2(ring: &[DVec2], min_dist_sq: f64) -> Vec<DVec2> {
    let mut out: Vec<DVec2> = Vec::with_capacity(ring.len());
    for &p in ring {
        match out.last() {
            Some(last) if last.distance_squared(p) < min_dist_sq => {}
            _ => out.push(p),
        }
    }
    while out.len() > 1 {
        let first = out[0];
        let last = *out.last().unwrap();
        if first.distance_squared(last) < min_dist_sq {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Ring variant of [`Triangle::fused`](crate::mesh::Triangle::fused) for 3D
/// polygons.
pub fn fuse3(ring: &[DVec3], min_dist_sq: f64) -> Vec<DVec3> {
    let mut out: Vec<DVec3> = Vec::with_capacity(ring.len());
    for &p in ring {
        match out.last() {
            Some(last) if last.distance_squared(p) < min_dist_sq => {}
            _ => out.push(p),
        }
    }
    while out.len() > 1 {
        let first = out[0];
        let last = *out.last().unwrap();
        if first.distance_squared(last) < min_dist_sq {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Shoelace signed area. Positive for counter-clockwise rings.
pub fn signed_area(ring: &[DVec2]) -> f64 {
    let mut area = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = ring[(i + 1) % ring.len()];
        area += p.x * q.y - q.x * p.y;
    }
    area / 2.0
}

/// Even-odd containment test. Boundary points are unspecified; callers that
/// care test boundary proximity separately.
pub fn contains(ring: &[DVec2], p: DVec2) -> bool {
    let mut inside = false;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Squared distance from `p` to the segment `a..b`.
pub fn segment_distance_sq(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

/// Squared distance from `p` to the closest point on the ring's boundary.
pub fn boundary_distance_sq(ring: &[DVec2], p: DVec2) -> f64 {
    let mut best = f64::INFINITY;
    for (i, &a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        best = best.min(segment_distance_sq(p, a, b));
    }
    best
}

/// Ear-clip triangulation of a region given as an exterior ring plus holes.
///
/// Returns index triples into the concatenation `exterior ++ holes[0] ++ …`,
/// so callers can triangulate a parallel vertex list (for example the 3D
/// positions the 2D ring was lowered from).
pub fn triangulate(exterior: &[DVec2], holes: &[Vec<DVec2>]) -> Result<Vec<[usize; 3]>> {
    let mut data = Vec::with_capacity((exterior.len() + holes.iter().map(Vec::len).sum::<usize>()) * 2);
    let mut hole_indices = Vec::with_capacity(holes.len());
    for p in exterior {
        data.push(p.x);
        data.push(p.y);
    }
    for hole in holes {
        hole_indices.push(data.len() / 2);
        for p in hole {
            data.push(p.x);
            data.push(p.y);
        }
    }
    let indices = earcutr::earcut(&data, &hole_indices, 2)
        .map_err(|e| ArmorCoreError::Triangulation(format!("{e:?}")))?;
    Ok(indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}
