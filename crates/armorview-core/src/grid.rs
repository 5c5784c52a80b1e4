//! Grid snapping. Rounding every coordinate to a multiple of the precision
//! step is what keeps the downstream boolean operations stable.

use glam::{DVec2, DVec3};

use crate::mesh::Triangle;

pub fn snap(value: f64, precision: f64) -> f64 {
    (value / precision).round() * precision
}

pub fn snap2(p: DVec2, precision: f64) -> DVec2 {
    DVec2::new(snap(p.x, precision), snap(p.y, precision))
}

pub fn snap3(p: DVec3, precision: f64) -> DVec3 {
    DVec3::new(
        snap(p.x, precision),
        snap(p.y, precision),
        snap(p.z, precision),
    )
}

pub fn snap_triangle(tri: &Triangle, precision: f64) -> Triangle {
    Triangle(tri.0.map(|p| snap3(p, precision)))
}

pub fn snap_ring(ring: &[DVec2], precision: f64) -> Vec<DVec2> {
    ring.iter().map(|&p| snap2(p, precision)).collect()
}
