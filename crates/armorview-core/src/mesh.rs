use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{ArmorCoreError, Result};
use crate::plane::Plane;

/// One armor triangle. The wire shape is `[[x,y,z],[x,y,z],[x,y,z]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle(pub [DVec3; 3]);

impl Triangle {
    pub fn new(a: DVec3, b: DVec3, c: DVec3) -> Self {
        Self([a, b, c])
    }

    pub fn points(&self) -> &[DVec3; 3] {
        &self.0
    }

    /// Unit normal, by the right-hand rule over the vertex order.
    pub fn normal(&self) -> Result<DVec3> {
        let [a, b, c] = self.0;
        let n = (b - a).cross(c - a);
        if n.length_squared() == 0.0 {
            return Err(ArmorCoreError::DegenerateTriangle);
        }
        Ok(n.normalize())
    }

    /// The supporting plane, `normal · p = d` with `d = normal · a`.
    pub fn plane(&self) -> Result<Plane> {
        let normal = self.normal()?;
        Ok(Plane::new(normal, normal.dot(self.0[0])))
    }

    /// Collapses vertices closer than `min_dist_sq` (squared metric).
    ///
    /// Returns `None` when fewer than three distinct vertices remain; such a
    /// triangle carries no area worth keeping.
    pub fn fused(&self, min_dist_sq: f64) -> Option<Triangle> {
        let [a, b, c] = self.0;
        if a.distance_squared(b) < min_dist_sq
            || b.distance_squared(c) < min_dist_sq
            || c.distance_squared(a) < min_dist_sq
        {
            return None;
        }
        Some(*self)
    }
}

impl From<[[f64; 3]; 3]> for Triangle {
    fn from(points: [[f64; 3]; 3]) -> Self {
        Self(points.map(DVec3::from_array))
    }
}
