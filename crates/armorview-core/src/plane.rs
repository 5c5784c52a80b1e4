use glam::DVec3;

use crate::error::{ArmorCoreError, Result};

/// A plane in `normal · p = d` form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub d: f64,
}

/// The two halves of a polygon split by a plane. Vertices lying on the plane
/// (within the fusion radius) appear in both.
#[derive(Debug, Clone, Default)]
pub struct Cut {
    pub above: Vec<DVec3>,
    pub below: Vec<DVec3>,
}

impl Plane {
    pub fn new(normal: DVec3, d: f64) -> Self {
        Self { normal, d }
    }

    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) - self.d
    }

    /// The coordinate axis with the largest `|normal|` component.
    ///
    /// Dropping that axis yields the largest projected area and the least
    /// numerical noise in 2D work on this plane.
    pub fn best_axis(&self) -> usize {
        let n = self.normal.abs();
        if n.x >= n.y && n.x >= n.z {
            0
        } else if n.y >= n.z {
            1
        } else {
            2
        }
    }

    /// Splits a polygon along the plane.
    ///
    /// Edges crossing the plane are interpolated at the crossing point, which
    /// is inserted into both halves. Either half may come back with fewer
    /// than three vertices, meaning nothing of the polygon lies on that side.
    pub fn cut(&self, polygon: &[DVec3], min_edge: f64) -> Cut {
        let mut cut = Cut::default();
        if polygon.len() < 3 {
            return cut;
        }
        for (i, &p) in polygon.iter().enumerate() {
            let q = polygon[(i + 1) % polygon.len()];
            let dp = self.signed_distance(p);
            let dq = self.signed_distance(q);

            if dp.abs() <= min_edge {
                cut.above.push(p);
                cut.below.push(p);
            } else if dp > 0.0 {
                cut.above.push(p);
            } else {
                cut.below.push(p);
            }

            // Strict crossing: interpolate and hand the point to both sides.
            if dp.abs() > min_edge && dq.abs() > min_edge && (dp > 0.0) != (dq > 0.0) {
                let t = dp / (dp - dq);
                let x = p + (q - p) * t;
                cut.above.push(x);
                cut.below.push(x);
            }
        }
        cut
    }

    /// Lifts a polygon onto the plane by replacing each vertex's `axis`
    /// coordinate with the value the plane equation implies.
    pub fn project(&self, polygon: &[DVec3], axis: usize) -> Result<Vec<DVec3>> {
        if self.normal[axis] == 0.0 {
            return Err(ArmorCoreError::ProjectionAxis { axis });
        }
        Ok(polygon
            .iter()
            .map(|p| {
                let mut q = p.to_array();
                q[axis] = 0.0;
                let rest: f64 = DVec3::from_array(q).dot(self.normal);
                q[axis] = (self.d - rest) / self.normal[axis];
                DVec3::from_array(q)
            })
            .collect())
    }
}
