//! Numeric tunables shared by the kernel, the occluder and the view builder.

/// Tolerances controlling grid snapping, vertex fusion and artifact
/// filtering.
///
/// The defaults are the values the pipeline was calibrated with; the
/// smoothing knobs are heuristics and deliberately not frozen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Grid step. Every coordinate is snapped to a multiple of this before
    /// boolean work.
    pub precision: f64,
    /// Fusion radius. Vertices closer than this (squared metric) collapse
    /// into one.
    pub min_edge: f64,
    /// Angle between a triangle normal and the view direction beyond which
    /// the triangle is treated as invisible, in degrees.
    pub max_angle_deg: f64,
    /// Output polygons with less absolute signed area than this are
    /// discarded as artifacts.
    pub min_area: f64,
    /// How many degeneracy-recovery passes a single subtraction may take.
    pub max_retries: u32,
    /// Smoothing window: the longest zig-zag chain the post-union pass will
    /// collapse.
    pub lookahead: usize,
    /// Squared segment length below which a zig-zag segment is considered
    /// aberrant. Defaults to `precision²`.
    pub smooth_epsilon: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        let precision = 1e-3;
        Self {
            precision,
            min_edge: 1e-6,
            max_angle_deg: 89.5,
            min_area: 5e-3,
            max_retries: 3,
            lookahead: 3,
            smooth_epsilon: precision * precision,
        }
    }
}

impl Tolerances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_min_edge(mut self, min_edge: f64) -> Self {
        self.min_edge = min_edge;
        self
    }

    pub fn with_max_angle_deg(mut self, max_angle_deg: f64) -> Self {
        self.max_angle_deg = max_angle_deg;
        self
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_smooth_epsilon(mut self, smooth_epsilon: f64) -> Self {
        self.smooth_epsilon = smooth_epsilon;
        self
    }

    /// Squared fusion radius, the metric `fuse` compares against.
    pub fn min_edge_sq(&self) -> f64 {
        self.min_edge * self.min_edge
    }

    /// Squared cosine of the perpendicularity cutoff.
    ///
    /// A triangle is visible along a view direction `v` iff
    /// `(normal · v)² >= cos²(max_angle)`.
    pub fn cos_max_angle_sq(&self) -> f64 {
        let c = self.max_angle_deg.to_radians().cos();
        c * c
    }
}
