use glam::{DVec2, DVec3};
use indexmap::IndexMap;
use strum::{Display, EnumIter, EnumString};

use crate::model::PieceId;

/// A single output ring, already oriented for display.
pub type Outline = Vec<DVec2>;

/// The finished silhouette: every visible piece mapped to its outlines.
///
/// A fully occluded piece is absent. A piece broken apart by occlusion
/// contributes several outlines.
pub type View = IndexMap<PieceId, Vec<Outline>>;

/// One of the three orthogonal silhouette directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ViewPlane {
    Front,
    Top,
    Side,
}

impl ViewPlane {
    pub const ALL: [ViewPlane; 3] = [ViewPlane::Front, ViewPlane::Top, ViewPlane::Side];

    /// The coordinate axis dropped when flattening along this view.
    pub fn axis(self) -> usize {
        match self {
            ViewPlane::Front => 2,
            ViewPlane::Top => 1,
            ViewPlane::Side => 0,
        }
    }

    /// Unit view direction. Geometry with a larger coordinate along this
    /// direction sits closer to the viewer.
    pub fn direction(self) -> DVec3 {
        match self {
            ViewPlane::Front => DVec3::Z,
            ViewPlane::Top => DVec3::Y,
            ViewPlane::Side => DVec3::X,
        }
    }

    /// The per-view 2D flip that puts the silhouette the right way up for
    /// display.
    pub fn orient(self, p: DVec2) -> DVec2 {
        match self {
            ViewPlane::Front => DVec2::new(p.x, -p.y),
            ViewPlane::Top => DVec2::new(p.y, p.x),
            ViewPlane::Side => DVec2::new(p.y, -p.x),
        }
    }
}
