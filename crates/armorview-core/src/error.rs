use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArmorCoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArmorCoreError {
    #[error("Failed to compute normal of degenerate triangle")]
    DegenerateTriangle,

    #[error("Failed to triangulate ring: {0}")]
    Triangulation(String),

    #[error("Projection axis {axis} is perpendicular to the target plane")]
    ProjectionAxis { axis: usize },
}
