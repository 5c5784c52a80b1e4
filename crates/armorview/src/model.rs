//! The armor source model and its wire format.
//!
//! A source file is `{ "metadata": { "hash": … }, "armor": { "<piece_id>":
//! [triangles…] } }`; triangles are `[[x,y,z],[x,y,z],[x,y,z]]`. The hash is
//! an opaque fingerprint of the source, compared case-insensitively and used
//! only for cache validation.

use armorview_core::Triangle;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier of one named armor plate, preserved through every stage.
pub type PieceId = u64;

/// All triangles of one armor plate.
pub type Piece = Vec<Triangle>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub metadata: Metadata,
    #[serde(rename = "armor")]
    pub pieces: IndexMap<PieceId, Piece>,
}
