//! Per-piece occlusion: cutting away everything that sits in front of a
//! piece's triangles along the view direction.

use armorview_core::boolean::{self, Region, Ring};
use armorview_core::polygon;
use armorview_core::recovery::{recover, Recovery};
use armorview_core::{Plane, Tolerances, Triangle};
use indexmap::IndexMap;

use crate::model::{Piece, PieceId};
use crate::view::ViewPlane;

/// Rewrites one piece so that only its visible surface remains.
///
/// Every triangle of every piece in `pieces` (including the subject's own
/// other triangles) is treated as a potential occluder: cut to the viewer's
/// side of the subject triangle's plane, squashed onto that plane along the
/// view direction and subtracted in 2D. Surviving fragments replace the
/// subject triangle; iteration continues past them, so fragments are results
/// and never subjects themselves.
pub(crate) fn occlude_piece(
    piece_id: PieceId,
    pieces: &IndexMap<PieceId, Piece>,
    view: ViewPlane,
    tol: &Tolerances,
) -> Piece {
    let view_dir = view.direction();
    let cos_sq = tol.cos_max_angle_sq();
    let min_edge_sq = tol.min_edge_sq();

    let mut tris: Piece = pieces.get(&piece_id).cloned().unwrap_or_default();
    let mut i = 0;
    while i < tris.len() {
        let subject = tris[i];
        let plane = match subject.plane() {
            Ok(p) => p,
            Err(_) => {
                tris.remove(i);
                continue;
            }
        };
        let facing = plane.normal.dot(view_dir);
        // A near-edge-on triangle contributes nothing visible and only
        // destabilizes the boolean work downstream.
        if facing * facing < cos_sq {
            tris.remove(i);
            continue;
        }
        let axis = plane.best_axis();

        let outline = polygon::fuse2(&polygon::convert_down(subject.points(), axis), min_edge_sq);
        if outline.len() < 3 {
            tris.remove(i);
            continue;
        }

        let occluders = collect_occluders(&tris, i, piece_id, pieces, &plane, facing, view, axis, tol);
        let regions = subtract(outline, occluders, tol);

        let mut replacement: Piece = Vec::new();
        for region in &regions {
            match lift(region, &plane, axis, tol) {
                Ok(fragments) => replacement.extend(fragments),
                Err(err) => {
                    tracing::warn!(piece = piece_id, %err, "dropping untriangulable fragment");
                }
            }
        }

        let inserted = replacement.len();
        tris.splice(i..i + 1, replacement);
        i += inserted;
    }
    tris
}

/// Gathers the 2D shadows all other triangles cast onto the subject plane.
#[allow(clippy::too_many_arguments)]
fn collect_occluders(
    current: &[Triangle],
    subject_index: usize,
    subject_piece: PieceId,
    pieces: &IndexMap<PieceId, Piece>,
    plane: &Plane,
    facing: f64,
    view: ViewPlane,
    axis: usize,
    tol: &Tolerances,
) -> Vec<Ring> {
    let view_dir = view.direction();
    let cos_sq = tol.cos_max_angle_sq();
    let min_edge_sq = tol.min_edge_sq();

    let mut occluders = Vec::new();
    for (pid, piece) in pieces {
        // The subject piece is read from the working copy, which already
        // carries this pass's reductions.
        let source: &[Triangle] = if *pid == subject_piece { current } else { piece };
        for (j, other) in source.iter().enumerate() {
            if *pid == subject_piece && j == subject_index {
                continue;
            }
            let Ok(other_normal) = other.normal() else {
                continue;
            };
            let other_facing = other_normal.dot(view_dir);
            if other_facing * other_facing < cos_sq {
                continue;
            }

            // Keep the half on the viewer's side of the subject plane.
            let cut = plane.cut(other.points(), tol.min_edge);
            let half = if facing > 0.0 { cut.above } else { cut.below };
            if half.len() < 3 {
                continue;
            }
            let Ok(squashed) = plane.project(&half, view.axis()) else {
                continue;
            };
            let ring = polygon::fuse2(&polygon::convert_down(&squashed, axis), min_edge_sq);
            if ring.len() >= 3 {
                occluders.push(ring);
            }
        }
    }
    occluders
}

/// Subtracts every occluder from the subject outline, recovering from
/// boolean degeneracies until the retry budget runs out.
fn subtract(outline: Ring, occluders: Vec<Ring>, tol: &Tolerances) -> Vec<Region> {
    let mut regions = vec![Region::ring(outline)];
    let mut pending = occluders;
    let mut retries = tol.max_retries;

    loop {
        let mut faulted: Vec<Ring> = Vec::new();
        for occluder in pending.drain(..) {
            // Once nothing of the subject is left, the rest cannot matter.
            if regions.is_empty() {
                return regions;
            }
            match boolean::difference(&regions, &[Region::ring(occluder.clone())], tol.min_edge) {
                Ok(remaining) => regions = remaining,
                Err(fault) => {
                    tracing::debug!(%fault, "deferring occluder for recovery");
                    faulted.push(occluder);
                }
            }
        }
        if faulted.is_empty() || regions.is_empty() {
            return regions;
        }
        if retries == 0 {
            tracing::warn!(
                dropped = faulted.len(),
                "degeneracy persisted past the retry budget; ignoring offending occluders"
            );
            return regions;
        }
        retries -= 1;

        // Re-intersect each surviving region with each offending occluder by
        // hand; the split components take both sides' places in the retry.
        let mut refined: Vec<Ring> = Vec::new();
        for occluder in faulted {
            let mut survivors: Vec<Region> = Vec::new();
            for region in regions.drain(..) {
                match recover(&region.exterior, &occluder, tol.min_edge) {
                    Recovery::Identical => {
                        // The occluder is the region itself: fully covered.
                    }
                    Recovery::Split { subject, clip } => {
                        survivors.extend(subject.into_iter().map(Region::ring));
                        refined.extend(clip);
                    }
                }
                // Holes already punched out of the region go back in as
                // plain occluders for the retry.
                refined.extend(region.holes);
            }
            regions = survivors;
        }
        pending = refined;
    }
}

/// Lifts a surviving 2D region back onto the subject plane as triangles.
fn lift(
    region: &Region,
    plane: &Plane,
    axis: usize,
    tol: &Tolerances,
) -> armorview_core::Result<Vec<Triangle>> {
    let indices = polygon::triangulate(&region.exterior, &region.holes)?;
    let flat: Vec<_> = region
        .exterior
        .iter()
        .chain(region.holes.iter().flatten())
        .copied()
        .collect();
    let lifted = plane.project(&polygon::convert_up(&flat, axis), axis)?;
    Ok(indices
        .into_iter()
        .filter_map(|[a, b, c]| {
            Triangle::new(lifted[a], lifted[b], lifted[c]).fused(tol.min_edge_sq())
        })
        .collect())
}
