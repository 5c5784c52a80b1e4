//! The view builder: turns a raw armor model into a finished 2D silhouette.
//!
//! Pipeline: grid snap → per-piece occlusion on the worker pool → drop the
//! view axis → per-piece union with seam expansion → smoothing and artifact
//! filtering → display orientation.

use std::sync::Arc;

use armorview_core::boolean::{self, Region, Ring};
use armorview_core::{grid, polygon, Tolerances};
use futures::stream::{FuturesUnordered, StreamExt};
use glam::DVec2;
use indexmap::IndexMap;

use crate::error::Result;
use crate::model::{Model, Piece, PieceId};
use crate::occlude::occlude_piece;
use crate::pool::WorkerPool;
use crate::view::{Outline, View, ViewPlane};

/// Decides which pieces take part in a view at all, ahead of occlusion.
///
/// The default keeps everything; installing a filter is how callers exclude
/// plating that should not cast shadows (torpedo bulges and the like).
pub type PieceFilter = Arc<dyn Fn(PieceId) -> bool + Send + Sync>;

pub(crate) fn keep_all_pieces() -> PieceFilter {
    Arc::new(|_| true)
}

pub(crate) async fn build_view(
    model: &Model,
    plane: ViewPlane,
    tol: Tolerances,
    pool: &WorkerPool,
    filter: &PieceFilter,
) -> Result<View> {
    let min_edge_sq = tol.min_edge_sq();
    let filter = filter.as_ref();

    // Snap everything onto the grid first; this shared alignment is what
    // keeps the boolean work downstream stable.
    let mut working: IndexMap<PieceId, Piece> = IndexMap::with_capacity(model.pieces.len());
    for (&id, piece) in &model.pieces {
        if !filter(id) {
            tracing::debug!(piece = id, "piece excluded ahead of occlusion");
            continue;
        }
        let snapped = piece
            .iter()
            .map(|t| grid::snap_triangle(t, tol.precision))
            .filter_map(|t| t.fused(min_edge_sq))
            .collect();
        working.insert(id, snapped);
    }

    occlude_all(&mut working, plane, tol, pool).await?;

    let mut view = View::new();
    for (id, piece) in &working {
        let regions = assemble_piece(piece, plane.axis(), &tol);
        let mut outlines: Vec<Outline> = Vec::new();
        for region in regions {
            for ring in region.outlines() {
                let smoothed = smooth(&ring, tol.lookahead, tol.smooth_epsilon);
                if smoothed.len() < 3 {
                    continue;
                }
                if polygon::signed_area(&smoothed).abs() < tol.min_area {
                    continue;
                }
                outlines.push(smoothed.into_iter().map(|p| plane.orient(p)).collect());
            }
        }
        if !outlines.is_empty() {
            view.insert(*id, outlines);
        }
    }
    Ok(view)
}

/// Fans piece occlusion out over the pool, keeping one task per worker in
/// flight. Each task runs against the model as it stood at its dispatch:
/// completions are written back before the next dispatch, so later pieces
/// see the reductions of earlier ones but never those of running peers.
async fn occlude_all(
    working: &mut IndexMap<PieceId, Piece>,
    plane: ViewPlane,
    tol: Tolerances,
    pool: &WorkerPool,
) -> Result<()> {
    let mut queue = working.keys().copied().collect::<Vec<_>>().into_iter();
    let mut in_flight = FuturesUnordered::new();
    loop {
        while in_flight.len() < pool.workers() {
            let Some(id) = queue.next() else {
                break;
            };
            let snapshot = Arc::new(working.clone());
            in_flight.push(pool.submit(move || (id, occlude_piece(id, &snapshot, plane, &tol))));
        }
        match in_flight.next().await {
            Some(completion) => {
                let (id, piece) = completion?;
                working.insert(id, piece);
            }
            None => return Ok(()),
        }
    }
}

/// Unions one occluded piece's triangles into display regions.
fn assemble_piece(piece: &Piece, axis: usize, tol: &Tolerances) -> Vec<Region> {
    let mut acc: Vec<Region> = Vec::new();
    for tri in piece {
        let flat = polygon::convert_down(tri.points(), axis);
        let ring = polygon::fuse2(&grid::snap_ring(&flat, tol.precision), tol.min_edge_sq());
        if ring.len() < 3 {
            continue;
        }
        let grown = expand(&ring, tol.precision);
        match boolean::union(&acc, &[Region::ring(grown.clone())], tol.min_edge) {
            Ok(merged) => acc = merged,
            Err(fault) => {
                tracing::debug!(%fault, "union degeneracy; re-snapping the accumulated result");
                acc = resnap(acc, tol);
                match boolean::union(&acc, &[Region::ring(grown)], tol.min_edge) {
                    Ok(merged) => acc = merged,
                    Err(fault) => {
                        tracing::warn!(%fault, "dropping triangle after repeated union degeneracy");
                    }
                }
            }
        }
    }
    acc
}

fn resnap(regions: Vec<Region>, tol: &Tolerances) -> Vec<Region> {
    regions
        .into_iter()
        .filter_map(|region| {
            let exterior = polygon::fuse2(
                &grid::snap_ring(&region.exterior, tol.precision),
                tol.min_edge_sq(),
            );
            if exterior.len() < 3 {
                return None;
            }
            let holes = region
                .holes
                .iter()
                .map(|h| polygon::fuse2(&grid::snap_ring(h, tol.precision), tol.min_edge_sq()))
                .filter(|h| h.len() >= 3)
                .collect();
            Some(Region { exterior, holes })
        })
        .collect()
}

/// Grows a snapped triangle microscopically so the sub-precision seams
/// occlusion leaves behind close up during the union.
///
/// The bounding box is cut into a 3×3 grid: vertices in the outer cells move
/// outward by one precision step on the axes they are extreme on, corner
/// cells on both, the center cell not at all.
fn expand(ring: &[DVec2], precision: f64) -> Ring {
    let min = ring.iter().fold(DVec2::MAX, |m, p| m.min(*p));
    let max = ring.iter().fold(DVec2::MIN, |m, p| m.max(*p));
    let third = (max - min) / 3.0;
    let left = min.x + third.x;
    let right = max.x - third.x;
    let bottom = min.y + third.y;
    let top = max.y - third.y;
    ring.iter()
        .map(|p| {
            let mut q = *p;
            if p.x < left {
                q.x -= precision;
            } else if p.x > right {
                q.x += precision;
            }
            if p.y < bottom {
                q.y -= precision;
            } else if p.y > top {
                q.y += precision;
            }
            q
        })
        .collect()
}

/// Collapses short zig-zag chains left along expansion seams: a run of at
/// least two but fewer than `lookahead` consecutive segments, each shorter
/// than the smoothing epsilon, is replaced by a single edge between its
/// endpoints. Longer runs of small segments are genuine detail and survive.
fn smooth(ring: &[DVec2], lookahead: usize, epsilon_sq: f64) -> Ring {
    let n = ring.len();
    if n < 4 || lookahead < 2 {
        return ring.to_vec();
    }
    let mut keep = vec![true; n];
    let mut i = 0;
    while i < n {
        let mut run = 0;
        while run < n {
            let a = ring[(i + run) % n];
            let b = ring[(i + run + 1) % n];
            if a.distance_squared(b) <= epsilon_sq {
                run += 1;
            } else {
                break;
            }
        }
        if (2..lookahead).contains(&run) {
            for k in 1..run {
                keep[(i + k) % n] = false;
            }
        }
        i += run.max(1);
    }
    ring.iter()
        .zip(&keep)
        .filter_map(|(p, &kept)| kept.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests;
