use armorview_core::polygon::{boundary_distance_sq, signed_area};
use armorview_core::{Tolerances, Triangle};
use futures::executor::block_on;
use glam::DVec2;
use indexmap::IndexMap;

use super::{build_view, expand, keep_all_pieces, smooth};
use crate::model::{Metadata, Model, Piece, PieceId};
use crate::pool::WorkerPool;
use crate::view::{View, ViewPlane};

const TOLERANCE: f64 = 5e-3;

fn square_piece(x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> Piece {
    vec![
        Triangle::from([[x0, y0, z], [x1, y0, z], [x1, y1, z]]),
        Triangle::from([[x0, y0, z], [x1, y1, z], [x0, y1, z]]),
    ]
}

fn model(pieces: Vec<(PieceId, Piece)>) -> Model {
    Model {
        metadata: Metadata { hash: "test".into() },
        pieces: pieces.into_iter().collect::<IndexMap<_, _>>(),
    }
}

fn build(model: &Model, plane: ViewPlane) -> View {
    let pool = WorkerPool::new(1).unwrap();
    block_on(build_view(
        model,
        plane,
        Tolerances::default(),
        &pool,
        &keep_all_pieces(),
    ))
    .unwrap()
}

/// True when the two rings trace the same boundary: every actual vertex
/// sits on the expected perimeter, every expected corner has an actual
/// vertex nearby, and the areas agree.
fn ring_close_to(actual: &[DVec2], expected: &[DVec2], tol: f64) -> bool {
    actual.iter().all(|&p| boundary_distance_sq(expected, p) <= tol * tol)
        && expected
            .iter()
            .all(|&e| actual.iter().any(|&p| p.distance_squared(e) <= tol * tol))
        && (signed_area(actual).abs() - signed_area(expected).abs()).abs()
            <= tol * 4.0 * expected.len() as f64
}

fn bbox(outlines: &[Vec<DVec2>]) -> (DVec2, DVec2) {
    let mut min = DVec2::MAX;
    let mut max = DVec2::MIN;
    for p in outlines.iter().flatten() {
        min = min.min(*p);
        max = max.max(*p);
    }
    (min, max)
}

#[test]
fn single_square_front_view() {
    let model = model(vec![(1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0))]);
    let view = build(&model, ViewPlane::Front);

    assert_eq!(view.len(), 1);
    let outlines = &view[&1];
    assert_eq!(outlines.len(), 1);
    let expected = [
        DVec2::new(1.0, -3.0),
        DVec2::new(3.0, -3.0),
        DVec2::new(3.0, -1.0),
        DVec2::new(1.0, -1.0),
    ];
    assert!(
        ring_close_to(&outlines[0], &expected, TOLERANCE),
        "outline was {:?}",
        outlines[0]
    );
}

#[test]
fn single_triangle_round_trips_to_its_projection() {
    let tri = vec![Triangle::from([[1.0, 1.0, 0.0], [3.0, 1.0, 0.0], [3.0, 3.0, 0.0]])];
    let view = build(&model(vec![(1, tri)]), ViewPlane::Front);

    let expected = [
        DVec2::new(1.0, -1.0),
        DVec2::new(3.0, -1.0),
        DVec2::new(3.0, -3.0),
    ];
    assert_eq!(view[&1].len(), 1);
    assert!(
        ring_close_to(&view[&1][0], &expected, TOLERANCE),
        "outline was {:?}",
        view[&1][0]
    );
}

#[test]
fn sub_threshold_polygons_are_filtered_out() {
    // Area well under the artifact cutoff.
    let speck = vec![Triangle::from([
        [0.0, 0.0, 0.0],
        [0.05, 0.0, 0.0],
        [0.0, 0.05, 0.0],
    ])];
    let view = build(&model(vec![(1, speck)]), ViewPlane::Front);
    assert!(view.get(&1).map_or(true, |o| o.is_empty()));
}

#[test]
fn disjoint_pieces_stay_disjoint() {
    // A hexagonal plate at negative coordinates, fanned into triangles.
    let hex = [
        DVec2::new(-3.0, -5.0),
        DVec2::new(-4.0, -3.3),
        DVec2::new(-6.0, -3.3),
        DVec2::new(-7.0, -5.0),
        DVec2::new(-6.0, -6.7),
        DVec2::new(-4.0, -6.7),
    ];
    let fan: Piece = (1..hex.len() - 1)
        .map(|k| {
            Triangle::from([
                [hex[0].x, hex[0].y, 0.0],
                [hex[k].x, hex[k].y, 0.0],
                [hex[k + 1].x, hex[k + 1].y, 0.0],
            ])
        })
        .collect();
    let model = model(vec![(1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0)), (2, fan)]);
    let view = build(&model, ViewPlane::Front);

    assert_eq!(view.len(), 2);
    let (min1, max1) = bbox(&view[&1]);
    let (min2, max2) = bbox(&view[&2]);
    let disjoint = max1.x < min2.x || max2.x < min1.x || max1.y < min2.y || max2.y < min1.y;
    assert!(disjoint, "piece boxes overlap: {min1:?}..{max1:?} vs {min2:?}..{max2:?}");
}

#[test]
fn fully_occluded_piece_is_absent() {
    let model = model(vec![
        (1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0)),
        (2, square_piece(0.0, 0.0, 4.0, 4.0, 1.0)),
    ]);
    let view = build(&model, ViewPlane::Front);

    assert!(view.get(&1).map_or(true, |o| o.is_empty()));
    let expected = [
        DVec2::new(0.0, -4.0),
        DVec2::new(4.0, -4.0),
        DVec2::new(4.0, 0.0),
        DVec2::new(0.0, 0.0),
    ];
    assert!(ring_close_to(&view[&2][0], &expected, TOLERANCE));
}

#[test]
fn partially_occluded_piece_keeps_the_uncovered_half() {
    let model = model(vec![
        (1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0)),
        (2, square_piece(2.0, 1.0, 3.0, 3.0, 1.0)),
    ]);
    let view = build(&model, ViewPlane::Front);

    let left = [
        DVec2::new(1.0, -3.0),
        DVec2::new(2.0, -3.0),
        DVec2::new(2.0, -1.0),
        DVec2::new(1.0, -1.0),
    ];
    let right = [
        DVec2::new(2.0, -3.0),
        DVec2::new(3.0, -3.0),
        DVec2::new(3.0, -1.0),
        DVec2::new(2.0, -1.0),
    ];
    assert_eq!(view[&1].len(), 1);
    assert!(
        ring_close_to(&view[&1][0], &left, TOLERANCE),
        "left half was {:?}",
        view[&1][0]
    );
    assert!(ring_close_to(&view[&2][0], &right, TOLERANCE));
}

#[test]
fn output_stays_inside_the_inflated_input_bounds() {
    let model = model(vec![(1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0))]);
    let view = build(&model, ViewPlane::Front);
    for p in view[&1].iter().flatten() {
        assert!(p.is_finite());
        assert!(p.x >= 1.0 - 2e-3 && p.x <= 3.0 + 2e-3);
        assert!(p.y >= -3.0 - 2e-3 && p.y <= -1.0 + 2e-3);
    }
}

#[test]
fn generation_is_deterministic() {
    let source = model(vec![
        (1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0)),
        (2, square_piece(2.0, 1.0, 3.0, 3.0, 1.0)),
        (3, square_piece(0.0, 0.0, 1.5, 1.5, 2.0)),
    ]);
    let first = build(&source, ViewPlane::Front);
    let second = build(&source, ViewPlane::Front);
    assert_eq!(first, second);
}

#[test]
fn piece_filter_excludes_ahead_of_occlusion() {
    let source = model(vec![
        (1, square_piece(1.0, 1.0, 3.0, 3.0, 0.0)),
        (2, square_piece(0.0, 0.0, 4.0, 4.0, 1.0)),
    ]);
    let pool = WorkerPool::new(1).unwrap();
    let only_one: super::PieceFilter = std::sync::Arc::new(|id| id == 1);
    let view = block_on(build_view(
        &source,
        ViewPlane::Front,
        Tolerances::default(),
        &pool,
        &only_one,
    ))
    .unwrap();

    // Piece 2 is gone entirely, and without it nothing occludes piece 1.
    assert!(!view.contains_key(&2));
    assert_eq!(view[&1].len(), 1);
}

#[test]
fn top_and_side_views_use_their_axis_mapping() {
    // A plate in the x/z plane, visible from above.
    let top_plate: Piece = vec![
        Triangle::from([[1.0, 0.0, 2.0], [3.0, 0.0, 2.0], [3.0, 0.0, 6.0]]),
        Triangle::from([[1.0, 0.0, 2.0], [3.0, 0.0, 6.0], [1.0, 0.0, 6.0]]),
    ];
    let view = build(&model(vec![(7, top_plate)]), ViewPlane::Top);
    // convert_down(axis = 1) keeps (x, z); top orientation swaps to (z, x).
    let expected = [
        DVec2::new(2.0, 1.0),
        DVec2::new(6.0, 1.0),
        DVec2::new(6.0, 3.0),
        DVec2::new(2.0, 3.0),
    ];
    assert!(ring_close_to(&view[&7][0], &expected, TOLERANCE));
}

#[test]
fn expand_pushes_triangle_corners_outward() {
    let ring = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 2.0),
    ];
    let grown = expand(&ring, 1e-3);
    assert_eq!(grown[0], DVec2::new(-1e-3, -1e-3));
    assert_eq!(grown[1], DVec2::new(2.0 + 1e-3, -1e-3));
    assert_eq!(grown[2], DVec2::new(2.0 + 1e-3, 2.0 + 1e-3));
}

#[test]
fn expand_shifts_edge_vertices_on_one_axis_only() {
    let ring = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 1.0),
        DVec2::new(2.0, 2.0),
        DVec2::new(0.0, 2.0),
    ];
    let grown = expand(&ring, 1e-3);
    // (2, 1) sits in the middle row of the 3×3 grid: only x moves.
    assert_eq!(grown[2], DVec2::new(2.0 + 1e-3, 1.0));
}

#[test]
fn smooth_collapses_tiny_zigzags_and_keeps_real_corners() {
    let eps = 1e-3;
    let ring = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(1.0, 0.0),
        // Zig-zag: two segments in the 1e-4 range.
        DVec2::new(1.0001, 0.00005),
        DVec2::new(1.0002, 0.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 2.0),
        DVec2::new(0.0, 2.0),
    ];
    let smoothed = smooth(&ring, 3, eps * eps);
    assert_eq!(smoothed.len(), 6);
    assert!(!smoothed.contains(&DVec2::new(1.0001, 0.00005)));
    assert!(smoothed.contains(&DVec2::new(2.0, 2.0)));

    // A ring of honest, long edges is untouched.
    let square = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(4.0, 0.0),
        DVec2::new(4.0, 4.0),
        DVec2::new(0.0, 4.0),
    ];
    assert_eq!(smooth(&square, 3, eps * eps), square);
}

#[test]
fn smooth_keeps_chains_at_the_lookahead_length() {
    // Three consecutive sub-epsilon segments: not shorter than the
    // lookahead of 3, so the chain is detail, not an aberration.
    let eps = 1e-3;
    let ring = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(1.0, 0.0),
        DVec2::new(1.0001, 0.00005),
        DVec2::new(1.0002, 0.0),
        DVec2::new(1.0003, 0.00005),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 2.0),
        DVec2::new(0.0, 2.0),
    ];
    assert_eq!(smooth(&ring, 3, eps * eps), ring);
}
