//! Fallback intersection machinery for boolean degeneracies.
//!
//! When the polygon boolean faults on a near-coincident configuration, this
//! module rebuilds the intersection structure of the two rings by hand:
//! every edge pair is intersected explicitly, crossings are labeled
//! entry/exit by walking each ring against the other, entry/exit pairs
//! closer than the fusion radius are welded together, and both rings are
//! split at the welds. The caller retries the boolean on the split
//! components, which no longer contain the offending configuration.

use glam::DVec2;

use crate::boolean::Ring;
use crate::polygon::{boundary_distance_sq, contains, fuse2};

/// Outcome of a recovery pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// The rings were re-intersected and split; retry the boolean with these
    /// components.
    Split {
        subject: Vec<Ring>,
        clip: Vec<Ring>,
    },
    /// Subject and clip have no unshared edge: they are the same ring.
    Identical,
}

#[derive(Debug, Clone)]
struct Node {
    pos: DVec2,
    intersection: bool,
    partner: Option<usize>,
    entry: bool,
    exit: bool,
    fused: bool,
}

impl Node {
    fn vertex(pos: DVec2) -> Self {
        Self {
            pos,
            intersection: false,
            partner: None,
            entry: false,
            exit: false,
            fused: false,
        }
    }

    fn crossing(pos: DVec2) -> Self {
        Self {
            intersection: true,
            ..Self::vertex(pos)
        }
    }
}

/// Which side of the other ring an edge (midpoint) lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Inside,
    Outside,
    /// Coincident with the other ring's boundary (exact-coincidence scale,
    /// far below the fusion radius).
    On,
}

pub fn recover(subject: &[DVec2], clip: &[DVec2], min_edge: f64) -> Recovery {
    if subject.len() < 3 || clip.len() < 3 {
        return Recovery::Split {
            subject: components_of(&[subject.to_vec()]),
            clip: components_of(&[clip.to_vec()]),
        };
    }

    let (mut s_nodes, mut c_nodes) = interconnect(subject, clip, min_edge);

    let s_sides = edge_sides(&s_nodes, &c_nodes, min_edge);
    if s_sides.iter().all(|&s| s == Side::On) {
        return Recovery::Identical;
    }
    let c_sides = edge_sides(&c_nodes, &s_nodes, min_edge);

    label(&mut s_nodes, &s_sides);
    label(&mut c_nodes, &c_sides);

    fuse_pairs(&mut s_nodes, &mut c_nodes, min_edge);
    fuse_pairs(&mut c_nodes, &mut s_nodes, min_edge);

    let min_edge_sq = min_edge * min_edge;
    let keep = |rings: Vec<Ring>| -> Vec<Ring> {
        let total = rings.len();
        let kept: Vec<Ring> = rings
            .into_iter()
            .map(|ring| fuse2(&ring, min_edge_sq))
            .filter(|ring| ring.len() >= 3)
            .collect();
        if kept.len() < total {
            tracing::debug!(dropped = total - kept.len(), "discarding sub-tolerance components");
        }
        kept
    };
    Recovery::Split {
        subject: keep(split(&s_nodes)),
        clip: keep(split(&c_nodes)),
    }
}

fn cross(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Computes every subject/clip edge intersection and rebuilds both rings
/// with the crossing points inserted (or snapped onto existing endpoints),
/// linking each crossing to its twin on the other ring.
fn interconnect(subject: &[DVec2], clip: &[DVec2], min_edge: f64) -> (Vec<Node>, Vec<Node>) {
    // hits[edge] = (parameter along the edge, position)
    let mut s_hits: Vec<Vec<(f64, DVec2)>> = vec![Vec::new(); subject.len()];
    let mut c_hits: Vec<Vec<(f64, DVec2)>> = vec![Vec::new(); clip.len()];

    for (i, &a0) in subject.iter().enumerate() {
        let a1 = subject[(i + 1) % subject.len()];
        let d1 = a1 - a0;
        for (j, &b0) in clip.iter().enumerate() {
            let b1 = clip[(j + 1) % clip.len()];
            let d2 = b1 - b0;
            let denom = cross(d1, d2);

            if denom.abs() > min_edge * d1.length() * d2.length() {
                // Transversal: intersection by signed-area ratios.
                let t = cross(b0 - a0, d2) / denom;
                let s = cross(b0 - a0, d1) / denom;
                if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&s) {
                    let pos = a0 + d1 * t;
                    s_hits[i].push((t, pos));
                    c_hits[j].push((s, pos));
                }
            } else {
                // Parallel: only collinear-within-tolerance edges interact.
                let len = d1.length();
                if len == 0.0
                    || cross(d1, b0 - a0).abs() / len > min_edge
                    || cross(d1, b1 - a0).abs() / len > min_edge
                {
                    continue;
                }
                let len_sq = d1.length_squared();
                let t0 = (b0 - a0).dot(d1) / len_sq;
                let t1 = (b1 - a0).dot(d1) / len_sq;
                let lo = t0.min(t1).max(0.0);
                let hi = t0.max(t1).min(1.0);
                if lo > hi {
                    continue;
                }
                // Overlap endpoints become intersections in both rings.
                for t in [lo, hi] {
                    let pos = a0 + d1 * t;
                    s_hits[i].push((t, pos));
                    let s = if d2.length_squared() == 0.0 {
                        0.0
                    } else {
                        (pos - b0).dot(d2) / d2.length_squared()
                    };
                    c_hits[j].push((s.clamp(0.0, 1.0), pos));
                }
            }
        }
    }

    let mut s_nodes = assemble(subject, s_hits, min_edge);
    let mut c_nodes = assemble(clip, c_hits, min_edge);

    // Shared single vertices count as intersections in both rings.
    for s in s_nodes.iter_mut() {
        for c in c_nodes.iter_mut() {
            if s.pos.distance_squared(c.pos) <= min_edge * min_edge {
                s.intersection = true;
                c.intersection = true;
            }
        }
    }

    link_partners(&mut s_nodes, &mut c_nodes, min_edge);
    (s_nodes, c_nodes)
}

/// Interleaves hit points into the ring, snapping hits onto endpoints they
/// fall within the fusion radius of.
fn assemble(ring: &[DVec2], mut hits: Vec<Vec<(f64, DVec2)>>, min_edge: f64) -> Vec<Node> {
    let min_edge_sq = min_edge * min_edge;
    let mut nodes: Vec<Node> = Vec::with_capacity(ring.len());
    for (i, &v) in ring.iter().enumerate() {
        nodes.push(Node::vertex(v));
        let edge_hits = &mut hits[i];
        edge_hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, pos) in edge_hits.iter() {
            nodes.push(Node::crossing(pos));
        }
    }

    // Merge runs of coincident nodes; an original vertex wins the position,
    // a crossing wins the mark.
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match merged.last_mut() {
            Some(last) if last.pos.distance_squared(node.pos) < min_edge_sq => {
                last.intersection |= node.intersection;
                if !node.intersection {
                    last.pos = node.pos;
                }
            }
            _ => merged.push(node),
        }
    }
    while merged.len() > 1 {
        let first_pos = merged[0].pos;
        let last = merged.last().unwrap();
        if last.pos.distance_squared(first_pos) < min_edge_sq {
            let last = merged.pop().unwrap();
            merged[0].intersection |= last.intersection;
        } else {
            break;
        }
    }
    merged
}

fn link_partners(a: &mut [Node], b: &mut [Node], min_edge: f64) {
    let radius_sq = 4.0 * min_edge * min_edge;
    for (i, node) in a.iter_mut().enumerate() {
        if !node.intersection {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (j, other) in b.iter().enumerate() {
            if !other.intersection {
                continue;
            }
            let d = node.pos.distance_squared(other.pos);
            if d <= radius_sq && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((j, d));
            }
        }
        if let Some((j, _)) = best {
            node.partner = Some(j);
            b[j].partner = Some(i);
        }
    }
}

/// Classifies each edge (between node k and k+1) against the other ring.
fn edge_sides(nodes: &[Node], other: &[Node], min_edge: f64) -> Vec<Side> {
    let other_ring: Ring = other.iter().map(|n| n.pos).collect();
    // Coincidence is decided at a far tighter scale than the fusion radius:
    // shared edges land exactly on the other boundary, near-misses must stay
    // classifiable as inside/outside so tiny crossings keep their labels.
    let on_sq = (min_edge * min_edge).powi(2);
    nodes
        .iter()
        .enumerate()
        .map(|(k, node)| {
            let next = nodes[(k + 1) % nodes.len()].pos;
            let mid = (node.pos + next) / 2.0;
            if boundary_distance_sq(&other_ring, mid) <= on_sq {
                Side::On
            } else if contains(&other_ring, mid) {
                Side::Inside
            } else {
                Side::Outside
            }
        })
        .collect()
}

/// Entry/exit labeling.
///
/// Walks maximal chains of intersections joined by coincident edges. With
/// `prev` the side of the nearest non-coincident edge before the chain and
/// `next` the one after it: `prev == Inside` marks the chain head as an
/// exit, `next == Inside` marks the chain tail as an entry. A transversal
/// crossing is a one-node chain and gets exactly one of the two; an interior
/// bounce gets both on the same node; an exterior bounce gets neither; the
/// delayed (chain) variants fall out of the same rule.
fn label(nodes: &mut [Node], sides: &[Side]) {
    let n = nodes.len();
    // Begin right after a non-coincident edge so no chain straddles the
    // iteration seam. The caller has ruled out the all-coincident case.
    let origin = sides
        .iter()
        .position(|&s| s != Side::On)
        .map(|p| (p + 1) % n)
        .unwrap_or(0);

    let mut k = 0;
    while k < n {
        let start = (origin + k) % n;
        if !nodes[start].intersection {
            k += 1;
            continue;
        }
        // Extend over intersections joined by coincident edges.
        let mut len = 0;
        while len + 1 < n {
            let cur = (start + len) % n;
            let nxt = (start + len + 1) % n;
            if sides[cur] == Side::On && nodes[nxt].intersection {
                len += 1;
            } else {
                break;
            }
        }
        let end = (start + len) % n;
        if preceding_side(sides, start) == Side::Inside {
            nodes[start].exit = true;
        }
        if following_side(sides, end) == Side::Inside {
            nodes[end].entry = true;
        }
        k += len + 1;
    }
}

fn preceding_side(sides: &[Side], start: usize) -> Side {
    let n = sides.len();
    for back in 1..=n {
        let side = sides[(start + n - back) % n];
        if side != Side::On {
            return side;
        }
    }
    Side::On
}

fn following_side(sides: &[Side], end: usize) -> Side {
    let n = sides.len();
    for ahead in 0..n {
        let side = sides[(end + ahead) % n];
        if side != Side::On {
            return side;
        }
    }
    Side::On
}

/// Welds entry/exit pairs closer than the fusion radius, mirroring the weld
/// onto the partner ring.
fn fuse_pairs(a: &mut [Node], b: &mut [Node], min_edge: f64) {
    let min_edge_sq = min_edge * min_edge;
    for i in 0..a.len() {
        if !a[i].entry {
            continue;
        }
        for step in 1..a.len() {
            let j = (i + step) % a.len();
            if !a[j].exit {
                continue;
            }
            if a[i].pos.distance_squared(a[j].pos) <= min_edge_sq {
                a[j].pos = a[i].pos;
                a[i].fused = true;
                a[j].fused = true;
                if let (Some(pi), Some(pj)) = (a[i].partner, a[j].partner) {
                    let pos = b[pi].pos;
                    b[pj].pos = pos;
                    b[pi].fused = true;
                    b[pj].fused = true;
                }
            }
            break;
        }
    }
}

/// Splits a ring at welded vertices. Each weld pinches the ring; the loop
/// between two coincident welds peels off as its own component.
fn split(nodes: &[Node]) -> Vec<Ring> {
    // Start on an unwelded node so pinch pairs never straddle the seam.
    let offset = nodes.iter().position(|n| !n.fused).unwrap_or(0);

    let mut components: Vec<Ring> = Vec::new();
    let mut current: Vec<DVec2> = Vec::new();
    let mut open: Vec<(u64, u64, usize)> = Vec::new();

    for k in 0..nodes.len() {
        let node = &nodes[(offset + k) % nodes.len()];
        let key = (node.pos.x.to_bits(), node.pos.y.to_bits());
        if node.fused {
            if let Some(at) = open.iter().rposition(|&(x, y, _)| (x, y) == key) {
                let start = open[at].2;
                components.push(current[start..].to_vec());
                current.truncate(start);
                open.truncate(at);
            }
            open.push((key.0, key.1, current.len()));
        }
        current.push(node.pos);
    }
    components.push(current);
    components
}

fn components_of(rings: &[Ring]) -> Vec<Ring> {
    rings.iter().filter(|r| r.len() >= 3).cloned().collect()
}
