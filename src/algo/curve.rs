//! Spline interpolation through sparse selected knots.
//!
//! The curve operation treats the selected vertices of a loop as knots,
//! fits a spline through them, and moves the unselected vertices of the
//! loop onto it. Circular loops with large unselected gaps are broken open
//! so the spline does not swing wildly through the gap.

use nalgebra::Point3;

use crate::algo::displace::Move;
use crate::algo::loops::Loop;
use crate::algo::spline::{fit_spline_with_knots, Interpolation, Spline};
use crate::error::{LoopError, Result};
use crate::mesh::{EdgeKey, EditMesh, FaceId, Topology, VertexId};

/// Restriction on how vertices may move relative to their normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restriction {
    /// No restriction.
    #[default]
    None,
    /// Only allow movement along or towards the vertex normal.
    Extrude,
    /// Only allow movement away from the vertex normal.
    Indent,
}

/// Options for the curve operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurveOptions {
    /// Spline interpolation mode.
    pub interpolation: Interpolation,
    /// Movement restriction.
    pub restriction: Restriction,
    /// Space the loop vertices evenly along the spline.
    pub regular: bool,
    /// Trim loops to the span between the first and last selected vertex.
    pub boundaries: bool,
}

impl CurveOptions {
    /// Set the interpolation mode.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Set the movement restriction.
    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = restriction;
        self
    }

    /// Enable or disable regular spacing.
    pub fn with_regular(mut self, regular: bool) -> Self {
        self.regular = regular;
        self
    }

    /// Enable or disable boundary trimming.
    pub fn with_boundaries(mut self, boundaries: bool) -> Self {
        self.boundaries = boundaries;
        self
    }
}

fn index_of(list: &[VertexId], v: VertexId) -> usize {
    list.iter().position(|&x| x == v).unwrap_or(0)
}

/// Sort the loop into knots (selected vertices) and points (all vertices).
///
/// For circular loops, gaps of unselected vertices wider than half the loop
/// get break knots inserted a quarter-loop from each side, and the loop is
/// opened between them. Open loops always get their endpoints as knots.
pub fn curve_knots(lp: &Loop, selected: &[VertexId]) -> (Vec<VertexId>, Vec<VertexId>) {
    let mut knots: Vec<VertexId> = lp
        .verts
        .iter()
        .copied()
        .filter(|v| selected.contains(v))
        .collect();
    let mut points = lp.verts.clone();

    if lp.circular {
        let n = points.len();
        let offset = n / 4;
        let kpos: Vec<usize> = knots.iter().map(|&k| index_of(&points, k)).collect();
        let mut kdif: Vec<usize> = kpos.windows(2).map(|w| w[1] - w[0]).collect();
        if let (Some(&last), Some(&first)) = (kpos.last(), kpos.first()) {
            kdif.push(n - last + first);
        }

        let mut kins: Vec<(VertexId, VertexId)> = Vec::new();
        let mut krot: Option<VertexId> = None;
        for (i, &gap) in kdif.iter().enumerate() {
            if gap > 2 * offset {
                // Big gap: break the circular spline a quarter loop in
                // from each side.
                let mut kp = index_of(&points, knots[i]) + offset;
                if kp > n - 1 {
                    kp -= n;
                }
                kins.push((knots[i], points[kp]));
                let mut k2 = i + 1;
                if k2 > knots.len() - 1 {
                    k2 -= knots.len();
                }
                let mut kp2 = index_of(&points, knots[k2]) as isize - offset as isize;
                if kp2 < 0 {
                    kp2 += n as isize;
                }
                kins.push((points[kp], points[kp2 as usize]));
                krot = Some(points[kp2 as usize]);
            }
        }
        for (after, new) in kins {
            let at = index_of(&knots, after) + 1;
            knots.insert(at, new);
        }

        match krot {
            None => {
                // Still circular: close the knots and rotate the points to
                // start at the first knot.
                knots.push(knots[0]);
                let start = index_of(&points, knots[0]);
                let mut rotated = points[start..].to_vec();
                rotated.extend_from_slice(&points[..start + 1]);
                points = rotated;
            }
            Some(krot) => {
                // Broken open between the inserted break knots.
                let at = index_of(&knots, krot);
                knots.rotate_left(at);
                let first = index_of(&points, knots[0]);
                let last = index_of(&points, knots[knots.len() - 1]);
                if first > last {
                    let mut sliced = points[first..].to_vec();
                    sliced.extend_from_slice(&points[..last + 1]);
                    points = sliced;
                } else {
                    points = points[first..last + 1].to_vec();
                }
            }
        }
    } else {
        if !knots.contains(&points[0]) {
            knots.insert(0, points[0]);
        }
        if !knots.contains(&points[points.len() - 1]) {
            knots.push(points[points.len() - 1]);
        }
    }

    (knots, points)
}

/// Project the interior selected knots onto the line between their nearest
/// unselected neighbors, so dense knot clusters do not kink the spline.
pub fn project_knots(
    mesh: &EditMesh,
    selected: &[VertexId],
    knots: &[VertexId],
    points: &[VertexId],
    circular: bool,
) -> Vec<Point3<f64>> {
    let project = |v1: &Point3<f64>, v2: &Point3<f64>, v3: &Point3<f64>| -> Point3<f64> {
        let line = v2 - v1;
        let rel = v3 - v1;
        let len2 = line.norm_squared();
        if len2 == 0.0 {
            return *v1;
        }
        v1 + line * (rel.dot(&line) / len2)
    };

    let n = points.len() as isize;
    let wrap = |i: isize| -> usize { (((i % n) + n) % n) as usize };

    let (start, end) = if circular {
        (0, knots.len())
    } else {
        (1, knots.len() - 1)
    };
    let mut pknots = Vec::with_capacity(knots.len());
    if !circular {
        pknots.push(*mesh.position(knots[0]));
    }
    for &knot in &knots[start..end] {
        if selected.contains(&knot) {
            let at = index_of(points, knot) as isize;
            let left = (1..n)
                .map(|d| points[wrap(at - d)])
                .find(|p| !knots.contains(p));
            let right = (1..n)
                .map(|d| points[wrap(at + d)])
                .find(|p| !knots.contains(p));
            match (left, right) {
                (Some(l), Some(r)) if l != r => {
                    pknots.push(project(mesh.position(l), mesh.position(r), mesh.position(knot)));
                }
                _ => pknots.push(*mesh.position(knot)),
            }
        } else {
            pknots.push(*mesh.position(knot));
        }
    }
    if !circular {
        pknots.push(*mesh.position(knots[knots.len() - 1]));
    }
    pknots
}

/// Arc-length parameters for the knots and all points of a loop.
///
/// Knots use their projected locations for distance accumulation. With
/// `regular`, the point parameters are respaced evenly and the knot
/// parameters re-picked from them.
pub fn curve_t(
    mesh: &EditMesh,
    knots: &[VertexId],
    points: &[VertexId],
    pknots: &[Point3<f64>],
    regular: bool,
    circular: bool,
) -> (Vec<f64>, Vec<f64>) {
    let loc_of = |p: VertexId| -> Point3<f64> {
        match knots.iter().position(|&k| k == p) {
            Some(i) => pknots[i],
            None => *mesh.position(p),
        }
    };

    let mut tpoints = Vec::with_capacity(points.len());
    let mut loc_prev: Option<Point3<f64>> = None;
    let mut len_total = 0.0;
    for &p in points {
        let loc = loc_of(p);
        if let Some(prev) = loc_prev {
            len_total += (loc - prev).norm();
        }
        tpoints.push(len_total);
        loc_prev = Some(loc);
    }

    let mut tknots: Vec<f64> = Vec::with_capacity(knots.len());
    for (i, &p) in points.iter().enumerate() {
        if knots.contains(&p) {
            tknots.push(tpoints[i]);
        }
    }
    if circular {
        if let Some(last) = tknots.last_mut() {
            *last = tpoints[tpoints.len() - 1];
        }
    }

    if regular {
        let average = tpoints[tpoints.len() - 1] / (tpoints.len() - 1) as f64;
        for (i, t) in tpoints.iter_mut().enumerate().skip(1) {
            if i < points.len() - 1 {
                *t = i as f64 * average;
            }
        }
        for (i, &knot) in knots.iter().enumerate() {
            tknots[i] = tpoints[index_of(points, knot)];
        }
        if circular {
            if let Some(last) = tknots.last_mut() {
                *last = tpoints[tpoints.len() - 1];
            }
        }
    }

    (tknots, tpoints)
}

/// Move the unselected points of a loop onto the fitted spline, honoring
/// the movement restriction.
pub fn curve_vertices(
    mesh: &EditMesh,
    knots: &[VertexId],
    points: &[VertexId],
    tpoints: &[f64],
    spline: &Spline,
    restriction: Restriction,
) -> Vec<Move> {
    let normals = if restriction == Restriction::None {
        Vec::new()
    } else {
        mesh.vertex_normals()
    };

    let mut moves = Vec::new();
    for (i, &p) in points.iter().enumerate() {
        if knots.contains(&p) {
            continue;
        }
        let newloc = spline.evaluate(tpoints[i]);

        match restriction {
            Restriction::None => moves.push(Move::new(p, newloc)),
            _ => {
                let oldloc = *mesh.position(p);
                let normal = normals[p.index()];
                let dloc = newloc - oldloc;
                if dloc.norm() < 1e-6 {
                    moves.push(Move::new(p, newloc));
                    continue;
                }
                let denom = dloc.norm() * normal.norm();
                let angle = if denom > 0.0 {
                    (dloc.dot(&normal) / denom).clamp(-1.0, 1.0).acos()
                } else {
                    0.0
                };
                let half_pi = 0.5 * std::f64::consts::PI;
                match restriction {
                    Restriction::Extrude if angle < half_pi + 1e-6 => {
                        moves.push(Move::new(p, newloc));
                    }
                    Restriction::Indent if angle > half_pi - 1e-6 => {
                        moves.push(Move::new(p, newloc));
                    }
                    _ => {}
                }
            }
        }
    }
    moves
}

/// Compute the curve moves for one loop.
pub fn curve_moves(
    mesh: &EditMesh,
    lp: &Loop,
    selected: &[VertexId],
    opts: &CurveOptions,
) -> Result<Vec<Move>> {
    let (knots, points) = curve_knots(lp, selected);
    if knots.len() < 2 {
        return Err(LoopError::invalid_selection(
            "curve needs at least two knots on a loop",
        ));
    }
    let pknots = project_knots(mesh, selected, &knots, &points, lp.circular);
    let (tknots, tpoints) = curve_t(mesh, &knots, &points, &pknots, opts.regular, lp.circular);
    let knot_locs: Vec<Point3<f64>> = knots.iter().map(|&k| *mesh.position(k)).collect();
    let spline = fit_spline_with_knots(&knot_locs, &tknots, opts.interpolation)?;
    Ok(curve_vertices(
        mesh,
        &knots,
        &points,
        &tpoints,
        &spline,
        opts.restriction,
    ))
}

/// Trim loops to the span between their first and last selected vertices.
///
/// Circular loops are only kept when the selected span is shorter than
/// half the loop; the result is always open.
pub fn cut_boundaries(mesh: &EditMesh, loops: Vec<Loop>) -> Vec<Loop> {
    let mut cut = Vec::new();
    for lp in loops {
        let selected: Vec<bool> = lp
            .verts
            .iter()
            .map(|&v| mesh.vertex(v).select)
            .collect();
        let first = match selected.iter().position(|&s| s) {
            Some(i) => i,
            None => continue,
        };
        let last_from_end = selected.iter().rev().position(|&s| s).unwrap_or(0);
        let end = lp.verts.len() - last_from_end;
        let trimmed = lp.verts[first..end].to_vec();
        if lp.circular {
            if trimmed.len() * 2 < lp.verts.len() {
                cut.push(Loop::new(trimmed, false));
            }
        } else {
            cut.push(Loop::new(trimmed, lp.circular));
        }
    }
    cut
}

/// All loops running through `start`, one per unused incident edge pair.
///
/// The walk continues straight across quads (choosing the edge that shares
/// no face with the incoming one) and stops at poles, where the vertex
/// valence leaves the 3..=4 range.
pub fn vertex_loops(topo: &Topology, start: VertexId) -> Vec<Loop> {
    let mut edges_used: Vec<EdgeKey> = Vec::new();
    let mut loops = Vec::new();

    for &edge in topo.vert_edges(start) {
        if edges_used.contains(&edge) {
            continue;
        }
        let mut verts: Vec<VertexId> = Vec::new();
        let mut circular = false;
        for vert in edge.verts() {
            let mut active_faces: Vec<FaceId> = topo.edge_faces(edge).to_vec();
            let mut new_vert = vert;
            let mut growing = true;
            while growing {
                growing = false;
                let new_edges: Vec<EdgeKey> = topo.vert_edges(new_vert).to_vec();
                verts.push(new_vert);
                if verts.len() > 1 {
                    edges_used.push(EdgeKey::new(
                        verts[verts.len() - 1],
                        verts[verts.len() - 2],
                    ));
                }
                if !(3..=4).contains(&new_edges.len()) {
                    break;
                }
                for new_edge in new_edges {
                    if edges_used.contains(&new_edge) {
                        continue;
                    }
                    let eliminate = topo
                        .edge_faces(new_edge)
                        .iter()
                        .any(|f| active_faces.contains(f));
                    if eliminate {
                        continue;
                    }
                    active_faces = topo.edge_faces(new_edge).to_vec();
                    if let Some(next) = new_edge.other(new_vert) {
                        new_vert = next;
                    }
                    if new_vert == verts[0] {
                        circular = true;
                    } else {
                        growing = true;
                    }
                    break;
                }
            }
            if circular {
                break;
            }
            verts.reverse();
        }
        loops.push(Loop::new(verts, circular));
    }
    loops
}

/// Loops perpendicular to a fully selected loop, trimmed to matching
/// length and direction.
pub fn perpendicular_loops(mesh: &EditMesh, topo: &Topology, start_loop: &[VertexId]) -> Vec<Loop> {
    let mut perp: Vec<(Vec<VertexId>, bool, usize)> = Vec::new();
    for &start_vert in start_loop {
        for lp in vertex_loops(topo, start_vert) {
            let selected = lp
                .verts
                .iter()
                .filter(|&&v| mesh.vertex(v).select)
                .count();
            if selected == lp.verts.len() {
                continue;
            }
            let at = index_of(&lp.verts, start_vert);
            perp.push((lp.verts, lp.circular, at));
        }
    }

    // Trim everything against the shortest open loop.
    let shortest = perp
        .iter()
        .enumerate()
        .filter(|(_, lp)| !lp.1)
        .map(|(i, lp)| (lp.0.len(), i))
        .min();
    let (shortest_len, shortest_i) = match shortest {
        Some(s) => s,
        None => {
            return perp
                .into_iter()
                .map(|(verts, circular, _)| Loop::new(verts, circular))
                .collect()
        }
    };
    let shortest_start = perp[shortest_i].2;
    let before_start = shortest_start;
    let after_start = shortest_len - shortest_start - 1;
    let bigger_before = before_start > after_start;

    let mut trimmed = Vec::new();
    for (mut verts, circular, mut at) in perp {
        // Face the same direction as the shortest loop.
        let flip = if bigger_before {
            (at as f64) < verts.len() as f64 / 2.0
        } else {
            (at as f64) > verts.len() as f64 / 2.0
        };
        if flip {
            verts.reverse();
            at = verts.len() - at - 1;
        }
        // Circular loops shift so the start vertex lines up before
        // trimming.
        if circular {
            let shift = shortest_start as isize - at as isize;
            let n = verts.len();
            if at as isize + shift > 0 && ((at as isize + shift) as usize) < n {
                if shift >= 0 {
                    verts.rotate_right(shift as usize % n);
                } else {
                    verts.rotate_left((-shift) as usize % n);
                }
            }
            let mut new_at = at as isize + shift;
            if new_at < 0 {
                new_at += n as isize;
            } else if new_at > n as isize - 1 {
                new_at -= n as isize;
            }
            at = new_at as usize;
        }
        let start = at.saturating_sub(before_start);
        let end = (at + after_start + 1).min(verts.len());
        trimmed.push(Loop::new(verts[start..end].to_vec(), false));
    }
    trimmed
}

/// Gather the curve input loops: one loop through every selected vertex,
/// with fully selected loops replaced by their perpendicular loops.
pub fn curve_input(mesh: &EditMesh, topo: &Topology, boundaries: bool) -> Vec<Loop> {
    let mut verts_unsorted: Vec<VertexId> = mesh
        .selected_vertex_indices()
        .into_iter()
        .map(VertexId::new)
        .collect();
    let mut correct_loops = Vec::new();

    while !verts_unsorted.is_empty() {
        let loops = vertex_loops(topo, verts_unsorted[0]);
        verts_unsorted.remove(0);

        let usable: Vec<Loop> = loops
            .into_iter()
            .filter(|lp| {
                lp.verts
                    .iter()
                    .filter(|&&v| mesh.vertex(v).select)
                    .count()
                    >= 2
            })
            .collect();
        let fully_selected = usable.iter().find(|lp| {
            lp.verts.iter().all(|&v| mesh.vertex(v).select)
        });

        if let Some(full) = fully_selected {
            let full = full.clone();
            verts_unsorted.retain(|v| !full.verts.contains(v));
            correct_loops.extend(perpendicular_loops(mesh, topo, &full.verts));
        } else {
            correct_loops.extend(usable);
        }
    }

    if boundaries {
        correct_loops = cut_boundaries(mesh, correct_loops);
    }
    correct_loops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn test_open_loop_endpoints_become_knots() {
        let lp = Loop::new((0..5).map(v).collect(), false);
        let selected = vec![v(2)];
        let (knots, points) = curve_knots(&lp, &selected);
        assert_eq!(knots, vec![v(0), v(2), v(4)]);
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn test_circular_small_gaps_stay_closed() {
        // 8 vertices, knots evenly spread: no gap exceeds half the loop.
        let lp = Loop::new((0..8).map(v).collect(), true);
        let selected = vec![v(0), v(2), v(4), v(6)];
        let (knots, points) = curve_knots(&lp, &selected);
        assert_eq!(knots.first(), knots.last());
        // Points are rotated to start at the first knot and closed.
        assert_eq!(points[0], knots[0]);
        assert_eq!(points[points.len() - 1], knots[0]);
    }

    #[test]
    fn test_circular_big_gap_breaks_open() {
        // 12 vertices with knots clustered on one side.
        let lp = Loop::new((0..12).map(v).collect(), true);
        let selected = vec![v(0), v(1), v(2)];
        let (knots, _points) = curve_knots(&lp, &selected);
        // Break knots were inserted and the loop no longer closes.
        assert_ne!(knots.first(), knots.last());
        assert!(knots.len() > 3);
    }

    #[test]
    fn test_curve_moves_linear_straightens_loop() {
        // Zigzag line; endpoints selected as the only interior knots.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.7, 0.0),
            Point3::new(2.0, -0.4, 0.0),
            Point3::new(3.0, 0.2, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ];
        let mut mesh =
            EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3], [3, 4]]).unwrap();
        mesh.select_vertex(v(0), true);
        mesh.select_vertex(v(4), true);
        let lp = Loop::new((0..5).map(v).collect(), false);

        let opts = CurveOptions::default().with_interpolation(Interpolation::Linear);
        let moves = curve_moves(&mesh, &lp, &[v(0), v(4)], &opts).unwrap();
        assert_eq!(moves.len(), 3);
        // Linear interpolation between the endpoints puts everything on y=0.
        for mv in &moves {
            assert!(mv.position.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_regular_t_even_spacing() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(2.9, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3]]).unwrap();
        let knots = vec![v(0), v(3)];
        let points: Vec<VertexId> = (0..4).map(v).collect();
        let pknots = vec![positions[0], positions[3]];
        let (_tknots, tpoints) = curve_t(&mesh, &knots, &points, &pknots, true, false);
        let step = tpoints[1] - tpoints[0];
        for w in tpoints.windows(2) {
            assert!((w[1] - w[0] - step).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cut_boundaries_open_loop() {
        let positions: Vec<Point3<f64>> =
            (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let mut mesh =
            EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3], [3, 4]]).unwrap();
        mesh.select_vertex(v(1), true);
        mesh.select_vertex(v(3), true);
        let lp = Loop::new((0..5).map(v).collect(), false);
        let cut = cut_boundaries(&mesh, vec![lp]);
        assert_eq!(cut.len(), 1);
        assert_eq!(cut[0].verts, vec![v(1), v(2), v(3)]);
    }

    #[test]
    fn test_vertex_loops_runs_straight_across_grid() {
        // 3x3 quad grid; the loop through the center vertex runs straight.
        let mut positions = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                positions.push(Point3::new(x as f64, y as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                let i = y * 4 + x;
                faces.push(vec![i, i + 1, i + 5, i + 4]);
            }
        }
        let mesh = EditMesh::from_polygons(&positions, &faces).unwrap();
        let topo = Topology::build(&mesh);

        let loops = vertex_loops(&topo, v(5));
        // Loops through an interior vertex of a grid: one per edge pair.
        assert!(!loops.is_empty());
        for lp in &loops {
            assert!(lp.verts.contains(&v(5)));
            // Straight runs: all x equal or all y equal.
            let same_x = lp
                .verts
                .iter()
                .all(|&p| p.index() % 4 == lp.verts[0].index() % 4);
            let same_y = lp
                .verts
                .iter()
                .all(|&p| p.index() / 4 == lp.verts[0].index() / 4);
            assert!(same_x || same_y);
        }
    }
}
