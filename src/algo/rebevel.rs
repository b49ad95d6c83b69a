//! Bevel reconstruction on meshes.
//!
//! Takes the selected edges of an existing bevel, groups them into rings
//! (one ring per cross-section of the bevel), reconstructs the sharp corner
//! each ring was beveled from, and rebuilds the bevel against that corner
//! with a new width, segment count, or profile shape.
//!
//! # Algorithm
//!
//! 1. Walk the selected edges into open rings and orient parallel rings the
//!    same way by following quad rails between their endpoints.
//! 2. Recover the corner point ("bevel target") per ring by intersecting
//!    the planes of the faces adjacent to the ring endpoints, falling back
//!    to rail edges or endpoint midpoints when fewer than three independent
//!    planes exist.
//! 3. Scale ring vertices towards or away from the target for the requested
//!    width; a width of zero collapses each ring into its target.
//! 4. When the segment count changes, dissolve the ring interior, split the
//!    remaining cross edge into the new segment count, bridge neighboring
//!    rings, and place the new vertices on the requested profile.

use std::collections::HashSet;

use log::warn;
use nalgebra::{Point3, Vector3};

use crate::algo::geom::{
    intersect_line_line, intersect_line_plane, intersect_plane_plane, intersect_point_line,
};
use crate::algo::profile::{map_profile, superellipse};
use crate::error::{LoopError, Result};
use crate::mesh::{EdgeKey, EditMesh, Topology, VertexId};

/// How ring widths react to a size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// All rings end up with the same radius.
    #[default]
    Uniform,
    /// Radii scale proportionally, so bigger rings change faster.
    Proportional,
}

/// Options for bevel reconstruction.
#[derive(Debug, Clone, Copy)]
pub struct RebevelOptions {
    /// New bevel width relative to the reconstructed corner; `1.0` keeps the
    /// current width, `0.0` collapses the bevel.
    pub size: f64,
    /// Segment count of the rebuilt bevel.
    pub segments: usize,
    /// Profile tension in `-1.0..=1.0`; `0.0` is a chamfer, `0.5` round,
    /// `1.0` a sharp corner.
    pub tension: f64,
    /// Width resize behavior across rings of different sizes.
    pub resize: ResizeMode,
    /// Re-place ring vertices on the profile; disable for a pure resize.
    pub reshape: bool,
}

impl Default for RebevelOptions {
    fn default() -> Self {
        Self {
            size: 1.0,
            segments: 2,
            tension: 0.5,
            resize: ResizeMode::Uniform,
            reshape: true,
        }
    }
}

impl RebevelOptions {
    /// Set the bevel width factor.
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    /// Set the segment count.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    /// Set the profile tension.
    pub fn with_tension(mut self, tension: f64) -> Self {
        self.tension = tension;
        self
    }

    /// Set the resize mode.
    pub fn with_resize(mut self, resize: ResizeMode) -> Self {
        self.resize = resize;
        self
    }

    /// Only resize, keep the current profile.
    pub fn resize_only(mut self) -> Self {
        self.reshape = false;
        self
    }
}

/// One cross-section ring of a bevel: an open run of selected edges.
#[derive(Debug, Clone)]
pub struct Strip {
    /// Ring vertices in order, endpoints included.
    pub verts: Vec<VertexId>,
    /// Ring edges in order.
    pub edges: Vec<EdgeKey>,
}

impl Strip {
    fn reverse(&mut self) {
        self.verts.reverse();
        self.edges.reverse();
    }
}

fn walk(
    topo: &Topology,
    selected: &HashSet<EdgeKey>,
    remaining: &mut Vec<EdgeKey>,
    strip: &mut Strip,
    start: EdgeKey,
    mut old: VertexId,
    right: bool,
) {
    let mut curr = start;
    loop {
        let next = match curr.other(old) {
            Some(v) => v,
            None => return,
        };
        if right {
            strip.verts.push(next);
        } else {
            strip.verts.insert(0, next);
        }
        let continuation = topo
            .vert_edges(next)
            .iter()
            .copied()
            .find(|k| *k != curr && selected.contains(k));
        match continuation {
            // Extra selected branches at this vertex are ignored; the first
            // continuation wins.
            Some(k) if !strip.edges.contains(&k) => {
                if right {
                    strip.edges.push(k);
                } else {
                    strip.edges.insert(0, k);
                }
                remaining.retain(|&e| e != k);
                curr = k;
                old = next;
            }
            _ => return,
        }
    }
}

/// Group the selected edges into open rings.
pub fn bevel_strips(mesh: &EditMesh, topo: &Topology) -> Vec<Strip> {
    let selected: HashSet<EdgeKey> = mesh.selected_edge_keys().into_iter().collect();
    let mut remaining: Vec<EdgeKey> = mesh.selected_edge_keys();
    let mut strips = Vec::new();

    while let Some(start) = remaining.pop() {
        let mut strip = Strip {
            verts: Vec::new(),
            edges: vec![start],
        };
        let [a, b] = start.verts();
        walk(topo, &selected, &mut remaining, &mut strip, start, a, true);
        walk(topo, &selected, &mut remaining, &mut strip, start, b, false);
        strips.push(strip);
    }
    strips
}

/// Selected ring-adjacent vertices of `v` across the quads along `edge`.
fn adj_ring_verts(mesh: &EditMesh, topo: &Topology, v: VertexId, edge: EdgeKey) -> Vec<VertexId> {
    let other = match edge.other(v) {
        Some(o) => o,
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    for &f in topo.edge_faces(edge) {
        let verts = &mesh.face(f).verts;
        if verts.len() != 4 {
            continue;
        }
        if let Some(i) = verts.iter().position(|&w| w == v) {
            let n = verts.len();
            let prev = verts[(i + n - 1) % n];
            let next = verts[(i + 1) % n];
            let candidate = if prev == other { next } else { prev };
            if mesh.vertex(candidate).select && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

fn adj_ring_vert_ignoring(
    mesh: &EditMesh,
    topo: &Topology,
    v: VertexId,
    edge: EdgeKey,
    ignored: VertexId,
) -> Option<VertexId> {
    adj_ring_verts(mesh, topo, v, edge)
        .into_iter()
        .find(|&c| c != ignored)
}

/// Orient parallel rings the same way.
///
/// Adjacent rings may come out of the walk with flipped vertex order;
/// following the quad rails from one ring's first vertex fixes the order of
/// its neighbors, reversing rings where needed.
pub fn sort_strips(mesh: &EditMesh, topo: &Topology, mut strips: Vec<Strip>) -> Vec<Strip> {
    let mut sorted: Vec<Strip> = Vec::new();
    while let Some(current) = strips.pop() {
        let root_v1 = current.verts[0];
        let root_edge = current.edges[0];
        sorted.push(current);

        let mut go_right = true;
        for linked in adj_ring_verts(mesh, topo, root_v1, root_edge) {
            let mut old_vert = root_v1;
            let mut current_vert = Some(linked);
            while let (Some(cv), false) = (current_vert, strips.is_empty()) {
                let found = strips
                    .iter()
                    .position(|s| s.verts.first() == Some(&cv) || s.verts.last() == Some(&cv));
                match found {
                    Some(i) => {
                        let mut s = strips.remove(i);
                        if s.verts.first() != Some(&cv) {
                            s.reverse();
                        }
                        let next = adj_ring_vert_ignoring(mesh, topo, cv, s.edges[0], old_vert);
                        if go_right {
                            sorted.push(s);
                        } else {
                            sorted.insert(0, s);
                        }
                        old_vert = cv;
                        current_vert = next;
                    }
                    None => current_vert = None,
                }
            }
            go_right = false;
        }
    }
    sorted
}

fn edge_angle(mesh: &EditMesh, a: EdgeKey, b: EdgeKey, at: VertexId) -> Option<f64> {
    let va = (mesh.position(a.other(at)?) - mesh.position(at)).normalize();
    let vb = (mesh.position(b.other(at)?) - mesh.position(at)).normalize();
    Some(va.dot(&vb).clamp(-1.0, 1.0).acos())
}

/// Best edge at `v` facing away from `e`, requiring at least 2 rad between
/// the two. Rail edges continue the surface past a bevel endpoint.
fn counter_facing_edge(
    mesh: &EditMesh,
    topo: &Topology,
    e: EdgeKey,
    v: VertexId,
) -> Option<EdgeKey> {
    let mut min_angle = 2.0;
    let mut best = None;
    for &other in topo.vert_edges(v) {
        if other == e {
            continue;
        }
        if let Some(angle) = edge_angle(mesh, e, other, v) {
            if angle > min_angle {
                min_angle = angle;
                best = Some(other);
            }
        }
    }
    best
}

#[derive(Clone, Copy)]
struct FitPlane {
    co: Point3<f64>,
    no: Vector3<f64>,
}

/// Reconstruct the corner point one ring was beveled from.
///
/// Uses up to three pairwise non-coplanar planes from the faces adjacent to
/// the ring endpoints (bevel faces excluded); with fewer planes the rail
/// edges or the endpoint midpoint stand in.
fn bevel_target(
    mesh: &EditMesh,
    topo: &Topology,
    strip: &Strip,
    merged: bool,
) -> Option<Point3<f64>> {
    let v1 = strip.verts[0];
    let vn = *strip.verts.last()?;
    let (v1_neighbor, vn_neighbor, e1, e2) = if merged {
        let cross = EdgeKey::new(v1, vn);
        (vn, v1, cross, cross)
    } else {
        (
            strip.verts[1],
            strip.verts[strip.verts.len() - 2],
            strip.edges[0],
            *strip.edges.last()?,
        )
    };

    let endpoint_planes = |v: VertexId, neighbor: VertexId| -> Vec<FitPlane> {
        let neighbor_faces = topo.vert_faces(neighbor);
        topo.vert_faces(v)
            .iter()
            .copied()
            .filter(|f| !neighbor_faces.contains(f))
            .map(|f| FitPlane {
                co: *mesh.position(v),
                no: mesh.face_normal(f),
            })
            .collect()
    };

    // Keep at most three pairwise independent planes; near-parallel normals
    // (dot > 0.98) would make the intersections unstable.
    let mut planes: Vec<FitPlane> = Vec::new();
    for candidate in endpoint_planes(v1, v1_neighbor)
        .into_iter()
        .chain(endpoint_planes(vn, vn_neighbor))
    {
        if planes.iter().all(|p| p.no.dot(&candidate.no) <= 0.98) {
            planes.push(candidate);
            if planes.len() >= 3 {
                break;
            }
        }
    }

    let rails = [
        counter_facing_edge(mesh, topo, e1, v1),
        counter_facing_edge(mesh, topo, e2, vn),
    ];
    let p1 = *mesh.position(v1);
    let pn = *mesh.position(vn);
    let midpoint = Point3::from((p1.coords + pn.coords) / 2.0);

    let rail_crossing = || -> Option<Point3<f64>> {
        let r1 = rails[0]?.other(v1)?;
        let r2 = rails[1]?.other(vn)?;
        intersect_line_line(&p1, mesh.position(r1), &pn, mesh.position(r2)).map(|(a, _)| a)
    };

    match planes.len() {
        0 => rail_crossing().or(Some(midpoint)),
        1 => rail_crossing().or_else(|| {
            // One plane, no rails: project the endpoint midpoint onto it.
            let d = (midpoint - planes[0].co).dot(&planes[0].no);
            Some(midpoint - planes[0].no * d)
        }),
        count => {
            let (line_pt, line_dir) =
                intersect_plane_plane(&planes[0].co, &planes[0].no, &planes[1].co, &planes[1].no)?;
            if count == 3 {
                return intersect_line_plane(
                    &line_pt,
                    &(line_pt + line_dir),
                    &planes[2].co,
                    &planes[2].no,
                );
            }
            // Two planes: cross their intersection line with the most
            // perpendicular rail, or project the midpoint onto the line.
            let reference = line_dir.normalize();
            let mut best_rail: Option<(Point3<f64>, Point3<f64>)> = None;
            let mut max_dot = 0.99;
            for (rail, v) in rails.iter().zip([v1, vn]) {
                let Some(rail) = rail else { continue };
                let Some(other) = rail.other(v) else { continue };
                let dir = (mesh.position(v) - mesh.position(other)).normalize();
                let dot = reference.dot(&dir).abs();
                if dot < max_dot {
                    max_dot = dot;
                    best_rail = Some((*mesh.position(v), *mesh.position(other)));
                }
            }
            match best_rail {
                Some((a, b)) => intersect_line_line(&line_pt, &(line_pt + line_dir), &a, &b)
                    .map(|(p, _)| p),
                None => Some(intersect_point_line(&midpoint, &line_pt, &(line_pt + line_dir)).0),
            }
        }
    }
}

/// Per-ring width factors for [`ResizeMode::Uniform`].
fn scale_factors(
    mesh: &EditMesh,
    strips: &[Strip],
    targets: &[Option<Point3<f64>>],
    resize: ResizeMode,
) -> Vec<f64> {
    if resize == ResizeMode::Proportional {
        return vec![1.0; strips.len()];
    }
    let mut factors = Vec::with_capacity(strips.len());
    for (strip, target) in strips.iter().zip(targets) {
        match target {
            Some(t) => {
                let v1 = *mesh.position(strip.verts[0]);
                let vn = *mesh.position(strip.verts[strip.verts.len() - 1]);
                factors.push(((v1 - t).norm() + (vn - t).norm()) / 2.0);
            }
            None => factors.push(factors.last().copied().unwrap_or(1.0)),
        }
    }
    let min = factors
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
        .max(1e-8);
    factors.iter().map(|f| f / min).collect()
}

/// Rebuild the bevel described by the selected edges.
///
/// Fails without touching the mesh when no selected edges form a ring.
pub fn rebevel(mesh: &mut EditMesh, opts: &RebevelOptions) -> Result<()> {
    let topo = Topology::build(mesh);
    let strips = bevel_strips(mesh, &topo);
    if strips.is_empty() {
        return Err(LoopError::invalid_selection(
            "no selected edges to rebuild a bevel from",
        ));
    }
    let mut strips = sort_strips(mesh, &topo, strips);
    let start_segments = strips[0].verts.len().saturating_sub(2);
    let resegment = opts.reshape && opts.segments != start_segments;

    // Changing the segment count first collapses every ring to its cross
    // edge; the interior is rebuilt against the target later.
    if resegment && strips[0].verts.len() > 2 {
        for strip in &mut strips {
            let v1 = strip.verts[0];
            let vn = strip.verts[strip.verts.len() - 1];
            mesh.dissolve_verts(&strip.verts[1..strip.verts.len() - 1])?;
            let key = mesh.connect_verts(v1, vn)?;
            mesh.select_edge(key, true);
            strip.verts = vec![v1, vn];
            strip.edges = vec![key];
        }
    }

    let topo = Topology::build(mesh);
    let targets: Vec<Option<Point3<f64>>> = strips
        .iter()
        .map(|s| bevel_target(mesh, &topo, s, resegment))
        .collect();
    let factors = scale_factors(mesh, &strips, &targets, opts.resize);

    for ((strip, target), factor) in strips.iter().zip(&targets).zip(factors.iter().copied()) {
        let Some(target) = target else {
            warn!(
                "no bevel target for ring at vertex {}, leaving its width unchanged",
                strip.verts[0].index()
            );
            continue;
        };
        if opts.size > 0.0 {
            for &v in &strip.verts {
                let pos = *mesh.position(v);
                let scaled = pos + (target - pos) / factor;
                mesh.set_position(v, scaled + (pos - scaled) * opts.size);
            }
        } else {
            mesh.point_merge(&strip.verts, *target)?;
        }
    }
    if opts.size <= 0.0 || opts.segments == 0 || !opts.reshape {
        return Ok(());
    }

    let profile = superellipse(opts.tension, opts.segments + 2);

    if !resegment {
        // Same segment count: re-place the existing ring vertices on the
        // profile.
        for (strip, target) in strips.iter().zip(&targets) {
            let Some(target) = target else { continue };
            let v1 = *mesh.position(strip.verts[0]);
            let vn = *mesh.position(strip.verts[strip.verts.len() - 1]);
            let placed = map_profile(&profile, &v1, target, &vn, opts.tension);
            for (&v, p) in strip.verts.iter().zip(placed) {
                mesh.set_position(v, p);
            }
        }
        return Ok(());
    }

    // Split each cross edge into the new segment count.
    let mut new_strips: Vec<Vec<VertexId>> = Vec::with_capacity(strips.len());
    for strip in &strips {
        let v1 = strip.verts[0];
        let vn = strip.verts[strip.verts.len() - 1];
        let mut ring = vec![v1];
        let mut key = strip.edges[0];
        let mut from = v1;
        for i in 0..opts.segments {
            let t = 1.0 / (opts.segments + 1 - i) as f64;
            let (new_vert, _, far) = mesh.split_edge(key, from, t)?;
            mesh.vertex_mut(new_vert).select = true;
            ring.push(new_vert);
            key = far;
            from = new_vert;
        }
        ring.push(vn);
        new_strips.push(ring);
    }

    // Bridge neighboring rings of equal length, wrapping around so the last
    // ring can connect back to the first.
    if new_strips.len() > 1 {
        let topo = Topology::build(mesh);
        let count = new_strips.len();
        for i in 1..=count {
            let prev = &new_strips[i - 1];
            let ring = &new_strips[i % count];
            if prev.len() != ring.len() || prev.len() < 3 {
                continue;
            }
            let linked = |a: VertexId, b: VertexId| topo.edge_id(EdgeKey::new(a, b)).is_some();
            if !(linked(prev[0], ring[0]) && linked(prev[prev.len() - 1], ring[ring.len() - 1])) {
                continue;
            }
            for (&a, &b) in prev[1..prev.len() - 1].iter().zip(&ring[1..ring.len() - 1]) {
                if let Err(err) = mesh.connect_verts(a, b) {
                    warn!("skipping bridge edge {}-{}: {err}", a.index(), b.index());
                }
            }
        }
    }

    // Place the new rings on the profile.
    for (ring, target) in new_strips.iter().zip(&targets) {
        let Some(target) = target else { continue };
        let v1 = *mesh.position(ring[0]);
        let vn = *mesh.position(ring[ring.len() - 1]);
        let placed = map_profile(&profile, &v1, target, &vn, opts.tension);
        for (&v, p) in ring.iter().zip(placed) {
            mesh.set_position(v, p);
        }
    }
    Ok(())
}
