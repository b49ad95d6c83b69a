//! Circle fitting and projection.
//!
//! Moves loop vertices onto a fitted circle: the loop is projected onto its
//! best-fit plane, a circle is fitted in 2D, the vertices are distributed on
//! it, and the result is either kept flat or re-projected back onto the
//! surrounding mesh surface.
//!
//! # Algorithm
//!
//! The best-fit circle is found by Gauss-Newton iteration on the radial
//! residuals. When the iteration diverges the bounding-box "min fit" is
//! used instead. Re-projection tries increasingly expensive strategies:
//! adjacent-face ray casts along the plane normal, adjacent-edge closest
//! points, a full-mesh ray cast keeping the closest hit, and finally the
//! flat position.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector2, Vector3};

use crate::algo::displace::Move;
use crate::algo::geom::{intersect_point_line, intersect_ray_tri};
use crate::algo::loops::{connected_loops, Loop};
use crate::algo::plane::{fit_plane, Plane, PlaneFitMethod};
use crate::mesh::{DerivedMapping, EdgeKey, EditMesh, Topology, VertexId};

/// How the circle center and radius are derived from the 2D locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircleFitMethod {
    /// Least-squares best fit.
    #[default]
    BestFit,
    /// Fit inside the points: bounding-box center, smallest distance as
    /// radius.
    MinFit,
}

/// A circle in the 2D plane coordinate system.
#[derive(Debug, Clone, Copy)]
pub struct Circle2d {
    /// Center x.
    pub x0: f64,
    /// Center y.
    pub y0: f64,
    /// Radius.
    pub r: f64,
}

/// Options for the circle operation.
#[derive(Debug, Clone, Copy)]
pub struct CircleOptions {
    /// Center and radius derivation.
    pub fit: CircleFitMethod,
    /// Keep the result flat instead of re-projecting onto the mesh.
    pub flatten: bool,
    /// Space the vertices evenly along the circle.
    pub regular: bool,
    /// Extra rotation applied to all vertices, in radians.
    pub angle: f64,
    /// Blend factor in percent; negative applies fully.
    pub influence: f64,
    /// Override the fitted radius.
    pub custom_radius: Option<f64>,
}

impl Default for CircleOptions {
    fn default() -> Self {
        Self {
            fit: CircleFitMethod::BestFit,
            flatten: true,
            regular: true,
            angle: 0.0,
            influence: 100.0,
            custom_radius: None,
        }
    }
}

impl CircleOptions {
    /// Set the fit method.
    pub fn with_fit(mut self, fit: CircleFitMethod) -> Self {
        self.fit = fit;
        self
    }

    /// Enable or disable flattening.
    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Enable or disable even spacing.
    pub fn with_regular(mut self, regular: bool) -> Self {
        self.regular = regular;
        self
    }

    /// Set the extra rotation angle in radians.
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the influence percentage.
    pub fn with_influence(mut self, influence: f64) -> Self {
        self.influence = influence;
        self
    }

    /// Force a fixed radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.custom_radius = Some(radius);
        self
    }
}

/// A 2D location tagged with the vertex it belongs to.
type Loc2d = (f64, f64, VertexId);

/// Project the loop vertices onto the plane and express them in a 2D basis.
///
/// Returns the 2D locations and the two in-plane basis vectors.
pub fn to_2d(
    mesh: &EditMesh,
    lp: &Loop,
    plane: &Plane,
) -> (Vec<Loc2d>, Vector3<f64>, Vector3<f64>) {
    let normal = plane.normal;

    // Two vectors spanning the plane; retry with y when the normal is
    // close to -x.
    let m = Vector3::new(normal.x + 1.0, normal.y, normal.z);
    let mut p = m - m.dot(&normal) * normal;
    if p.dot(&p) < 1e-6 {
        let m = Vector3::new(normal.x, normal.y + 1.0, normal.z);
        p = m - m.dot(&normal) * normal;
    }
    let q = p.cross(&normal);

    let locs_2d = lp
        .verts
        .iter()
        .map(|&v| {
            let projected = plane.project(mesh.position(v));
            let vloc = projected - plane.com;
            (p.dot(&vloc) / p.dot(&p), q.dot(&vloc) / q.dot(&q), v)
        })
        .collect();
    (locs_2d, p, q)
}

/// Fit a circle to 2D locations.
pub fn fit_circle(locs: &[(f64, f64)], method: CircleFitMethod) -> Circle2d {
    match method {
        CircleFitMethod::BestFit => fit_best(locs),
        CircleFitMethod::MinFit => fit_min(locs),
    }
}

/// Gauss-Newton least-squares fit, starting from the unit circle at the
/// origin. Falls back to the min fit when the iteration diverges.
fn fit_best(locs: &[(f64, f64)]) -> Circle2d {
    let mut x0 = 0.0;
    let mut y0 = 0.0;
    let mut r = 1.0;

    for _ in 0..500 {
        let mut jmat2 = nalgebra::Matrix3::<f64>::zeros();
        let mut k2 = Vector3::zeros();
        for &(x, y) in locs {
            let mut d = ((x - x0) * (x - x0) + (y - y0) * (y - y0)).sqrt();
            if d < 1e-8 {
                d = 1e-8;
            }
            let row = Vector3::new((x0 - x) / d, (y0 - y) / d, -1.0);
            let k = -(d - r);
            k2 += row * k;
            jmat2 += row * row.transpose();
        }
        let inv = jmat2.try_inverse().unwrap_or(jmat2);
        let delta = inv * k2;
        x0 += delta.x;
        y0 += delta.y;
        r += delta.z;
        if delta.x.abs() < 1e-6 && delta.y.abs() < 1e-6 && delta.z.abs() < 1e-6 {
            break;
        }
    }

    if !(x0.is_finite() && y0.is_finite() && r.is_finite()) || r <= 0.0 {
        return fit_min(locs);
    }
    Circle2d { x0, y0, r }
}

/// Bounding-box center with the smallest vertex distance as radius, so no
/// vertex has to move outward.
fn fit_min(locs: &[(f64, f64)]) -> Circle2d {
    let xs = locs.iter().map(|l| l.0);
    let ys = locs.iter().map(|l| l.1);
    let x0 = (xs.clone().fold(f64::INFINITY, f64::min) + xs.fold(f64::NEG_INFINITY, f64::max))
        / 2.0;
    let y0 = (ys.clone().fold(f64::INFINITY, f64::min) + ys.fold(f64::NEG_INFINITY, f64::max))
        / 2.0;
    let r = locs
        .iter()
        .map(|&(x, y)| Vector2::new(x - x0, y - y0).norm())
        .fold(f64::INFINITY, f64::min);
    Circle2d { x0, y0, r }
}

/// Distribute the vertices evenly along the circle, keeping the first
/// vertex's angular offset and the loop's winding direction.
pub fn project_regular(locs_2d: &mut [Loc2d], circle: &Circle2d, angle: f64) {
    let (x, y, _) = locs_2d[0];
    let mut loc = Vector2::new(x - circle.x0, y - circle.y0);
    let len = loc.norm();
    if len > 0.0 {
        loc *= circle.r / len;
    }
    let mut offset_angle = if loc.norm() > 0.0 {
        (loc.dot(&Vector2::new(1.0, 0.0)) / loc.norm()).clamp(-1.0, 1.0).acos()
    } else {
        0.0
    };
    if loc.y < -1e-6 {
        offset_angle = -offset_angle;
    }
    let loca = Vector3::new(x - circle.x0, y - circle.y0, 0.0);
    let (x, y, _) = locs_2d[1];
    let locb = Vector3::new(x - circle.x0, y - circle.y0, 0.0);
    let ccw = if loca.cross(&locb).z >= 0.0 { 1.0 } else { -1.0 };

    let n = locs_2d.len();
    for (i, loc) in locs_2d.iter_mut().enumerate() {
        let t = offset_angle + ccw * (i as f64 / n as f64 * 2.0 * PI);
        loc.0 = (t + angle).cos() * circle.r;
        loc.1 = (t + angle).sin() * circle.r;
    }
}

/// Snap each vertex to the circle along its own direction from the center,
/// preserving the distance relations between vertices.
pub fn project_non_regular(locs_2d: &mut [Loc2d], circle: &Circle2d, angle: f64) {
    let (sin_a, cos_a) = angle.sin_cos();
    for loc in locs_2d.iter_mut() {
        let v = Vector2::new(loc.0 - circle.x0, loc.1 - circle.y0);
        let mut v = Vector2::new(v.x * cos_a - v.y * sin_a, v.x * sin_a + v.y * cos_a);
        let len = v.norm();
        if len > 0.0 {
            v *= circle.r / len;
        }
        loc.0 = v.x;
        loc.1 = v.y;
    }
}

/// Blend between the original and projected 2D locations.
pub fn influence_locs(locs_2d: &mut [Loc2d], new_locs_2d: &[Loc2d], influence: f64) {
    for (old, new) in locs_2d.iter_mut().zip(new_locs_2d) {
        old.0 = new.0 * (influence / 100.0) + old.0 * ((100.0 - influence) / 100.0);
        old.1 = new.1 * (influence / 100.0) + old.1 * ((100.0 - influence) / 100.0);
    }
}

/// Rotate the loop so its first vertex is the one closest to `com`.
pub fn shift_loop(mesh: &EditMesh, lp: &Loop, com: &Point3<f64>) -> Loop {
    let mut distances: Vec<(f64, usize)> = lp
        .verts
        .iter()
        .enumerate()
        .map(|(i, &v)| ((mesh.position(v) - com).norm(), i))
        .collect();
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let shift = distances[0].1;
    let mut verts = lp.verts[shift..].to_vec();
    verts.extend_from_slice(&lp.verts[..shift]);
    Loop::new(verts, lp.circular)
}

/// Turn the 2D circle locations back into vertex positions, either flat on
/// the plane or re-projected onto the mesh surface.
pub fn calculate_verts(
    mesh: &EditMesh,
    topo: &Topology,
    locs_2d: &[Loc2d],
    plane: &Plane,
    p: &Vector3<f64>,
    q: &Vector3<f64>,
    flatten: bool,
) -> Vec<Move> {
    let locs_3d: Vec<(VertexId, Point3<f64>)> = locs_2d
        .iter()
        .map(|&(x, y, v)| (v, plane.com + x * p + y * q))
        .collect();

    if flatten {
        return locs_3d
            .into_iter()
            .map(|(v, pos)| Move::new(v, pos))
            .collect();
    }

    let normal = plane.normal;
    let rays = [normal, -normal];
    locs_3d
        .into_iter()
        .map(|(v, flat)| {
            let projection = reproject(mesh, topo, v, &flat, &rays);
            Move::new(v, projection)
        })
        .collect()
}

/// Re-projection ladder for one vertex.
fn reproject(
    mesh: &EditMesh,
    topo: &Topology,
    v: VertexId,
    flat: &Point3<f64>,
    rays: &[Vector3<f64>; 2],
) -> Point3<f64> {
    let original = mesh.position(v);
    if original == flat {
        return *flat;
    }

    // Already displaced along the projection normal.
    let dif = flat - original;
    if dif.norm() > 0.0 {
        let cos = (rays[0].dot(&dif) / (rays[0].norm() * dif.norm())).clamp(-1.0, 1.0);
        let angle = cos.acos();
        if angle.abs() < 1e-6 || (PI - angle).abs() < 1e-6 {
            return *original;
        }
    }

    // Ray casts against the adjacent faces.
    for &face in topo.vert_faces(v) {
        if let Some(hit) = ray_face(mesh, face, rays, flat) {
            return hit;
        }
    }

    // Closest point on an adjacent edge, interior only.
    for &key in topo.vert_edges(v) {
        let line1 = mesh.position(key.lo());
        let line2 = mesh.position(key.hi());
        let (point, dist) = intersect_point_line(flat, line1, line2);
        if 1e-6 < dist && dist < 1.0 - 1e-6 {
            return point;
        }
    }

    // Full mesh search, closest hit wins.
    let mut hits: Vec<(f64, Point3<f64>)> = Vec::new();
    for face in mesh.face_ids() {
        if mesh.face(face).hide {
            continue;
        }
        if let Some(hit) = ray_face(mesh, face, rays, flat) {
            hits.push(((flat - hit).norm(), hit));
        }
    }
    hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(&(_, hit)) = hits.first() {
        return hit;
    }

    // Nothing to project on, stay at the flat position.
    *flat
}

/// Ray-cast both directions against a face, treating quads as two
/// triangles.
fn ray_face(
    mesh: &EditMesh,
    face: crate::mesh::FaceId,
    rays: &[Vector3<f64>; 2],
    origin: &Point3<f64>,
) -> Option<Point3<f64>> {
    let verts = &mesh.face(face).verts;
    let v1 = mesh.position(verts[0]);
    let v2 = mesh.position(verts[1]);
    let v3 = mesh.position(verts[2]);
    let v4 = if verts.len() > 3 {
        Some(mesh.position(verts[3]))
    } else {
        None
    };
    for ray in rays {
        if let Some(hit) = intersect_ray_tri(v1, v2, v3, ray, origin) {
            return Some(hit);
        }
        if let Some(v4) = v4 {
            if let Some(hit) = intersect_ray_tri(v1, v3, v4, ray, origin) {
                return Some(hit);
            }
        }
    }
    None
}

/// Gathered input for the circle operation.
#[derive(Debug, Clone)]
pub struct CircleInput {
    /// Selected vertices not connected to any selected edge.
    pub singles: Vec<VertexId>,
    /// The loops to fit circles through.
    pub loops: Vec<Loop>,
    /// Per loop, the single vertices ringed by it.
    pub single_loops: Vec<Vec<VertexId>>,
}

/// Gather the circle input loops from the selection.
///
/// Edges interior to a selected face region are excluded, and isolated
/// selected vertices are represented by the ring of edges around them.
pub fn circle_input(mesh: &EditMesh) -> CircleInput {
    let face_mode = mesh.faces().iter().any(|f| f.select && !f.hide);
    let mut edge_keys: Vec<EdgeKey> = if face_mode {
        // Edges used by two selected faces are internal.
        let mut edge_count: HashMap<EdgeKey, usize> = HashMap::new();
        for face in mesh.faces().iter().filter(|f| f.select && !f.hide) {
            for i in 0..face.verts.len() {
                let key = EdgeKey::new(face.verts[i], face.verts[(i + 1) % face.verts.len()]);
                *edge_count.entry(key).or_insert(0) += 1;
            }
        }
        mesh.edges()
            .iter()
            .filter(|e| e.select && !e.hide)
            .map(|e| e.key())
            .filter(|k| edge_count.get(k).copied().unwrap_or(1) == 1)
            .collect()
    } else {
        mesh.selected_edge_keys()
    };

    let mut connected = vec![false; mesh.num_vertices()];
    for key in mesh.selected_edge_keys() {
        for v in key.verts() {
            connected[v.index()] = true;
        }
    }
    let singles: Vec<VertexId> = mesh
        .vertex_ids()
        .filter(|&v| {
            let vert = mesh.vertex(v);
            vert.select && !vert.hide && !connected[v.index()]
        })
        .collect();

    // Ring each single vertex with the far edges of one surrounding face.
    let mut vert_to_single: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
    if !singles.is_empty() && mesh.num_faces() > 0 {
        for face in mesh.faces().iter().filter(|f| !f.select && !f.hide) {
            'face: for &vert in &face.verts {
                if singles.contains(&vert) {
                    for i in 0..face.verts.len() {
                        let key =
                            EdgeKey::new(face.verts[i], face.verts[(i + 1) % face.verts.len()]);
                        if !key.contains(vert) {
                            edge_keys.push(key);
                            for kv in key.verts() {
                                let entry = vert_to_single.entry(kv).or_default();
                                if !entry.contains(&vert) {
                                    entry.push(vert);
                                }
                            }
                        }
                    }
                    break 'face;
                }
            }
        }
    }

    let loops = connected_loops(&edge_keys);
    let single_loops = loops
        .iter()
        .map(|lp| {
            let mut ringed = Vec::new();
            for v in &lp.verts {
                if let Some(list) = vert_to_single.get(v) {
                    for &s in list {
                        if !ringed.contains(&s) {
                            ringed.push(s);
                        }
                    }
                }
            }
            ringed
        })
        .collect();

    CircleInput {
        singles,
        loops,
        single_loops,
    }
}

/// Filter circle input loops, rejecting short, all-virtual, and collinear
/// loops. The per-loop single vertices stay aligned with the result.
pub fn circle_check_loops(
    input: CircleInput,
    mesh: &EditMesh,
    mapping: Option<&DerivedMapping>,
) -> CircleInput {
    let mut loops = Vec::new();
    let mut single_loops = Vec::new();
    for (lp, singles) in input.loops.into_iter().zip(input.single_loops) {
        if lp.verts.len() < 3 {
            continue;
        }
        if let Some(mapping) = mapping {
            if lp.verts.iter().all(|&v| mapping.original(v).is_none()) {
                continue;
            }
        }
        if loop_is_collinear(mesh, &lp) {
            continue;
        }
        loops.push(lp);
        single_loops.push(singles);
    }
    CircleInput {
        singles: input.singles,
        loops,
        single_loops,
    }
}

fn loop_is_collinear(mesh: &EditMesh, lp: &Loop) -> bool {
    let mut loc0 = *mesh.position(lp.verts[0]);
    let mut loc1 = *mesh.position(lp.verts[1]);
    for &v in &lp.verts[2..] {
        let locn = *mesh.position(v);
        if loc0 != loc1 && loc1 != locn {
            let d1 = loc1 - loc0;
            let d2 = locn - loc1;
            let denom = d1.norm() * d2.norm();
            let angle = if denom > 0.0 {
                (d1.dot(&d2) / denom).clamp(-1.0, 1.0).acos()
            } else {
                0.0
            };
            if angle.abs() >= 1e-6 {
                return false;
            }
        }
        loc0 = loc1;
        loc1 = locn;
    }
    true
}

/// Flatten isolated selected vertices onto the circle plane.
pub fn flatten_singles(mesh: &EditMesh, plane: &Plane, singles: &[VertexId]) -> Vec<Move> {
    singles
        .iter()
        .map(|&v| Move::new(v, plane.project(mesh.position(v))))
        .collect()
}

/// Compute the circle moves for one loop.
pub fn circle_moves(
    mesh: &EditMesh,
    topo: &Topology,
    lp: &Loop,
    opts: &CircleOptions,
) -> Vec<Move> {
    let plane = fit_plane(mesh, lp, PlaneFitMethod::BestFit);
    let lp = if opts.regular {
        shift_loop(mesh, lp, &plane.com)
    } else {
        lp.clone()
    };

    let (mut locs_2d, p, q) = to_2d(mesh, &lp, &plane);
    let flat: Vec<(f64, f64)> = locs_2d.iter().map(|&(x, y, _)| (x, y)).collect();
    let mut circle = fit_circle(&flat, opts.fit);
    if let Some(radius) = opts.custom_radius {
        circle.r = radius;
    }

    let mut new_locs = locs_2d.clone();
    if opts.regular {
        project_regular(&mut new_locs, &circle, opts.angle);
    } else {
        project_non_regular(&mut new_locs, &circle, opts.angle);
    }
    if opts.influence >= 0.0 && opts.influence < 100.0 {
        influence_locs(&mut locs_2d, &new_locs, opts.influence);
    } else {
        locs_2d = new_locs;
    }

    calculate_verts(mesh, topo, &locs_2d, &plane, &p, &q, opts.flatten)
}
