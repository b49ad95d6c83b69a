//! Flattening selections onto a best-fit plane.
//!
//! Splits the selected vertices into clusters connected by selected edges
//! (or a single cluster when no edges are selected), fits a plane through
//! each cluster, and projects the vertices onto it.

use std::collections::HashMap;

use crate::algo::displace::Move;
use crate::algo::loops::Loop;
use crate::algo::plane::{fit_plane, Plane, PlaneFitMethod};
use crate::mesh::{EditMesh, VertexId};

/// Cluster the selected vertices into flattening groups.
///
/// Vertices connected through selected edges form one group each; a
/// selection without edges becomes a single group. Groups are represented
/// as open [`Loop`]s even though their vertex order is arbitrary.
pub fn flatten_input(mesh: &EditMesh) -> Vec<Loop> {
    let mut vert_verts: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
    for key in mesh.selected_edge_keys() {
        for v in key.verts() {
            let other = key.other(v).unwrap_or(v);
            let entry = vert_verts.entry(v).or_default();
            if !entry.contains(&other) {
                entry.push(other);
            }
        }
    }
    let mut verts: Vec<VertexId> = mesh
        .selected_vertex_indices()
        .into_iter()
        .map(VertexId::new)
        .collect();

    if vert_verts.is_empty() {
        return vec![Loop::new(verts, false)];
    }

    let mut loops = Vec::new();
    while !verts.is_empty() {
        let start = verts.remove(0);
        let mut cluster = vec![start];
        let mut to_grow: Vec<VertexId> = vert_verts.get(&start).cloned().unwrap_or_default();
        while !to_grow.is_empty() {
            let new_vert = to_grow.remove(0);
            if cluster.contains(&new_vert) {
                continue;
            }
            cluster.push(new_vert);
            verts.retain(|&v| v != new_vert);
            if let Some(more) = vert_verts.get(&new_vert) {
                to_grow.extend_from_slice(more);
            }
        }
        loops.push(Loop::new(cluster, false));
    }
    loops
}

/// Project the vertices of one cluster onto a plane.
pub fn flatten_project(mesh: &EditMesh, lp: &Loop, plane: &Plane) -> Vec<Move> {
    lp.verts
        .iter()
        .map(|&v| Move::new(v, plane.project(mesh.position(v))))
        .collect()
}

/// Compute flattening moves for one cluster with the given plane fit.
pub fn flatten_moves(mesh: &EditMesh, lp: &Loop, method: PlaneFitMethod) -> Vec<Move> {
    let plane = fit_plane(mesh, lp, method);
    flatten_project(mesh, lp, &plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_input_without_edges_is_one_group() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.5),
            Point3::new(0.0, 1.0, -0.5),
        ];
        let mut mesh = EditMesh::from_edges(&positions, &[]).unwrap();
        for v in 0..3 {
            mesh.select_vertex(VertexId::new(v), true);
        }
        let groups = flatten_input(&mesh);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].verts.len(), 3);
    }

    #[test]
    fn test_input_splits_edge_clusters() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
        ];
        let mut mesh = EditMesh::from_edges(&positions, &[[0, 1], [2, 3]]).unwrap();
        for v in 0..4 {
            mesh.select_vertex(VertexId::new(v), true);
        }
        for edge in mesh.edges_mut() {
            edge.select = true;
        }
        let groups = flatten_input(&mesh);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_project_flattens_cluster() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.3),
            Point3::new(1.0, 0.0, -0.3),
            Point3::new(1.0, 1.0, 0.3),
            Point3::new(0.0, 1.0, -0.3),
        ];
        let mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3], [3, 0]]).unwrap();
        let lp = Loop::new((0..4).map(VertexId::new).collect(), false);
        let moves = flatten_moves(&mesh, &lp, PlaneFitMethod::BestFit);
        assert_eq!(moves.len(), 4);
        // All projected positions are coplanar through the centroid.
        let plane = fit_plane(&mesh, &lp, PlaneFitMethod::BestFit);
        for mv in &moves {
            let offset = (mv.position - plane.com).dot(&plane.normal);
            assert!(offset.abs() < 1e-9);
        }
    }
}
