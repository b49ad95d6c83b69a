//! Parallel loop propagation.
//!
//! Expands a set of edge loops to all loops running parallel to them across
//! their neighboring face strips, walking outward from both sides of every
//! input loop until the mesh runs out of fresh vertices.
//!
//! Propagation is topological only. When the input touches wire edges or
//! branched regions the expansion is abandoned and the original loops are
//! returned unchanged, with a diagnostic log entry.

use log::warn;

use crate::algo::loops::Loop;
use crate::mesh::{EdgeKey, EditMesh, FaceId, Topology};

/// Expand `loops` to all parallel loops on the mesh.
///
/// Returns the input loops unchanged when the surrounding topology
/// branches.
pub fn parallel_loops(mesh: &EditMesh, topo: &Topology, loops: Vec<Loop>) -> Vec<Loop> {
    let edgeloops: Vec<Vec<EdgeKey>> = loops.iter().map(Loop::edge_keys).collect();

    let mut all_edgeloops: Vec<Vec<EdgeKey>> = Vec::new();
    for edgeloop in &edgeloops {
        all_edgeloops.push(edgeloop.clone());
        let mut newloops = vec![edgeloop.clone()];
        let mut verts_used: Vec<_> = Vec::new();
        for edge in edgeloop {
            for v in edge.verts() {
                if !verts_used.contains(&v) {
                    verts_used.push(v);
                }
            }
        }

        while let Some(frontier) = newloops.pop() {
            let mut side_a: Vec<FaceId> = Vec::new();
            let mut side_b: Vec<FaceId> = Vec::new();
            for &key in &frontier {
                let faces = topo.edge_faces(key);
                if faces.is_empty() {
                    warn!("parallel expansion hit a branched selection, keeping input loops");
                    return loops;
                }
                // Each edge hands one face to either side; chains grow only
                // through faces connected to the side's current tip.
                let mut forbidden: Option<u8> = None;
                for &face in faces {
                    let joins = |side: &[FaceId]| match side.last() {
                        Some(&tip) => topo.face_faces(face).contains(&tip),
                        None => true,
                    };
                    if forbidden != Some(b'a') && joins(&side_a) {
                        side_a.push(face);
                        if forbidden.is_some() {
                            break;
                        }
                        forbidden = Some(b'a');
                        continue;
                    }
                    if forbidden != Some(b'b') && joins(&side_b) {
                        side_b.push(face);
                        if forbidden.is_some() {
                            break;
                        }
                        forbidden = Some(b'b');
                    }
                }
            }

            for side in [&side_a, &side_b] {
                let mut extraloop: Vec<EdgeKey> = Vec::new();
                for &face in side {
                    let verts = &mesh.face(face).verts;
                    for i in 0..verts.len() {
                        let key = EdgeKey::new(verts[i], verts[(i + 1) % verts.len()]);
                        if !verts_used.contains(&key.lo()) && !verts_used.contains(&key.hi()) {
                            extraloop.push(key);
                            break;
                        }
                    }
                }
                if !extraloop.is_empty() {
                    for key in &extraloop {
                        for v in key.verts() {
                            if !verts_used.contains(&v) {
                                verts_used.push(v);
                            }
                        }
                    }
                    newloops.push(extraloop.clone());
                    all_edgeloops.push(extraloop);
                }
            }
        }
    }

    all_edgeloops
        .iter()
        .filter_map(|el| edge_loop_to_vertex_loop(el))
        .collect()
}

/// Rebuild an ordered vertex loop from consecutive edge keys.
fn edge_loop_to_vertex_loop(edgeloop: &[EdgeKey]) -> Option<Loop> {
    if edgeloop.is_empty() {
        return None;
    }
    if edgeloop.len() == 1 {
        return Some(Loop::new(edgeloop[0].verts().to_vec(), false));
    }

    // Interior vertices are the ones shared between consecutive keys.
    let mut verts = Vec::with_capacity(edgeloop.len() + 1);
    for i in 0..edgeloop.len() - 1 {
        for v in edgeloop[i].verts() {
            if edgeloop[i + 1].contains(v) {
                verts.push(v);
                break;
            }
        }
    }
    if verts.is_empty() {
        return None;
    }
    for v in edgeloop[0].verts() {
        if v != verts[0] {
            verts.insert(0, v);
            break;
        }
    }
    for v in edgeloop[edgeloop.len() - 1].verts() {
        if v != verts[verts.len() - 1] {
            verts.push(v);
            break;
        }
    }

    let circular = verts[0] == verts[verts.len() - 1];
    if circular {
        verts.pop();
    }
    Some(Loop::new(verts, circular))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;
    use nalgebra::Point3;

    /// 3x3 quad grid:
    ///
    /// ```text
    /// 12--13--14--15
    ///  |   |   |   |
    ///  8---9--10--11
    ///  |   |   |   |
    ///  4---5---6---7
    ///  |   |   |   |
    ///  0---1---2---3
    /// ```
    fn grid() -> EditMesh {
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
        EditMesh::from_polygons(&positions, &faces).unwrap()
    }

    fn horizontal_loop(row: usize) -> Loop {
        Loop::new(
            (0..4).map(|x| VertexId::new(row * 4 + x)).collect(),
            false,
        )
    }

    #[test]
    fn test_expands_to_all_rows() {
        let mesh = grid();
        let topo = Topology::build(&mesh);
        let loops = parallel_loops(&mesh, &topo, vec![horizontal_loop(1)]);

        assert_eq!(loops.len(), 4);
        // Every row of the grid is covered exactly once.
        let mut rows: Vec<usize> = loops.iter().map(|lp| lp.verts[0].index() / 4).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        for lp in &loops {
            assert_eq!(lp.verts.len(), 4);
            assert!(!lp.circular);
        }
    }

    #[test]
    fn test_wire_edge_keeps_input() {
        let mut mesh = grid();
        // A wire edge hanging off the grid.
        let free = mesh.add_vertex(Point3::new(-1.0, 0.0, 0.0));
        mesh.add_edge(VertexId::new(0), free);
        let topo = Topology::build(&mesh);

        let input = vec![Loop::new(vec![VertexId::new(0), free], false)];
        let result = parallel_loops(&mesh, &topo, input.clone());
        assert_eq!(result, input);
    }

    #[test]
    fn test_edge_loop_to_vertex_loop_circular() {
        let keys = vec![
            EdgeKey::new(VertexId::new(0), VertexId::new(1)),
            EdgeKey::new(VertexId::new(1), VertexId::new(2)),
            EdgeKey::new(VertexId::new(2), VertexId::new(3)),
            EdgeKey::new(VertexId::new(3), VertexId::new(0)),
        ];
        let lp = edge_loop_to_vertex_loop(&keys).unwrap();
        assert!(lp.circular);
        assert_eq!(lp.verts.len(), 4);
    }
}
