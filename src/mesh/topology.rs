//! Adjacency lookup tables.
//!
//! [`Topology`] is built once per operation from an [`EditMesh`] snapshot and
//! answers the four queries every loop algorithm needs: edge→faces,
//! face→faces, vertex→edges, vertex→faces. Hidden elements are excluded.
//! Adjacency is stored in flat per-id vectors; only the edge-key lookup goes
//! through a hash map.

use std::collections::HashMap;

use crate::mesh::{EdgeId, EdgeKey, EditMesh, FaceId, VertexId};

/// Precomputed adjacency tables for one mesh snapshot.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    edge_ids: HashMap<EdgeKey, EdgeId>,
    edge_keys: Vec<EdgeKey>,
    edge_faces: Vec<Vec<FaceId>>,
    face_faces: Vec<Vec<FaceId>>,
    vert_edges: Vec<Vec<EdgeKey>>,
    vert_faces: Vec<Vec<FaceId>>,
}

impl Topology {
    /// Build the adjacency tables for `mesh`, skipping hidden elements.
    ///
    /// An empty mesh yields empty tables.
    pub fn build(mesh: &EditMesh) -> Self {
        let mut topo = Self {
            edge_ids: HashMap::new(),
            edge_keys: Vec::new(),
            edge_faces: Vec::new(),
            face_faces: vec![Vec::new(); mesh.num_faces()],
            vert_edges: vec![Vec::new(); mesh.num_vertices()],
            vert_faces: vec![Vec::new(); mesh.num_vertices()],
        };

        for edge in mesh.edges() {
            if edge.hide {
                continue;
            }
            let key = edge.key();
            topo.intern(key);
            for v in key.verts() {
                if !topo.vert_edges[v.index()].contains(&key) {
                    topo.vert_edges[v.index()].push(key);
                }
            }
        }

        for f in mesh.face_ids() {
            let face = mesh.face(f);
            if face.hide {
                continue;
            }
            for &v in &face.verts {
                topo.vert_faces[v.index()].push(f);
            }
            for i in 0..face.verts.len() {
                let key = EdgeKey::new(face.verts[i], face.verts[(i + 1) % face.verts.len()]);
                if let Some(&id) = topo.edge_ids.get(&key) {
                    topo.edge_faces[id.index()].push(f);
                }
            }
        }

        // Faces sharing an edge are adjacent.
        for faces in &topo.edge_faces {
            for (i, &a) in faces.iter().enumerate() {
                for &b in &faces[i + 1..] {
                    if !topo.face_faces[a.index()].contains(&b) {
                        topo.face_faces[a.index()].push(b);
                    }
                    if !topo.face_faces[b.index()].contains(&a) {
                        topo.face_faces[b.index()].push(a);
                    }
                }
            }
        }

        topo
    }

    fn intern(&mut self, key: EdgeKey) -> EdgeId {
        if let Some(&id) = self.edge_ids.get(&key) {
            return id;
        }
        let id = EdgeId::new(self.edge_keys.len());
        self.edge_ids.insert(key, id);
        self.edge_keys.push(key);
        self.edge_faces.push(Vec::new());
        id
    }

    /// Stable id for an edge key, if the edge exists and is visible.
    #[inline]
    pub fn edge_id(&self, key: EdgeKey) -> Option<EdgeId> {
        self.edge_ids.get(&key).copied()
    }

    /// Faces adjacent to an edge. Empty for unknown or wire edges.
    pub fn edge_faces(&self, key: EdgeKey) -> &[FaceId] {
        match self.edge_ids.get(&key) {
            Some(id) => &self.edge_faces[id.index()],
            None => &[],
        }
    }

    /// Faces sharing an edge with `f`.
    #[inline]
    pub fn face_faces(&self, f: FaceId) -> &[FaceId] {
        &self.face_faces[f.index()]
    }

    /// Visible edges incident to a vertex.
    #[inline]
    pub fn vert_edges(&self, v: VertexId) -> &[EdgeKey] {
        &self.vert_edges[v.index()]
    }

    /// Visible faces incident to a vertex.
    #[inline]
    pub fn vert_faces(&self, v: VertexId) -> &[FaceId] {
        &self.vert_faces[v.index()]
    }

    /// All interned edge keys.
    #[inline]
    pub fn edge_keys(&self) -> &[EdgeKey] {
        &self.edge_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// 2x1 quad strip: two quads sharing edge (1,4).
    ///
    /// ```text
    /// 3---4---5
    /// |   |   |
    /// 0---1---2
    /// ```
    fn quad_strip() -> EditMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        EditMesh::from_polygons(&positions, &[vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap()
    }

    #[test]
    fn test_edge_faces() {
        let mesh = quad_strip();
        let topo = Topology::build(&mesh);

        let shared = EdgeKey::new(VertexId::new(1), VertexId::new(4));
        assert_eq!(topo.edge_faces(shared).len(), 2);

        let border = EdgeKey::new(VertexId::new(0), VertexId::new(1));
        assert_eq!(topo.edge_faces(border).len(), 1);
    }

    #[test]
    fn test_face_faces() {
        let mesh = quad_strip();
        let topo = Topology::build(&mesh);
        assert_eq!(topo.face_faces(FaceId::new(0)), &[FaceId::new(1)]);
        assert_eq!(topo.face_faces(FaceId::new(1)), &[FaceId::new(0)]);
    }

    #[test]
    fn test_vert_adjacency() {
        let mesh = quad_strip();
        let topo = Topology::build(&mesh);
        // Vertex 1 touches edges (0,1), (1,2), (1,4) and both faces.
        assert_eq!(topo.vert_edges(VertexId::new(1)).len(), 3);
        assert_eq!(topo.vert_faces(VertexId::new(1)).len(), 2);
        // Corner vertex 0 touches two edges and one face.
        assert_eq!(topo.vert_edges(VertexId::new(0)).len(), 2);
        assert_eq!(topo.vert_faces(VertexId::new(0)).len(), 1);
    }

    #[test]
    fn test_hidden_excluded() {
        let mut mesh = quad_strip();
        let shared = EdgeKey::new(VertexId::new(1), VertexId::new(4));
        for edge in mesh.edges_mut() {
            if edge.key() == shared {
                edge.hide = true;
            }
        }
        let topo = Topology::build(&mesh);
        assert!(topo.edge_id(shared).is_none());
        assert!(topo.edge_faces(shared).is_empty());
        assert_eq!(topo.vert_edges(VertexId::new(1)).len(), 2);
    }

    #[test]
    fn test_unknown_edge_empty() {
        let mesh = quad_strip();
        let topo = Topology::build(&mesh);
        let bogus = EdgeKey::new(VertexId::new(0), VertexId::new(5));
        assert!(topo.edge_faces(bogus).is_empty());
    }
}
