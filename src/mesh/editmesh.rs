//! Editable polygon mesh snapshot.
//!
//! [`EditMesh`] is the boundary representation all loop algorithms operate on:
//! vertices with positions and selection/hidden flags, edges as vertex pairs,
//! and faces as ordered vertex loops. The host owns the live mesh; an
//! `EditMesh` is the working snapshot handed to one operation, mutated in
//! place, and committed back by the host.

use nalgebra::{Point3, Vector3};

use crate::error::{LoopError, Result};
use crate::mesh::{FaceId, VertexId};

/// An unordered pair of vertex indices, canonicalized for hashing.
///
/// Two edges with the same endpoints produce equal keys regardless of
/// direction:
///
/// ```
/// use loopkit::mesh::{EdgeKey, VertexId};
///
/// let a = EdgeKey::new(VertexId::new(3), VertexId::new(7));
/// let b = EdgeKey::new(VertexId::new(7), VertexId::new(3));
/// assert_eq!(a, b);
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeKey {
    lo: VertexId,
    hi: VertexId,
}

impl EdgeKey {
    /// Create a canonical key from two vertex indices.
    #[inline]
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// The smaller vertex index.
    #[inline]
    pub fn lo(self) -> VertexId {
        self.lo
    }

    /// The larger vertex index.
    #[inline]
    pub fn hi(self) -> VertexId {
        self.hi
    }

    /// Both endpoints, smaller first.
    #[inline]
    pub fn verts(self) -> [VertexId; 2] {
        [self.lo, self.hi]
    }

    /// Whether `v` is one of the endpoints.
    #[inline]
    pub fn contains(self, v: VertexId) -> bool {
        self.lo == v || self.hi == v
    }

    /// The endpoint that is not `v`. Returns `None` if `v` is not an endpoint.
    #[inline]
    pub fn other(self, v: VertexId) -> Option<VertexId> {
        if self.lo == v {
            Some(self.hi)
        } else if self.hi == v {
            Some(self.lo)
        } else {
            None
        }
    }
}

/// A mesh vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Position in object space.
    pub position: Point3<f64>,
    /// Selection flag.
    pub select: bool,
    /// Hidden flag. Hidden elements are excluded from topology queries.
    pub hide: bool,
}

/// A mesh edge between two vertices.
#[derive(Debug, Clone)]
pub struct Edge {
    /// The two endpoint vertices.
    pub verts: [VertexId; 2],
    /// Selection flag.
    pub select: bool,
    /// Hidden flag.
    pub hide: bool,
}

impl Edge {
    /// The canonical key for this edge.
    #[inline]
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.verts[0], self.verts[1])
    }
}

/// A mesh face as an ordered vertex loop.
#[derive(Debug, Clone)]
pub struct Face {
    /// The boundary vertices, in winding order.
    pub verts: Vec<VertexId>,
    /// Selection flag.
    pub select: bool,
    /// Hidden flag.
    pub hide: bool,
}

/// An editable polygon mesh snapshot.
#[derive(Debug, Clone, Default)]
pub struct EditMesh {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
}

impl EditMesh {
    /// Build a mesh from vertex positions and polygon faces.
    ///
    /// Edges are derived from the face boundaries; loose edges can be added
    /// afterwards with [`EditMesh::add_edge`]. Faces must have at least three
    /// distinct, in-range vertex indices.
    pub fn from_polygons(positions: &[Point3<f64>], faces: &[Vec<usize>]) -> Result<Self> {
        if positions.is_empty() {
            return Err(LoopError::EmptyMesh);
        }

        let mut mesh = Self {
            vertices: positions
                .iter()
                .map(|&position| Vertex {
                    position,
                    select: false,
                    hide: false,
                })
                .collect(),
            edges: Vec::new(),
            faces: Vec::with_capacity(faces.len()),
        };

        let mut seen = std::collections::HashMap::new();
        for (face_index, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(LoopError::DegenerateFace { face: face_index });
            }
            for &v in face {
                if v >= positions.len() {
                    return Err(LoopError::InvalidVertexIndex {
                        face: face_index,
                        vertex: v,
                    });
                }
            }
            for i in 0..face.len() {
                for j in (i + 1)..face.len() {
                    if face[i] == face[j] {
                        return Err(LoopError::DegenerateFace { face: face_index });
                    }
                }
            }

            let verts: Vec<VertexId> = face.iter().map(|&v| VertexId::new(v)).collect();
            for i in 0..verts.len() {
                let key = EdgeKey::new(verts[i], verts[(i + 1) % verts.len()]);
                seen.entry(key).or_insert_with(|| {
                    mesh.edges.push(Edge {
                        verts: key.verts(),
                        select: false,
                        hide: false,
                    });
                    mesh.edges.len() - 1
                });
            }
            mesh.faces.push(Face {
                verts,
                select: false,
                hide: false,
            });
        }

        Ok(mesh)
    }

    /// Build an edge-only mesh (no faces) from positions and vertex pairs.
    pub fn from_edges(positions: &[Point3<f64>], edges: &[[usize; 2]]) -> Result<Self> {
        if positions.is_empty() {
            return Err(LoopError::EmptyMesh);
        }
        let mut mesh = Self {
            vertices: positions
                .iter()
                .map(|&position| Vertex {
                    position,
                    select: false,
                    hide: false,
                })
                .collect(),
            edges: Vec::with_capacity(edges.len()),
            faces: Vec::new(),
        };
        for (edge_index, &[a, b]) in edges.iter().enumerate() {
            for v in [a, b] {
                if v >= positions.len() {
                    return Err(LoopError::InvalidEdgeIndex {
                        edge: edge_index,
                        vertex: v,
                    });
                }
            }
            mesh.edges.push(Edge {
                verts: [VertexId::new(a), VertexId::new(b)],
                select: false,
                hide: false,
            });
        }
        Ok(mesh)
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Iterator over all vertex ids.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterator over all face ids.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Access a vertex.
    #[inline]
    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v.index()]
    }

    /// Mutable access to a vertex.
    #[inline]
    pub fn vertex_mut(&mut self, v: VertexId) -> &mut Vertex {
        &mut self.vertices[v.index()]
    }

    /// Position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertices[v.index()].position
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId, position: Point3<f64>) {
        self.vertices[v.index()].position = position;
    }

    /// All edges.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Mutable access to all edges.
    #[inline]
    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    /// All faces.
    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Mutable access to all faces.
    #[inline]
    pub fn faces_mut(&mut self) -> &mut [Face] {
        &mut self.faces
    }

    /// Access a face.
    #[inline]
    pub fn face(&self, f: FaceId) -> &Face {
        &self.faces[f.index()]
    }

    #[inline]
    pub(crate) fn edges_mut_vec(&mut self) -> &mut Vec<Edge> {
        &mut self.edges
    }

    #[inline]
    pub(crate) fn faces_mut_vec(&mut self) -> &mut Vec<Face> {
        &mut self.faces
    }

    /// Add a loose edge, returning its index. Duplicate keys are not checked.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> usize {
        self.edges.push(Edge {
            verts: [a, b],
            select: false,
            hide: false,
        });
        self.edges.len() - 1
    }

    /// Append a vertex, returning its id.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId {
        self.vertices.push(Vertex {
            position,
            select: false,
            hide: false,
        });
        VertexId::new(self.vertices.len() - 1)
    }

    /// Select or deselect a vertex.
    pub fn select_vertex(&mut self, v: VertexId, select: bool) {
        self.vertices[v.index()].select = select;
    }

    /// Select or deselect an edge by key. No-op if no such edge exists.
    pub fn select_edge(&mut self, key: EdgeKey, select: bool) {
        for edge in &mut self.edges {
            if edge.key() == key {
                edge.select = select;
            }
        }
    }

    /// Keys of all selected, non-hidden edges.
    pub fn selected_edge_keys(&self) -> Vec<EdgeKey> {
        self.edges
            .iter()
            .filter(|e| e.select && !e.hide)
            .map(|e| e.key())
            .collect()
    }

    /// Indices of all selected, non-hidden vertices, in ascending order.
    pub fn selected_vertex_indices(&self) -> Vec<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.select && !v.hide)
            .map(|(i, _)| i)
            .collect()
    }

    /// Face normal via Newell's method. Zero vector for degenerate faces.
    pub fn face_normal(&self, f: FaceId) -> Vector3<f64> {
        let verts = &self.faces[f.index()].verts;
        let mut normal: Vector3<f64> = Vector3::zeros();
        for i in 0..verts.len() {
            let a = self.position(verts[i]);
            let b = self.position(verts[(i + 1) % verts.len()]);
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        let len = normal.norm();
        if len > 1e-12 {
            normal / len
        } else {
            Vector3::zeros()
        }
    }

    /// Centroid of a face's vertices.
    pub fn face_centroid(&self, f: FaceId) -> Point3<f64> {
        let verts = &self.faces[f.index()].verts;
        let sum: Vector3<f64> = verts.iter().map(|&v| self.position(v).coords).sum();
        Point3::from(sum / verts.len() as f64)
    }

    /// Per-vertex normals as the normalized average of incident face normals.
    ///
    /// Vertices without faces get a zero normal.
    pub fn vertex_normals(&self) -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for f in self.face_ids() {
            let n = self.face_normal(f);
            for &v in &self.faces[f.index()].verts {
                normals[v.index()] += n;
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > 1e-12 {
                *n /= len;
            }
        }
        normals
    }

    /// Length of the edge between two vertices.
    #[inline]
    pub fn edge_length(&self, key: EdgeKey) -> f64 {
        (self.position(key.lo()) - self.position(key.hi())).norm()
    }

    /// Average length of the selected, non-hidden edges, or `None` if there
    /// are none.
    pub fn average_selected_edge_length(&self) -> Option<f64> {
        let keys = self.selected_edge_keys();
        if keys.is_empty() {
            return None;
        }
        let total: f64 = keys.iter().map(|&k| self.edge_length(k)).sum();
        Some(total / keys.len() as f64)
    }

    /// Axis-aligned bounding box of all vertices.
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }
        (min, max)
    }

    /// Diagonal length of the bounding box.
    pub fn bounding_box_diagonal(&self) -> f64 {
        let (min, max) = self.bounding_box();
        (max - min).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> EditMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        EditMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap()
    }

    #[test]
    fn test_edge_key_canonical() {
        let a = EdgeKey::new(VertexId::new(5), VertexId::new(2));
        let b = EdgeKey::new(VertexId::new(2), VertexId::new(5));
        assert_eq!(a, b);
        assert_eq!(a.lo().index(), 2);
        assert_eq!(a.hi().index(), 5);
        assert_eq!(a.other(VertexId::new(2)), Some(VertexId::new(5)));
        assert_eq!(a.other(VertexId::new(9)), None);
    }

    #[test]
    fn test_quad_construction() {
        let mesh = quad();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 4);
        assert_eq!(mesh.num_faces(), 1);
    }

    #[test]
    fn test_shared_edges_deduplicated() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh =
            EditMesh::from_polygons(&positions, &[vec![0, 1, 2], vec![0, 2, 3]]).unwrap();
        // Diagonal (0,2) shared by both triangles counts once.
        assert_eq!(mesh.num_edges(), 5);
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let result = EditMesh::from_polygons(&positions, &[vec![0, 1, 1]]);
        assert!(matches!(result, Err(LoopError::DegenerateFace { face: 0 })));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let result = EditMesh::from_polygons(&positions, &[vec![0, 1, 9]]);
        assert!(matches!(
            result,
            Err(LoopError::InvalidVertexIndex { face: 0, vertex: 9 })
        ));
    }

    #[test]
    fn test_face_normal_planar_quad() {
        let mesh = quad();
        let n = mesh.face_normal(FaceId::new(0));
        assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_selected_edge_keys_exclude_hidden() {
        let mut mesh = quad();
        for edge in mesh.edges_mut() {
            edge.select = true;
        }
        mesh.edges_mut()[0].hide = true;
        assert_eq!(mesh.selected_edge_keys().len(), 3);
    }

    #[test]
    fn test_average_selected_edge_length() {
        let mut mesh = quad();
        for edge in mesh.edges_mut() {
            edge.select = true;
        }
        let avg = mesh.average_selected_edge_length().unwrap();
        assert!((avg - 1.0).abs() < 1e-12);
    }
}
