//! Topological edit primitives.
//!
//! These are the mesh surgery operations bevel reconstruction needs: dissolve
//! a set of vertices into one merged face, split a face by connecting two of
//! its vertices, subdivide an edge, and weld vertices to a point. Removed
//! vertices stay in the arena as orphans (nothing references them) so vertex
//! ids remain stable for the duration of one operation; the host compacts on
//! commit.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;

use crate::error::{LoopError, Result};
use crate::mesh::{Edge, EdgeKey, EditMesh, Face, VertexId};

impl EditMesh {
    /// Dissolve the given vertices, merging every face that touches them into
    /// a single face bounded by the surviving edges.
    ///
    /// The merged region must be a disk (every surviving boundary vertex has
    /// exactly two boundary edges); otherwise the mesh is left unchanged and
    /// an error is returned. Edges incident to dissolved vertices and edges
    /// interior to the region are removed.
    pub fn dissolve_verts(&mut self, verts: &[VertexId]) -> Result<()> {
        let dead: HashSet<VertexId> = verts.iter().copied().collect();
        if dead.is_empty() {
            return Ok(());
        }

        let region: Vec<usize> = self
            .faces()
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.hide && f.verts.iter().any(|v| dead.contains(v)))
            .map(|(i, _)| i)
            .collect();

        if region.is_empty() {
            self.edges_mut_vec()
                .retain(|e| !dead.contains(&e.verts[0]) && !dead.contains(&e.verts[1]));
            return Ok(());
        }

        // Count how many region faces use each edge; edges used once with two
        // surviving endpoints form the merged boundary.
        let mut usage: HashMap<EdgeKey, usize> = HashMap::new();
        for &fi in &region {
            let verts = &self.faces()[fi].verts;
            for i in 0..verts.len() {
                let key = EdgeKey::new(verts[i], verts[(i + 1) % verts.len()]);
                *usage.entry(key).or_insert(0) += 1;
            }
        }

        let mut adjacency: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        for (&key, &count) in &usage {
            if count == 1 && !dead.contains(&key.lo()) && !dead.contains(&key.hi()) {
                adjacency.entry(key.lo()).or_default().push(key.hi());
                adjacency.entry(key.hi()).or_default().push(key.lo());
            }
        }
        if adjacency.is_empty() || adjacency.values().any(|n| n.len() != 2) {
            return Err(LoopError::invalid_selection(
                "dissolve region is not a disk",
            ));
        }

        // Orient the merged boundary like the region face that holds its
        // first edge.
        let (&start, neighbors) = adjacency.iter().next().ok_or(LoopError::EmptyMesh)?;
        let mut second = neighbors[0];
        'orient: for &fi in &region {
            let verts = &self.faces()[fi].verts;
            for i in 0..verts.len() {
                let a = verts[i];
                let b = verts[(i + 1) % verts.len()];
                if a == start && adjacency[&start].contains(&b) {
                    second = b;
                    break 'orient;
                }
                if b == start && adjacency[&start].contains(&a) {
                    second = *adjacency[&start].iter().find(|&&n| n != a).unwrap_or(&a);
                    break 'orient;
                }
            }
        }

        let mut boundary = vec![start, second];
        loop {
            let prev = boundary[boundary.len() - 2];
            let here = boundary[boundary.len() - 1];
            let next = *adjacency[&here]
                .iter()
                .find(|&&n| n != prev)
                .ok_or_else(|| LoopError::invalid_selection("open dissolve boundary"))?;
            if next == start {
                break;
            }
            if boundary.contains(&next) {
                return Err(LoopError::invalid_selection(
                    "dissolve boundary is self-intersecting",
                ));
            }
            boundary.push(next);
        }
        if boundary.len() < 3 {
            return Err(LoopError::invalid_selection("dissolve boundary too short"));
        }

        let select = region.iter().any(|&fi| self.faces()[fi].select);

        let region_set: HashSet<usize> = region.iter().copied().collect();
        let faces = self.faces_mut_vec();
        let mut keep = 0;
        for i in 0..faces.len() {
            if !region_set.contains(&i) {
                faces.swap(keep, i);
                keep += 1;
            }
        }
        faces.truncate(keep);
        faces.push(Face {
            verts: boundary,
            select,
            hide: false,
        });

        self.edges_mut_vec().retain(|e| {
            let key = e.key();
            if dead.contains(&key.lo()) || dead.contains(&key.hi()) {
                return false;
            }
            usage.get(&key) != Some(&2)
        });
        for &v in &dead {
            self.vertex_mut(v).select = false;
        }
        Ok(())
    }

    /// Connect two vertices of a shared face, splitting it in two.
    ///
    /// Returns the key of the new edge. Fails if no visible face contains
    /// both vertices at non-adjacent positions.
    pub fn connect_verts(&mut self, a: VertexId, b: VertexId) -> Result<EdgeKey> {
        let mut found = None;
        for (fi, face) in self.faces().iter().enumerate() {
            if face.hide {
                continue;
            }
            let pa = face.verts.iter().position(|&v| v == a);
            let pb = face.verts.iter().position(|&v| v == b);
            if let (Some(pa), Some(pb)) = (pa, pb) {
                let n = face.verts.len();
                let adjacent = (pa + 1) % n == pb || (pb + 1) % n == pa;
                if !adjacent {
                    found = Some((fi, pa, pb));
                    break;
                }
            }
        }
        let (fi, pa, pb) = found.ok_or_else(|| {
            LoopError::invalid_selection("vertices share no face to connect across")
        })?;

        let face = self.faces()[fi].clone();
        let (lo, hi) = if pa < pb { (pa, pb) } else { (pb, pa) };
        let first: Vec<VertexId> = face.verts[lo..=hi].to_vec();
        let mut second: Vec<VertexId> = face.verts[hi..].to_vec();
        second.extend_from_slice(&face.verts[..=lo]);

        let faces = self.faces_mut_vec();
        faces[fi] = Face {
            verts: first,
            select: face.select,
            hide: false,
        };
        faces.push(Face {
            verts: second,
            select: face.select,
            hide: false,
        });

        let key = EdgeKey::new(a, b);
        self.edges_mut_vec().push(Edge {
            verts: key.verts(),
            select: false,
            hide: false,
        });
        Ok(key)
    }

    /// Split the edge `key` at fraction `t` measured from `from`, returning
    /// the new vertex and the two replacement edge keys
    /// `(from→new, new→other)`.
    ///
    /// The new vertex is inserted into every face that uses the edge. The new
    /// edges inherit the original selection flag.
    pub fn split_edge(
        &mut self,
        key: EdgeKey,
        from: VertexId,
        t: f64,
    ) -> Result<(VertexId, EdgeKey, EdgeKey)> {
        let other = key
            .other(from)
            .ok_or_else(|| LoopError::invalid_selection("split vertex not on edge"))?;
        let index = self
            .edges()
            .iter()
            .position(|e| e.key() == key && !e.hide)
            .ok_or_else(|| LoopError::invalid_selection("edge to split does not exist"))?;
        let select = self.edges()[index].select;

        let position = {
            let p0 = self.position(from);
            let p1 = self.position(other);
            Point3::from(p0.coords + (p1 - p0) * t)
        };
        let new_vert = self.add_vertex(position);
        self.vertex_mut(new_vert).select = select;

        let near = EdgeKey::new(from, new_vert);
        let far = EdgeKey::new(new_vert, other);
        {
            let edges = self.edges_mut_vec();
            edges[index] = Edge {
                verts: far.verts(),
                select,
                hide: false,
            };
            edges.push(Edge {
                verts: near.verts(),
                select,
                hide: false,
            });
        }

        for face in self.faces_mut_vec() {
            let n = face.verts.len();
            for i in 0..n {
                let a = face.verts[i];
                let b = face.verts[(i + 1) % n];
                if EdgeKey::new(a, b) == key {
                    face.verts.insert(i + 1, new_vert);
                    break;
                }
            }
        }
        Ok((new_vert, near, far))
    }

    /// Weld `verts` into the first of them, placed at `position`.
    ///
    /// All edge and face references to the other vertices are rewritten;
    /// collapsed edges and degenerate faces are dropped. The welded-away
    /// vertices stay in the arena as orphans.
    pub fn point_merge(&mut self, verts: &[VertexId], position: Point3<f64>) -> Result<()> {
        let (&target, rest) = verts
            .split_first()
            .ok_or_else(|| LoopError::invalid_selection("nothing to merge"))?;
        let gone: HashSet<VertexId> = rest.iter().copied().collect();

        self.set_position(target, position);

        for edge in self.edges_mut_vec() {
            for v in &mut edge.verts {
                if gone.contains(v) {
                    *v = target;
                }
            }
        }
        self.edges_mut_vec().retain(|e| e.verts[0] != e.verts[1]);
        // Welding can alias two edges onto the same key.
        let mut seen = HashSet::new();
        self.edges_mut_vec().retain(|e| seen.insert(e.key()));

        for face in self.faces_mut_vec() {
            for v in &mut face.verts {
                if gone.contains(v) {
                    *v = target;
                }
            }
            face.verts.dedup();
            while face.verts.len() > 1 && face.verts.first() == face.verts.last() {
                face.verts.pop();
            }
        }
        self.faces_mut_vec().retain(|f| f.verts.len() >= 3);

        for &v in &gone {
            self.vertex_mut(v).select = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Beveled corner: strip of three quads over vertices 0..=7, with a
    /// two-segment bevel ring 1-2-5 between the rails.
    ///
    /// ```text
    /// 3---2---7
    /// |   |   |
    /// 0---1---4   plus ring vert 5 between faces
    /// ```
    fn bevel_strip() -> EditMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.3, 0.5, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.3, 1.5, 0.0),
        ];
        // Two bevel quads between ring 1-2-5 and the rails 0-3 / 4-6.
        EditMesh::from_polygons(
            &positions,
            &[vec![0, 1, 2, 3], vec![3, 2, 5], vec![1, 4, 6, 2], vec![2, 6, 5]],
        )
        .unwrap()
    }

    #[test]
    fn test_split_edge() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let mut mesh = EditMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        let key = EdgeKey::new(VertexId::new(0), VertexId::new(1));
        let (v, near, far) = mesh.split_edge(key, VertexId::new(0), 0.25).unwrap();

        assert!((mesh.position(v) - Point3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
        assert!(near.contains(VertexId::new(0)) && near.contains(v));
        assert!(far.contains(v) && far.contains(VertexId::new(1)));
        assert_eq!(mesh.face(crate::mesh::FaceId::new(0)).verts.len(), 5);
        assert_eq!(mesh.num_edges(), 5);
    }

    #[test]
    fn test_connect_verts_splits_face() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = EditMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        let key = mesh.connect_verts(VertexId::new(0), VertexId::new(2)).unwrap();
        assert_eq!(key, EdgeKey::new(VertexId::new(0), VertexId::new(2)));
        assert_eq!(mesh.num_faces(), 2);
        assert!(mesh.faces().iter().all(|f| f.verts.len() == 3));
    }

    #[test]
    fn test_connect_adjacent_fails() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = EditMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).unwrap();
        assert!(mesh.connect_verts(VertexId::new(0), VertexId::new(1)).is_err());
    }

    #[test]
    fn test_dissolve_ring_interior() {
        let mut mesh = bevel_strip();
        // Dissolving ring-interior vertex 2 merges the four surrounding
        // faces into one.
        mesh.dissolve_verts(&[VertexId::new(2)]).unwrap();
        assert_eq!(mesh.num_faces(), 1);
        let merged = &mesh.faces()[0];
        assert_eq!(merged.verts.len(), 6);
        assert!(!merged.verts.contains(&VertexId::new(2)));
        // Edges incident to 2 are gone.
        assert!(mesh
            .edges()
            .iter()
            .all(|e| !e.key().contains(VertexId::new(2))));
        // Connecting the ring boundary restores two faces.
        mesh.connect_verts(VertexId::new(1), VertexId::new(5)).unwrap();
        assert_eq!(mesh.num_faces(), 2);
    }

    #[test]
    fn test_point_merge() {
        let mut mesh = bevel_strip();
        let ring = [VertexId::new(1), VertexId::new(2), VertexId::new(5)];
        mesh.point_merge(&ring, Point3::new(1.5, 0.75, 0.0)).unwrap();
        assert!((mesh.position(VertexId::new(1)) - Point3::new(1.5, 0.75, 0.0)).norm() < 1e-12);
        // The two bevel triangles collapse away.
        assert_eq!(mesh.num_faces(), 2);
        for face in mesh.faces() {
            assert!(!face.verts.contains(&VertexId::new(2)));
            assert!(!face.verts.contains(&VertexId::new(5)));
        }
    }
}
