//! Connected loop extraction.
//!
//! Groups a set of selected edges into ordered vertex loops by walking the
//! vertex-to-vertex connection graph. Branched selections are split wherever
//! the walk happens to consume edges; each edge ends up in exactly one loop.
//!
//! # Algorithm
//!
//! Edges are converted to a bidirectional adjacency map. Starting from an
//! arbitrary vertex, the walk extends the loop forward, consuming each
//! traversed edge in both directions. At a dead end the loop is reversed
//! once and extended the other way. A loop is circular when its two ends
//! are still connected by an unconsumed edge.

use std::collections::HashMap;

use crate::error::{LoopError, Result};
use crate::mesh::{DerivedMapping, EdgeKey, EditMesh, Topology, VertexId};

/// How the input loops of an operation are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Use the selected edges directly.
    #[default]
    Selected,
    /// Propagate the selection to all parallel loops.
    Parallel,
}

/// An ordered run of vertices, optionally closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    /// The vertices in loop order. For circular loops the closing edge
    /// between the last and first vertex is implied, not repeated.
    pub verts: Vec<VertexId>,
    /// Whether the loop closes back on itself.
    pub circular: bool,
}

impl Loop {
    /// Construct a loop from vertices and a circular flag.
    pub fn new(verts: Vec<VertexId>, circular: bool) -> Self {
        Self { verts, circular }
    }

    /// The edge keys along the loop, including the closing edge for
    /// circular loops.
    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        let mut keys: Vec<EdgeKey> = self
            .verts
            .windows(2)
            .map(|w| EdgeKey::new(w[0], w[1]))
            .collect();
        if self.circular && self.verts.len() > 2 {
            keys.push(EdgeKey::new(
                self.verts[self.verts.len() - 1],
                self.verts[0],
            ));
        }
        keys
    }
}

/// Insertion-ordered vertex adjacency built from edge keys.
struct VertGraph {
    verts: HashMap<VertexId, Vec<VertexId>>,
    order: Vec<VertexId>,
}

impl VertGraph {
    fn new(edge_keys: &[EdgeKey]) -> Self {
        let mut verts: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        let mut order = Vec::new();
        for key in edge_keys {
            for v in key.verts() {
                let entry = verts.entry(v).or_insert_with(|| {
                    order.push(v);
                    Vec::new()
                });
                let other = key.other(v).unwrap_or(v);
                if !entry.contains(&other) {
                    entry.push(other);
                }
            }
        }
        Self { verts, order }
    }

    fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    fn first(&self) -> Option<VertexId> {
        self.order.iter().copied().find(|v| self.verts.contains_key(v))
    }

    fn neighbors(&self, v: VertexId) -> Option<&Vec<VertexId>> {
        self.verts.get(&v)
    }

    /// Remove the connection `a -> b`, dropping `a` when it empties.
    fn consume(&mut self, a: VertexId, b: VertexId) {
        if let Some(neighbors) = self.verts.get_mut(&a) {
            neighbors.retain(|&n| n != b);
            if neighbors.is_empty() {
                self.verts.remove(&a);
            }
        }
    }
}

/// Group `edge_keys` into connected loops.
///
/// Every edge is assigned to exactly one loop. Branches split arbitrarily
/// at the walk order.
pub fn connected_loops(edge_keys: &[EdgeKey]) -> Vec<Loop> {
    let mut graph = VertGraph::new(edge_keys);
    let mut loops = Vec::new();

    while !graph.is_empty() {
        let start = match graph.first() {
            Some(v) => v,
            None => break,
        };
        let mut verts = vec![start];
        let mut growing = true;
        let mut flipped = false;

        while growing {
            let tail = verts[verts.len() - 1];
            let next = graph
                .neighbors(tail)
                .and_then(|ns| ns.iter().copied().find(|n| !verts.contains(n)));
            match next {
                Some(next_vert) => {
                    graph.consume(tail, next_vert);
                    graph.consume(next_vert, tail);
                    verts.push(next_vert);
                }
                None => {
                    if !flipped {
                        verts.reverse();
                        flipped = true;
                    } else {
                        growing = false;
                    }
                }
            }
        }

        // Circular when the two ends are still connected.
        let head = verts[0];
        let tail = verts[verts.len() - 1];
        let circular = graph
            .neighbors(head)
            .map(|ns| ns.contains(&tail))
            .unwrap_or(false);
        if circular {
            graph.consume(head, tail);
            graph.consume(tail, head);
        }

        loops.push(Loop::new(verts, circular));
    }

    loops
}

/// Filter out loops no operation can work with.
///
/// Rejects loops with fewer than three vertices, loops consisting entirely
/// of mirror-derived vertices, and loops where all vertices are stacked at
/// one location.
pub fn check_loops(
    loops: Vec<Loop>,
    mesh: &EditMesh,
    mapping: Option<&DerivedMapping>,
) -> Vec<Loop> {
    loops
        .into_iter()
        .filter(|lp| {
            if lp.verts.len() < 3 {
                return false;
            }
            if let Some(mapping) = mapping {
                if lp.verts.iter().all(|&v| mapping.original(v).is_none()) {
                    return false;
                }
            }
            let stacked = lp.verts.windows(2).all(|w| {
                (mesh.position(w[0]) - mesh.position(w[1])).norm() <= 1e-6
            });
            !stacked
        })
        .collect()
}

/// Gather the input loops of an operation from the current edge selection.
///
/// With [`InputMode::Parallel`] the connected loops are propagated across
/// their neighboring face strips first. Returns an error when no valid
/// loop remains after filtering.
pub fn find_loops(
    mesh: &EditMesh,
    topo: &Topology,
    mode: InputMode,
    mapping: Option<&DerivedMapping>,
) -> Result<Vec<Loop>> {
    let keys = mesh.selected_edge_keys();
    if keys.is_empty() {
        return Err(LoopError::invalid_selection("no edges are selected"));
    }
    let mut loops = connected_loops(&keys);
    if mode == InputMode::Parallel {
        loops = crate::algo::parallel::parallel_loops(mesh, topo, loops);
    }
    let loops = check_loops(loops, mesh, mapping);
    if loops.is_empty() {
        return Err(LoopError::invalid_selection(
            "selection contains no usable loop",
        ));
    }
    Ok(loops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn key(a: usize, b: usize) -> EdgeKey {
        EdgeKey::new(VertexId::new(a), VertexId::new(b))
    }

    #[test]
    fn test_open_chain() {
        let loops = connected_loops(&[key(0, 1), key(1, 2), key(2, 3)]);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].verts.len(), 4);
        assert!(!loops[0].circular);
        // Consecutive loop vertices are connected in the input.
        let input = [key(0, 1), key(1, 2), key(2, 3)];
        for w in loops[0].verts.windows(2) {
            assert!(input.contains(&EdgeKey::new(w[0], w[1])));
        }
    }

    #[test]
    fn test_circular_loop() {
        let loops = connected_loops(&[key(0, 1), key(1, 2), key(2, 3), key(3, 0)]);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].verts.len(), 4);
        assert!(loops[0].circular);
    }

    #[test]
    fn test_two_components() {
        let loops = connected_loops(&[key(0, 1), key(1, 2), key(5, 6), key(6, 7)]);
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|lp| lp.verts.len() == 3 && !lp.circular));
    }

    #[test]
    fn test_every_edge_consumed_on_branch() {
        // T-junction: 0-1-2 with a branch 1-3.
        let input = [key(0, 1), key(1, 2), key(1, 3)];
        let loops = connected_loops(&input);
        let total: usize = loops.iter().map(|lp| lp.edge_keys().len()).sum();
        assert_eq!(total, input.len());
    }

    #[test]
    fn test_check_loops_rejects_short_and_stacked() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3]]).unwrap();

        let short = Loop::new(vec![VertexId::new(0), VertexId::new(1)], false);
        let stacked = Loop::new(
            vec![VertexId::new(0), VertexId::new(1), VertexId::new(2)],
            false,
        );
        let valid = Loop::new(
            vec![VertexId::new(1), VertexId::new(2), VertexId::new(3)],
            false,
        );
        let result = check_loops(vec![short, stacked, valid.clone()], &mesh, None);
        assert_eq!(result, vec![valid]);
    }

    #[test]
    fn test_find_loops_requires_selection() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let mesh = EditMesh::from_edges(&positions, &[[0, 1]]).unwrap();
        let topo = Topology::build(&mesh);
        let result = find_loops(&mesh, &topo, InputMode::Selected, None);
        assert!(matches!(result, Err(LoopError::InvalidSelection { .. })));
    }
}
