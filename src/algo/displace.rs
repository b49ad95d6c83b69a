//! Applying displacement lists to a mesh.
//!
//! Operations compute their results as a list of [`Move`]s and hand them to
//! [`apply_moves`], which blends them into the mesh honoring axis locks,
//! influence, and the mapping back from a mirror-derived mesh to the real
//! one.

use nalgebra::Point3;

use crate::mesh::{DerivedMapping, EditMesh, VertexId};

/// A target position for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    /// The vertex to move. For derived meshes this is the derived index.
    pub vert: VertexId,
    /// The new position.
    pub position: Point3<f64>,
}

impl Move {
    /// Construct a move.
    pub fn new(vert: VertexId, position: Point3<f64>) -> Self {
        Self { vert, position }
    }
}

/// Per-axis movement locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisLock {
    /// Do not move along x.
    pub x: bool,
    /// Do not move along y.
    pub y: bool,
    /// Do not move along z.
    pub z: bool,
}

impl AxisLock {
    /// No axes locked.
    pub fn none() -> Self {
        Self::default()
    }

    fn locked(&self, axis: usize) -> bool {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

/// Apply a displacement list to the mesh.
///
/// `mapping` translates derived vertex indices back to real ones; moves of
/// purely virtual vertices are dropped. Locked axes keep their current
/// coordinate. `influence` blends between the current position (`0`) and
/// the target (`100`); a negative influence applies the target fully.
pub fn apply_moves(
    mesh: &mut EditMesh,
    mapping: Option<&DerivedMapping>,
    moves: &[Move],
    lock: AxisLock,
    influence: f64,
) {
    for mv in moves {
        let vert = match mapping {
            Some(mapping) => match mapping.original(mv.vert) {
                Some(v) => v,
                None => continue,
            },
            None => mv.vert,
        };
        let old = *mesh.position(vert);
        let mut delta = mv.position - old;
        for axis in 0..3 {
            if lock.locked(axis) {
                delta[axis] = 0.0;
            }
        }
        let new = if influence < 0.0 {
            old + delta
        } else {
            old + delta * (influence / 100.0)
        };
        mesh.set_position(vert, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_mesh() -> EditMesh {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        EditMesh::from_edges(&positions, &[[0, 1]]).unwrap()
    }

    #[test]
    fn test_full_influence() {
        let mut mesh = line_mesh();
        let target = Point3::new(2.0, 3.0, 4.0);
        apply_moves(
            &mut mesh,
            None,
            &[Move::new(VertexId::new(0), target)],
            AxisLock::none(),
            -1.0,
        );
        assert_eq!(*mesh.position(VertexId::new(0)), target);
    }

    #[test]
    fn test_partial_influence() {
        let mut mesh = line_mesh();
        apply_moves(
            &mut mesh,
            None,
            &[Move::new(VertexId::new(0), Point3::new(2.0, 0.0, 0.0))],
            AxisLock::none(),
            50.0,
        );
        assert_eq!(*mesh.position(VertexId::new(0)), Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_axis_lock() {
        let mut mesh = line_mesh();
        apply_moves(
            &mut mesh,
            None,
            &[Move::new(VertexId::new(0), Point3::new(5.0, 5.0, 5.0))],
            AxisLock {
                x: true,
                y: false,
                z: true,
            },
            -1.0,
        );
        assert_eq!(*mesh.position(VertexId::new(0)), Point3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_virtual_vertices_skipped() {
        let mut mesh = line_mesh();
        // Mapping where derived vertex 1 has no real counterpart.
        let derived = mesh.clone();
        let mut original = mesh.clone();
        original.set_position(VertexId::new(1), Point3::new(9.0, 9.0, 9.0));
        let mapping = DerivedMapping::build(&original, &derived, false);

        apply_moves(
            &mut mesh,
            Some(&mapping),
            &[Move::new(VertexId::new(1), Point3::new(7.0, 7.0, 7.0))],
            AxisLock::none(),
            -1.0,
        );
        // No real vertex matched, nothing moves.
        assert_eq!(*mesh.position(VertexId::new(1)), Point3::new(1.0, 0.0, 0.0));
    }
}
