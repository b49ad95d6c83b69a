//! Even spacing of loop vertices.
//!
//! Fits a spline through all vertices of a loop and redistributes them at
//! equal arc-length intervals along it, so edge lengths even out without
//! changing the loop's overall shape.

use nalgebra::Point3;

use crate::algo::displace::{apply_moves, AxisLock, Move};
use crate::algo::loops::Loop;
use crate::algo::spline::{fit_spline_with_knots, Interpolation};
use crate::error::Result;
use crate::mesh::{DerivedMapping, EditMesh};

/// Options for the space operation.
#[derive(Debug, Clone, Copy)]
pub struct SpaceOptions {
    /// Spline interpolation mode.
    pub interpolation: Interpolation,
    /// Blend factor in percent; negative applies fully.
    pub influence: f64,
    /// Axis locks applied when moving vertices.
    pub lock: AxisLock,
}

impl Default for SpaceOptions {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Cubic,
            influence: 100.0,
            lock: AxisLock::none(),
        }
    }
}

impl SpaceOptions {
    /// Set the interpolation mode.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Set the influence percentage.
    pub fn with_influence(mut self, influence: f64) -> Self {
        self.influence = influence;
        self
    }

    /// Set the axis locks.
    pub fn with_lock(mut self, lock: AxisLock) -> Self {
        self.lock = lock;
        self
    }
}

/// Compute the spacing moves for one loop.
///
/// Circular loops are closed by repeating the first vertex; the last
/// vertex of an open loop stays in place since it already sits at the end
/// of the spline.
pub fn space_moves(
    mesh: &EditMesh,
    lp: &Loop,
    interpolation: Interpolation,
) -> Result<Vec<Move>> {
    let mut verts = lp.verts.clone();
    if lp.circular {
        verts.push(verts[0]);
    }

    // Arc-length parameters and the even-spacing targets.
    let mut tknots = Vec::with_capacity(verts.len());
    let mut len_total = 0.0;
    let mut loc_prev: Option<Point3<f64>> = None;
    for &v in &verts {
        let loc = *mesh.position(v);
        if let Some(prev) = loc_prev {
            len_total += (loc - prev).norm();
        }
        tknots.push(len_total);
        loc_prev = Some(loc);
    }
    let amount = verts.len();
    let t_per_segment = len_total / (amount - 1) as f64;
    let tpoints: Vec<f64> = (0..amount).map(|i| i as f64 * t_per_segment).collect();

    let knot_locs: Vec<Point3<f64>> = verts.iter().map(|&v| *mesh.position(v)).collect();
    let spline = fit_spline_with_knots(&knot_locs, &tknots, interpolation)?;

    Ok(verts[..verts.len() - 1]
        .iter()
        .zip(&tpoints)
        .map(|(&v, &m)| Move::new(v, spline.evaluate(m)))
        .collect())
}

/// Space the given loops in place.
pub fn space(
    mesh: &mut EditMesh,
    loops: &[Loop],
    mapping: Option<&DerivedMapping>,
    opts: &SpaceOptions,
) -> Result<()> {
    let mut all_moves = Vec::new();
    for lp in loops {
        all_moves.push(space_moves(mesh, lp, opts.interpolation)?);
    }
    for moves in all_moves {
        apply_moves(mesh, mapping, &moves, opts.lock, opts.influence);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn test_space_evens_out_linear_chain() {
        // Uneven spacing along a straight line.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(0.8, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let mut mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3]]).unwrap();
        let lp = Loop::new((0..4).map(v).collect(), false);

        let opts = SpaceOptions::default().with_interpolation(Interpolation::Linear);
        space(&mut mesh, &[lp], None, &opts).unwrap();

        let step = 1.0;
        for i in 0..3 {
            let d = (mesh.position(v(i + 1)) - mesh.position(v(i))).norm();
            assert!((d - step).abs() < 1e-9);
        }
        // The endpoints do not move.
        assert_eq!(*mesh.position(v(0)), positions[0]);
        assert_eq!(*mesh.position(v(3)), positions[3]);
    }

    #[test]
    fn test_space_circular_keeps_total_count() {
        let positions = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.3, 0.8, 0.0),
            Point3::new(-1.0, 0.2, 0.0),
            Point3::new(-0.2, -1.0, 0.0),
        ];
        let mesh =
            EditMesh::from_edges(&positions, &[[0, 1], [1, 2], [2, 3], [3, 0]]).unwrap();
        let lp = Loop::new((0..4).map(v).collect(), true);
        let moves = space_moves(&mesh, &lp, Interpolation::Cubic).unwrap();
        // Every loop vertex gets a target, the closing duplicate does not.
        assert_eq!(moves.len(), 4);
    }

    #[test]
    fn test_space_partial_influence_moves_halfway() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.2, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let mut mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2]]).unwrap();
        let lp = Loop::new((0..3).map(v).collect(), false);
        let opts = SpaceOptions::default()
            .with_interpolation(Interpolation::Linear)
            .with_influence(50.0);
        space(&mut mesh, &[lp], None, &opts).unwrap();
        // Full influence would land at x = 1.0; half stops at 0.6.
        assert!((mesh.position(v(1)).x - 0.6).abs() < 1e-9);
    }
}
