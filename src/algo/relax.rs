//! Loop relaxation.
//!
//! Smooths loops by splitting each one into two interleaved groups of
//! alternating vertices, fitting a spline through one group (the knots) and
//! moving the other group (the points) halfway towards its position on the
//! spline. Repeating the process with the groups swapped relaxes the whole
//! loop without shrinking it the way plain averaging would.
//!
//! Loops are independent, so the per-iteration spline work can run on a
//! rayon thread pool.

use rayon::prelude::*;

use crate::algo::displace::{apply_moves, AxisLock, Move};
use crate::algo::loops::Loop;
use crate::algo::spline::{fit_spline_with_knots, Interpolation};
use crate::error::Result;
use crate::mesh::{DerivedMapping, EditMesh, VertexId};

/// Fixed iteration steps for relaxation strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelaxIterations {
    /// One pass.
    #[default]
    One,
    /// Three passes.
    Three,
    /// Five passes.
    Five,
    /// Ten passes.
    Ten,
}

impl RelaxIterations {
    /// Number of passes.
    pub fn count(self) -> usize {
        match self {
            RelaxIterations::One => 1,
            RelaxIterations::Three => 3,
            RelaxIterations::Five => 5,
            RelaxIterations::Ten => 10,
        }
    }
}

/// Options for the relax operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxOptions {
    /// Spline interpolation mode.
    pub interpolation: Interpolation,
    /// Number of smoothing passes.
    pub iterations: RelaxIterations,
    /// Parametrize midpoints evenly instead of by arc length.
    pub regular: bool,
    /// Compute loop groups on the rayon thread pool.
    pub parallel: bool,
}

impl RelaxOptions {
    /// Set the interpolation mode.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Set the number of passes.
    pub fn with_iterations(mut self, iterations: RelaxIterations) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable regular parametrization.
    pub fn with_regular(mut self, regular: bool) -> Self {
        self.regular = regular;
        self
    }

    /// Force sequential execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Enable parallel execution.
    pub fn with_parallel(mut self) -> Self {
        self.parallel = true;
        self
    }
}

/// One alternating knot/point group of a loop.
#[derive(Debug, Clone)]
pub struct RelaxGroup {
    /// Spline knots.
    pub knots: Vec<VertexId>,
    /// Vertices moved towards the spline.
    pub points: Vec<VertexId>,
}

/// Split loops into alternating knot/point groups.
///
/// The extension pattern depends on parity: circular loops with an even
/// vertex count wrap the list so both groups close; odd circular loops
/// close one group and leave the other offset; open loops keep their
/// endpoints as knots.
pub fn relax_groups(loops: &[Loop]) -> Vec<RelaxGroup> {
    let mut groups = Vec::new();
    for lp in loops {
        let extend: [usize; 6] = if lp.circular {
            if lp.verts.len() % 2 == 1 {
                [0, 1, 0, 1, 0, 1]
            } else {
                [1, 0, 0, 1, 1, 2]
            }
        } else {
            [0, 0, 0, 1, 1, 2]
        };

        let mut verts = lp.verts.clone();
        let mut knots: [Vec<VertexId>; 2] = [Vec::new(), Vec::new()];
        let mut points: [Vec<VertexId>; 2] = [Vec::new(), Vec::new()];
        for j in 0..2 {
            if extend[j] == 1 {
                let mut extended = vec![verts[verts.len() - 1]];
                extended.extend_from_slice(&verts);
                extended.push(verts[0]);
                verts = extended;
            }
            let mut i = extend[2 + 2 * j];
            while i < verts.len() {
                knots[j].push(verts[i]);
                i += 2;
            }
            let mut i = extend[3 + 2 * j];
            while i < verts.len() {
                let v = verts[i];
                i += 2;
                if v == verts[verts.len() - 1] && !lp.circular {
                    continue;
                }
                if points[j].is_empty() || v != points[j][0] {
                    points[j].push(v);
                }
            }
            if lp.circular && knots[j].first() != knots[j].last() {
                knots[j].push(knots[j][0]);
            }
        }

        let keep_second = !points[1].is_empty();
        let [k0, k1] = knots;
        let [p0, p1] = points;
        groups.push(RelaxGroup {
            knots: k0,
            points: p0,
        });
        if keep_second {
            groups.push(RelaxGroup {
                knots: k1,
                points: p1,
            });
        }
    }
    groups
}

/// Arc-length parameters for one group's knots and points.
///
/// With `regular` the point parameters are forced to the midpoints of
/// their neighboring knot parameters.
fn group_t(mesh: &EditMesh, group: &RelaxGroup, regular: bool) -> (Vec<f64>, Vec<f64>) {
    let amount = group.knots.len() + group.points.len();
    let mut tknots = Vec::with_capacity(group.knots.len());
    let mut tpoints = Vec::with_capacity(group.points.len());
    let mut len_total = 0.0;
    let mut loc_prev: Option<nalgebra::Point3<f64>> = None;
    for j in 0..amount {
        let (is_knot, v) = if j % 2 == 0 {
            (true, group.knots[j / 2])
        } else if j == amount - 1 {
            (true, group.knots[group.knots.len() - 1])
        } else {
            (false, group.points[j / 2])
        };
        let loc = *mesh.position(v);
        if let Some(prev) = loc_prev {
            len_total += (loc - prev).norm();
        }
        if is_knot {
            tknots.push(len_total);
        } else {
            tpoints.push(len_total);
        }
        loc_prev = Some(loc);
    }

    if regular {
        tpoints = (0..group.points.len())
            .map(|p| (tknots[p] + tknots[p + 1]) / 2.0)
            .collect();
    }
    (tknots, tpoints)
}

/// One relaxation pass over a single group.
fn group_moves(
    mesh: &EditMesh,
    group: &RelaxGroup,
    interpolation: Interpolation,
    regular: bool,
) -> Result<Vec<Move>> {
    let (tknots, tpoints) = group_t(mesh, group, regular);
    let knot_locs: Vec<nalgebra::Point3<f64>> =
        group.knots.iter().map(|&k| *mesh.position(k)).collect();
    let spline = fit_spline_with_knots(&knot_locs, &tknots, interpolation)?;

    Ok(group
        .points
        .iter()
        .zip(&tpoints)
        .map(|(&p, &m)| {
            let on_spline = spline.evaluate(m);
            let halfway = nalgebra::center(mesh.position(p), &on_spline);
            Move::new(p, halfway)
        })
        .collect())
}

/// Relax the given loops in place.
pub fn relax(
    mesh: &mut EditMesh,
    loops: &[Loop],
    mapping: Option<&DerivedMapping>,
    opts: &RelaxOptions,
) -> Result<()> {
    let groups = relax_groups(loops);
    for _ in 0..opts.iterations.count() {
        let snapshot: &EditMesh = mesh;
        let moves: Vec<Vec<Move>> = if opts.parallel {
            groups
                .par_iter()
                .map(|g| group_moves(snapshot, g, opts.interpolation, opts.regular))
                .collect::<Result<_>>()?
        } else {
            groups
                .iter()
                .map(|g| group_moves(snapshot, g, opts.interpolation, opts.regular))
                .collect::<Result<_>>()?
        };
        for group in moves {
            apply_moves(mesh, mapping, &group, AxisLock::none(), -1.0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn test_groups_open_loop() {
        let lp = Loop::new((0..5).map(v).collect(), false);
        let groups = relax_groups(&[lp]);
        assert_eq!(groups.len(), 2);
        // First group: knots at even indices, points at odd.
        assert_eq!(groups[0].knots, vec![v(0), v(2), v(4)]);
        assert_eq!(groups[0].points, vec![v(1), v(3)]);
        // Second group swaps the roles, endpoints stay knots.
        assert_eq!(groups[1].knots, vec![v(1), v(3)]);
        assert_eq!(groups[1].points, vec![v(2)]);
    }

    #[test]
    fn test_groups_circular_even() {
        let lp = Loop::new((0..6).map(v).collect(), true);
        let groups = relax_groups(&[lp]);
        assert_eq!(groups.len(), 2);
        for g in &groups {
            // Circular groups are closed.
            assert_eq!(g.knots.first(), g.knots.last());
        }
    }

    #[test]
    fn test_groups_circular_odd() {
        let lp = Loop::new((0..5).map(v).collect(), true);
        let groups = relax_groups(&[lp]);
        assert_eq!(groups.len(), 2);
        for g in &groups {
            assert_eq!(g.knots.first(), g.knots.last());
        }
    }

    #[test]
    fn test_relax_reduces_zigzag() {
        let positions: Vec<Point3<f64>> = (0..7)
            .map(|i| Point3::new(i as f64, if i % 2 == 0 { 0.0 } else { 1.0 }, 0.0))
            .collect();
        let mut mesh = EditMesh::from_edges(
            &positions,
            &[[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 6]],
        )
        .unwrap();
        let lp = Loop::new((0..7).map(v).collect(), false);

        let spread_before: f64 = (0..7)
            .map(|i| mesh.position(v(i)).y)
            .fold(f64::NEG_INFINITY, f64::max)
            - (0..7)
                .map(|i| mesh.position(v(i)).y)
                .fold(f64::INFINITY, f64::min);
        relax(&mut mesh, &[lp], None, &RelaxOptions::default()).unwrap();
        let spread_after: f64 = (0..7)
            .map(|i| mesh.position(v(i)).y)
            .fold(f64::NEG_INFINITY, f64::max)
            - (0..7)
                .map(|i| mesh.position(v(i)).y)
                .fold(f64::INFINITY, f64::min);
        assert!(spread_after < spread_before);
        // Endpoints never move.
        assert_eq!(*mesh.position(v(0)), positions[0]);
        assert_eq!(*mesh.position(v(6)), positions[6]);
    }

    #[test]
    fn test_more_iterations_relax_further() {
        let positions: Vec<Point3<f64>> = (0..7)
            .map(|i| Point3::new(i as f64, if i % 2 == 0 { 0.0 } else { 1.0 }, 0.0))
            .collect();
        let edges = [[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 6]];
        let lp = Loop::new((0..7).map(v).collect(), false);

        let mut once = EditMesh::from_edges(&positions, &edges).unwrap();
        relax(&mut once, &[lp.clone()], None, &RelaxOptions::default()).unwrap();
        let mut many = EditMesh::from_edges(&positions, &edges).unwrap();
        relax(
            &mut many,
            &[lp],
            None,
            &RelaxOptions::default().with_iterations(RelaxIterations::Ten),
        )
        .unwrap();

        let spread = |mesh: &EditMesh| -> f64 {
            (0..7)
                .map(|i| mesh.position(v(i)).y)
                .fold(f64::NEG_INFINITY, f64::max)
                - (0..7)
                    .map(|i| mesh.position(v(i)).y)
                    .fold(f64::INFINITY, f64::min)
        };
        assert!(spread(&many) < spread(&once));
    }
}
