//! # Loopkit
//!
//! Interactive loop editing for polygon meshes.
//!
//! Loopkit extracts edge loops from a selection, fits analytic shapes
//! through them, and computes the vertex displacements that reshape the
//! mesh: circle fitting, flattening, spline-based curve smoothing,
//! relaxation, even spacing, and bevel reconstruction on both meshes and
//! curve splines.
//!
//! ## Features
//!
//! - **Loop extraction**: connected selections or parallel propagation
//!   across face rings, with mirror-modifier aware derived meshes
//! - **Shape fitting**: best-fit planes, circles (Gauss-Newton), and
//!   natural cubic or linear splines
//! - **Smoothing**: curve interpolation over a selection, iterative
//!   relaxation, and arc-length respacing
//! - **Bevel reconstruction**: recover the sharp corner behind an existing
//!   bevel and rebuild it with a new width, segment count, or profile
//!
//! ## Quick Start
//!
//! ```
//! use loopkit::prelude::*;
//! use nalgebra::Point3;
//!
//! // An unevenly spaced polyline.
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(0.3, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//! ];
//! let mut mesh = EditMesh::from_edges(&positions, &[[0, 1], [1, 2]]).unwrap();
//!
//! // Space its vertices evenly along the fitted spline.
//! let lp = Loop::new((0..3).map(VertexId::new).collect(), false);
//! space(&mut mesh, &[lp], None, &SpaceOptions::default()).unwrap();
//!
//! assert!((mesh.position(VertexId::new(1)).x - 1.0).abs() < 1e-9);
//! ```
//!
//! Operations follow a compute-then-apply split: tools return [`Move`]
//! lists (`prelude::Move`) that [`apply_moves`](prelude::apply_moves)
//! commits with optional axis locks, an influence blend, and a mapping back
//! from a mirror-derived mesh.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod cache;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use loopkit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::circle::{circle_input, circle_moves, CircleFitMethod, CircleOptions};
    pub use crate::algo::curve::{curve_input, curve_moves, CurveOptions, Restriction};
    pub use crate::algo::curve_rebevel::{
        chain_segments, curve_bevel, curve_rebevel, CurveBevelOptions, CurvePoint,
        CurveRebevelOptions, CurveSpline,
    };
    pub use crate::algo::displace::{apply_moves, AxisLock, Move};
    pub use crate::algo::flatten::{flatten_input, flatten_moves};
    pub use crate::algo::loops::{find_loops, InputMode, Loop};
    pub use crate::algo::plane::{fit_plane, Plane, PlaneFitMethod};
    pub use crate::algo::rebevel::{rebevel, RebevelOptions, ResizeMode};
    pub use crate::algo::relax::{relax, RelaxIterations, RelaxOptions};
    pub use crate::algo::space::{space, SpaceOptions};
    pub use crate::algo::spline::{fit_spline, Interpolation, Spline};
    pub use crate::cache::{CachedLoops, Fingerprint, ToolCache, ToolKind};
    pub use crate::error::{LoopError, Result};
    pub use crate::mesh::{
        derive_mirrored, DerivedMapping, Edge, EdgeId, EdgeKey, EditMesh, Face, FaceId,
        MirrorAxis, Modifier, ModifierStack, Topology, Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    /// Quad ring around a cylinder-ish profile; exercises the full
    /// select -> find -> fit -> apply pipeline through the prelude.
    #[test]
    fn test_circle_pipeline() {
        let mut positions = Vec::new();
        let n = 8;
        for i in 0..n {
            // A deliberately dented octagon.
            let angle = i as f64 / n as f64 * std::f64::consts::TAU;
            let r = if i % 2 == 0 { 1.0 } else { 0.6 };
            positions.push(Point3::new(r * angle.cos(), r * angle.sin(), 0.0));
        }
        let edges: Vec<[usize; 2]> = (0..n).map(|i| [i, (i + 1) % n]).collect();
        let mut mesh = EditMesh::from_edges(&positions, &edges).unwrap();
        for i in 0..n {
            mesh.select_vertex(VertexId::new(i), true);
        }
        for edge in mesh.edges_mut() {
            edge.select = true;
        }

        let topo = Topology::build(&mesh);
        let loops = find_loops(&mesh, &topo, InputMode::Selected, None).unwrap();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].circular);

        let moves = circle_moves(&mesh, &topo, &loops[0], &CircleOptions::default());
        apply_moves(&mut mesh, None, &moves, AxisLock::none(), -1.0);

        // All vertices end up equidistant from the circle center.
        let center = Point3::new(0.0, 0.0, 0.0);
        let r0 = (mesh.position(VertexId::new(0)) - center).norm();
        for i in 1..n {
            let r = (mesh.position(VertexId::new(i)) - center).norm();
            assert!((r - r0).abs() < 1e-6);
        }
    }
}
