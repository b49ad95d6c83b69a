//! Loop-based editing algorithms.
//!
//! This module contains the geometry operations the crate is built around:
//!
//! - **Loop extraction**: connected selections, parallel loop propagation
//! - **Spline fitting**: natural cubic and linear interpolation through knots
//! - **Shape fitting**: best-fit planes and circles with surface re-projection
//! - **Smoothing**: spline-based relaxation and even spacing along loops
//! - **Curve fitting**: spline interpolation through sparse selected knots
//! - **Flattening**: projection of selections onto a best-fit plane
//! - **Bevel reconstruction**: resizing, reshaping, and resegmenting bevel
//!   rings on meshes and curve splines
//!
//! All operations work on an [`EditMesh`](crate::mesh::EditMesh) snapshot and
//! either mutate it in place or return displacement lists for
//! [`apply_moves`](displace::apply_moves).

pub mod circle;
pub mod curve;
pub mod curve_rebevel;
pub mod displace;
pub mod flatten;
pub mod geom;
pub mod loops;
pub mod parallel;
pub mod plane;
pub mod profile;
pub mod rebevel;
pub mod relax;
pub mod space;
pub mod spline;
