//! Core mesh data structures.
//!
//! This module provides the editable polygon mesh snapshot the loop algorithms
//! operate on, together with its adjacency tables and topological edit
//! primitives.
//!
//! # Overview
//!
//! The primary type is [`EditMesh`], a boundary representation (vertices,
//! edges as vertex pairs, faces as ordered vertex loops) with per-element
//! selection and hidden flags. [`Topology`] is built from a snapshot once per
//! operation and answers the adjacency queries (edge→faces, face→faces,
//! vertex→edges, vertex→faces) that loop extraction and bevel reconstruction
//! need.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`EdgeId`] - Identifies an edge
//! - [`FaceId`] - Identifies a face
//!
//! Undirected edges are addressed by [`EdgeKey`], a canonicalized vertex pair.
//!
//! # Construction
//!
//! ```
//! use loopkit::mesh::EditMesh;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![vec![0, 1, 2, 3]];
//!
//! let mesh = EditMesh::from_polygons(&positions, &faces).unwrap();
//! assert_eq!(mesh.num_edges(), 4);
//! ```

mod edit;
mod editmesh;
mod index;
pub mod mirror;
mod topology;

pub use editmesh::{Edge, EdgeKey, EditMesh, Face, Vertex};
pub use index::{EdgeId, FaceId, VertexId};
pub use mirror::{derive_mirrored, DerivedMapping, MirrorAxis, Modifier, ModifierStack};
pub use topology::Topology;
