//! Error types for loopkit.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`LoopError`].
pub type Result<T> = std::result::Result<T, LoopError>;

/// Errors that can occur during loop-editing operations.
#[derive(Error, Debug)]
pub enum LoopError {
    /// The mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has fewer than three vertices or duplicate vertex indices.
    #[error("face {face} is degenerate")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge references an invalid vertex index.
    #[error("edge {edge} references invalid vertex index {vertex}")]
    InvalidEdgeIndex {
        /// The edge index.
        edge: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// The selection cannot drive the requested operation.
    #[error("invalid selection: {details}")]
    InvalidSelection {
        /// Description of what was missing or malformed.
        details: String,
    },

    /// Branching topology was encountered where two sides were expected.
    #[error("branching topology at vertex {vertex}")]
    TopologyBranch {
        /// The vertex at which more than two candidates were found.
        vertex: usize,
    },

    /// A bevel ring has no adjacent planes or rails to reconstruct a target from.
    #[error("no computable bevel target for ring starting at vertex {vertex}")]
    NoComputableTarget {
        /// First vertex of the affected ring.
        vertex: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl LoopError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        LoopError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an invalid selection error.
    pub fn invalid_selection(details: impl Into<String>) -> Self {
        LoopError::InvalidSelection {
            details: details.into(),
        }
    }
}
