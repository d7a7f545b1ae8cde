//! Errors raised while building and stepping a diffusion mesh.

use thiserror::Error;

use crate::utils::types::{Triangle, VertexIdx};

/// Everything that can go wrong in the diffusion core.
///
/// None of these are recoverable in place. A mesh that fails topology extraction or
/// weight assembly has to be rejected as a whole; an [`MeshError::InvariantViolation`]
/// means an earlier stage produced inconsistent tables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// A triangle references an out-of-range vertex or repeats a vertex, or the mesh
    /// arrays disagree on the vertex count.
    #[error("malformed topology: {0}")]
    MalformedTopology(String),

    /// An undirected edge has zero or more than two opposite apexes.
    #[error("non-manifold edge {{{u}, {v}}}: {apex_count} opposite apexes (expected 1 or 2)")]
    NonManifoldEdge {
        u: VertexIdx,
        v: VertexIdx,
        apex_count: usize,
    },

    /// Coincident or collinear vertices make the angle at `apex` undefined.
    #[error("degenerate geometry at apex {apex} of edge {{{u}, {v}}}: {reason}")]
    DegenerateGeometry {
        u: VertexIdx,
        v: VertexIdx,
        apex: VertexIdx,
        reason: &'static str,
    },

    /// A table lookup failed during integration.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl MeshError {
    pub(crate) fn malformed(triangle_idx: usize, triangle: Triangle, reason: &str) -> Self {
        Self::MalformedTopology(format!("triangle {triangle_idx} {triangle:?}: {reason}"))
    }

    /// Check if this error stems from the input mesh rather than from a bug in the tables.
    pub const fn is_input_error(&self) -> bool {
        !matches!(self, Self::InvariantViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MeshError::NonManifoldEdge {
            u: 0,
            v: 1,
            apex_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "non-manifold edge {0, 1}: 3 opposite apexes (expected 1 or 2)"
        );
        assert!(err.is_input_error());

        let err = MeshError::malformed(4, [1, 1, 2], "repeated vertex");
        assert_eq!(
            err.to_string(),
            "malformed topology: triangle 4 [1, 1, 2]: repeated vertex"
        );

        assert!(!MeshError::InvariantViolation("missing weight".into()).is_input_error());
    }
}
