//! Error taxonomy for transform building
//!
//! Every failure mode is a distinct variant so callers can tell "needs more or
//! better control points" apart from "internal numerical failure" apart from
//! "bad configuration". Nothing is retried internally.

use thiserror::Error;

/// Errors raised while building a transform or warp grid.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Fewer control points than the builder requires.
    #[error("at least {required} control points required, got {found}")]
    InsufficientPoints { required: usize, found: usize },

    /// The working envelope is empty or degenerate.
    #[error("envelope is empty or degenerate")]
    InvalidEnvelope,

    /// The iterative solver failed to converge.
    #[error("solver did not converge within {iterations} iterations")]
    Divergence { iterations: usize },

    /// The normal-equation (or interpolation) system is singular,
    /// e.g. collinear control points or contradictory constraints.
    #[error("singular system; check control points and constraints")]
    SingularSystem,

    /// A transform could not be evaluated or inverted.
    #[error("transform error: {0}")]
    Transform(String),

    /// I/O failure during grid-file export.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BuildError>;
