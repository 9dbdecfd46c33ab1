//! Error types for the motion engine.
//!
//! Only programmer errors surface as [`MotionError`]. Faults that can happen
//! mid-frame (a detached element, an unresolvable variable) are logged and
//! degraded so the frame loop keeps running.

use thiserror::Error;

/// Result type for motion operations.
pub type Result<T> = std::result::Result<T, MotionError>;

/// Errors that can occur while configuring or driving animations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Cubic bezier definitions need exactly four points with x in [0, 1].
    #[error("invalid easing definition: {0}")]
    InvalidEasing(String),

    /// Spring options that cannot be solved.
    #[error("invalid spring: {0}")]
    InvalidSpring(String),

    /// `interpolate` was handed input and output ranges of different lengths.
    #[error("input and output ranges must be the same length (got {input} and {output})")]
    MismatchedRanges { input: usize, output: usize },

    /// An animation needs at least one keyframe.
    #[error("keyframes must not be empty")]
    EmptyKeyframes,

    /// Reading geometry from an instance failed.
    #[error("measurement failed: {0}")]
    Measurement(String),

    /// A CSS variable referenced by a keyframe has no value.
    #[error("unresolved variable: {0}")]
    UnresolvedVariable(String),

    /// A projection node id does not exist in the tree.
    #[error("projection node {0} not found")]
    NodeNotFound(usize),

    /// A node was mounted twice.
    #[error("projection node {0} is already mounted")]
    AlreadyMounted(usize),
}
