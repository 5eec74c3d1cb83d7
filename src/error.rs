//! Error types shared by the builders, trees, and buffer handshake.

use thiserror::Error;

/// Unified error enumeration for `geopack`.
#[derive(Debug, Error)]
pub enum GeoIndexError {
    /// `node_size` was outside the permitted `2..=65535` range.
    #[error("node size {node_size} is outside the permitted range 2..=65535")]
    InvalidCapacity {
        /// The rejected node size.
        node_size: usize,
    },

    /// The total number of items added to a builder did not match the
    /// capacity it was constructed with.
    #[error("builder was constructed for {expected} items but {actual} were added before finish()")]
    CountMismatch {
        /// Declared capacity.
        expected: usize,
        /// Items actually added.
        actual: usize,
    },

    /// A box or point coordinate violated `min <= max` or contained NaN.
    #[error("invalid box: min ({min_x}, {min_y}) must not exceed max ({max_x}, {max_y})")]
    InvalidBox {
        /// Rejected min_x.
        min_x: f64,
        /// Rejected min_y.
        min_y: f64,
        /// Rejected max_x.
        max_x: f64,
        /// Rejected max_y.
        max_y: f64,
    },

    /// Coordinate arrays disagreed in length, or an interleaved/separated
    /// shape mismatch was supplied.
    #[error("coordinate arrays disagree in length or shape: {reason}")]
    TypeMismatch {
        /// Human-readable detail.
        reason: &'static str,
    },

    /// A foreign buffer did not start with a recognized magic byte and
    /// version nibble.
    #[error("buffer is not in a recognized packed-index format")]
    NotFlatbush,

    /// A foreign buffer's length was inconsistent with its own header.
    #[error("buffer is truncated: expected at least {expected} bytes, found {found}")]
    Truncated {
        /// Minimum length the header implies.
        expected: usize,
        /// Actual buffer length.
        found: usize,
    },

    /// `add` or `finish` was called on a builder that had already finished.
    #[error("builder has already been finished and consumed")]
    AlreadyFinished,
}

/// Convenience alias for fallible `geopack` operations.
pub type Result<T> = std::result::Result<T, GeoIndexError>;
