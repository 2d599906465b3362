//! Error types for lattice construction and parameter handling.
//!
//! Out-of-domain evaluation is never an error; queries outside the lattice
//! resolve to extrapolated or default values. Contract violations such as
//! out-of-range control-point indices panic instead.

use thiserror::Error;

/// Main error type for free-form transformation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FfdError {
    /// Lattice or image extent of zero along some axis.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Non-positive or non-finite spacing.
    #[error("Invalid spacing: {0}")]
    InvalidSpacing(String),

    /// Orientation matrix cannot be inverted.
    #[error("Singular orientation: {0}")]
    SingularOrientation(String),

    /// A flat buffer does not match the expected length.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Invalid interpolation or extrapolation setting.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for free-form transformation operations.
pub type Result<T> = std::result::Result<T, FfdError>;

impl FfdError {
    /// Create an invalid dimensions error.
    pub fn invalid_dimensions(msg: impl Into<String>) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    /// Create an invalid spacing error.
    pub fn invalid_spacing(msg: impl Into<String>) -> Self {
        Self::InvalidSpacing(msg.into())
    }

    /// Create a singular orientation error.
    pub fn singular_orientation(msg: impl Into<String>) -> Self {
        Self::SingularOrientation(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Check a buffer length.
    pub fn check_length(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::LengthMismatch { expected, actual })
        }
    }
}
