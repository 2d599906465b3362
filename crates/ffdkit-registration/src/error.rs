//! Error types for fitting operations.

use ffdkit_core::FfdError;
use thiserror::Error;

/// Main error type for fitting operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Error raised by the transformation.
    #[error("Transform error: {0}")]
    Transform(#[from] FfdError),
}

/// Result type for fitting operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::invalid_configuration("test error");
        assert_eq!(err.to_string(), "Invalid configuration: test error");
    }

    #[test]
    fn test_transform_error_conversion() {
        fn check() -> Result<()> {
            FfdError::check_length(3, 2)?;
            Ok(())
        }
        let err = check().unwrap_err();
        assert!(matches!(err, RegistrationError::Transform(FfdError::LengthMismatch { .. })));
        assert!(err.to_string().starts_with("Transform error"));
    }
}
