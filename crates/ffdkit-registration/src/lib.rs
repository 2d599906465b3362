//! Regularizers, optimizers and displacement fitting for ffdkit transforms.

pub mod error;
pub mod fitting;
pub mod optimizer;
pub mod regularization;
pub mod validation;

pub use error::{RegistrationError, Result};
pub use fitting::{DisplacementFitter, FittingConfig, FittingReport};
pub use validation::ConvergenceChecker;
