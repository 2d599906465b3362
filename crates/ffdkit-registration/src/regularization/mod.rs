//! Regularization module for free-form transformations.
//!
//! Regularization is essential for:
//! - Preventing overfitting to noisy or sparse displacement samples
//! - Ensuring smooth and physically plausible deformations
//!
//! # Available Regularizers
//!
//! * **BendingEnergyRegularizer**: Bending energy of the B-spline displacement

pub mod bending_energy;
pub mod trait_;

pub use bending_energy::BendingEnergyRegularizer;
pub use trait_::Regularizer;
