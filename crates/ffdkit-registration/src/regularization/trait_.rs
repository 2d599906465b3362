//! Regularizer trait definition.

use ffdkit_core::BSplineFreeFormTransform4D;

/// Trait for transformation regularizers.
///
/// Regularizers constrain the free-form transformation to keep it smooth
/// and physically plausible during fitting.
pub trait Regularizer {
    /// Weighted penalty of the transformation's current parameters.
    fn penalty(&self, ffd: &BSplineFreeFormTransform4D) -> f64;

    /// Add `weight` times the gradient of [`Regularizer::penalty`] with
    /// respect to the active parameters into `gradient`.
    ///
    /// # Panics
    /// If `gradient` does not have one entry per DOF.
    fn accumulate_gradient(
        &self,
        ffd: &BSplineFreeFormTransform4D,
        gradient: &mut [f64],
        weight: f64,
    );

    /// Get the weight (scaling factor) for this regularizer.
    fn weight(&self) -> f64;

    /// Set the weight (scaling factor) for this regularizer.
    fn set_weight(&mut self, weight: f64);
}
