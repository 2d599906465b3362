//! Transform trait for batched point mapping on burn tensors.
//!
//! This module defines the tensor-level seam through which a free-form
//! transformation is consumed by tensor-based registration code.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Transform trait for spatial coordinate transformations.
///
/// Maps points from one physical space to another.
/// Note: This trait does not enforce `burn::module::Module` inheritance,
/// so transforms whose parameters live outside a burn module can implement it.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Get the inverse transform (if available).
    ///
    /// Free-form transformations have no closed-form inverse, so this
    /// returns `None` unless an implementation provides one.
    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        None
    }
}
