//! Fractional application of a free-form transformation.
//!
//! A partial transformation applies a fixed fraction `f` of another
//! transformation's displacement. Its own parameters are `f` times the
//! decorated parameters, and gradients with respect to its own parameters
//! are converted into gradients with respect to the decorated ones.

use crate::spatial::{Point3, Vector3};
use super::dof::DofStatus;
use super::ffd::BSplineFreeFormTransform4D;

/// Decorator applying `fraction` of a free-form transformation.
#[derive(Debug, Clone, Copy)]
pub struct PartialFreeFormTransform<'a> {
    ffd: &'a BSplineFreeFormTransform4D,
    fraction: f64,
}

impl<'a> PartialFreeFormTransform<'a> {
    /// # Panics
    /// If `fraction` is zero or not finite.
    pub fn new(ffd: &'a BSplineFreeFormTransform4D, fraction: f64) -> Self {
        assert!(
            fraction != 0.0 && fraction.is_finite(),
            "Partial transformation fraction must be non-zero and finite, got {}",
            fraction
        );
        Self { ffd, fraction }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn transformation(&self) -> &'a BSplineFreeFormTransform4D {
        self.ffd
    }

    pub fn number_of_dofs(&self) -> usize {
        self.ffd.number_of_dofs()
    }

    /// Status of a DOF, inherited from the decorated transformation.
    pub fn status(&self, dof: usize) -> DofStatus {
        self.ffd.status(dof)
    }

    /// Own parameters, `fraction` times the decorated parameters.
    pub fn parameters(&self) -> Vec<f64> {
        self.ffd
            .parameters()
            .into_iter()
            .map(|p| self.fraction * p)
            .collect()
    }

    pub fn displacement(&self, p: &Point3, t: f64) -> Vector3 {
        self.ffd.displacement(p, t) * self.fraction
    }

    pub fn transform_point(&self, p: &Point3, t: f64) -> Point3 {
        p + self.displacement(p, t)
    }

    /// Convert a gradient with respect to the own parameters into a
    /// gradient with respect to the decorated parameters and add `weight`
    /// times it into `out` for active DOFs.
    ///
    /// The gradient is normalized by its largest absolute component before
    /// being applied as a step to the own parameters; the step is mapped
    /// back through the fraction. An all-zero gradient contributes nothing.
    ///
    /// # Panics
    /// If either buffer does not have one entry per DOF.
    pub fn parametric_gradient(&self, own_gradient: &[f64], out: &mut [f64], weight: f64) {
        let n = self.number_of_dofs();
        assert_eq!(own_gradient.len(), n, "Gradient must have one entry per DOF");
        assert_eq!(out.len(), n, "Gradient buffer must have one entry per DOF");
        let max = own_gradient.iter().fold(0.0f64, |m, g| m.max(g.abs()));
        if max == 0.0 {
            return;
        }
        let current = self.ffd.parameters();
        for dof in 0..n {
            if !self.ffd.is_active(dof) {
                continue;
            }
            let own = self.fraction * current[dof] + own_gradient[dof] / max;
            out[dof] += weight * (own / self.fraction - current[dof]);
        }
    }
}
