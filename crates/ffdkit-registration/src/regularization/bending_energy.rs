//! Bending energy regularization for free-form transformations.
//!
//! Bending energy (also known as thin-plate bending energy) penalizes the
//! second-order spatial derivatives of the displacement field, encouraging
//! deformations with minimal curvature:
//!
//! R(u) = mean [ |d2u/dx2|^2 + |d2u/dy2|^2 + |d2u/dz2|^2
//!             + 2 |d2u/dxdy|^2 + 2 |d2u/dxdz|^2 + 2 |d2u/dydz|^2 ]
//!
//! The mean is taken over the control points, over a Gauss quadrature of
//! each lattice cell, or over the voxels of an image domain.

use ffdkit_core::image::ImageAttributes;
use ffdkit_core::{BSplineFreeFormTransform4D, BendingEnergyMode};
use super::trait_::Regularizer;

/// Bending energy regularizer for free-form transformations.
///
/// # Example
///
/// ```rust,ignore
/// use ffdkit_registration::regularization::{BendingEnergyRegularizer, Regularizer};
///
/// let reg = BendingEnergyRegularizer::new(0.1);
/// let loss = reg.penalty(&ffd);
/// ```
#[derive(Clone, Debug)]
pub struct BendingEnergyRegularizer {
    weight: f64,
    mode: BendingEnergyMode,
    domain: Option<ImageAttributes>,
    wrt_world: bool,
    incl_passive: bool,
}

impl BendingEnergyRegularizer {
    /// Create a new bending energy regularizer evaluated at the control
    /// points in world units.
    ///
    /// # Arguments
    /// * `weight` - The weight (scaling factor) for this regularizer.
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            mode: BendingEnergyMode::ControlPoints,
            domain: None,
            wrt_world: true,
            incl_passive: false,
        }
    }

    /// Integrate over the lattice with the given mode.
    pub fn with_mode(mut self, mode: BendingEnergyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Average the penalty over the voxels of an image domain instead of
    /// the lattice.
    pub fn with_domain(mut self, domain: ImageAttributes) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Differentiate with respect to world (`true`) or lattice coordinates.
    pub fn with_world_derivatives(mut self, wrt_world: bool) -> Self {
        self.wrt_world = wrt_world;
        self
    }

    /// Count control points whose DOFs are all passive.
    pub fn with_passive(mut self, incl_passive: bool) -> Self {
        self.incl_passive = incl_passive;
        self
    }

    pub fn mode(&self) -> BendingEnergyMode {
        self.mode
    }

    pub fn domain(&self) -> Option<&ImageAttributes> {
        self.domain.as_ref()
    }

    /// Unweighted bending energy.
    pub fn energy(&self, ffd: &BSplineFreeFormTransform4D) -> f64 {
        match &self.domain {
            Some(domain) => ffd.bending_energy_on(domain, self.wrt_world),
            None => ffd.bending_energy(self.mode, self.incl_passive, self.wrt_world),
        }
    }
}

impl Default for BendingEnergyRegularizer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Regularizer for BendingEnergyRegularizer {
    fn penalty(&self, ffd: &BSplineFreeFormTransform4D) -> f64 {
        if self.weight == 0.0 {
            return 0.0;
        }
        self.weight * self.energy(ffd)
    }

    /// The gradient is that of the control-point energy whatever the
    /// integration mode or domain; both approximate the same integral.
    fn accumulate_gradient(
        &self,
        ffd: &BSplineFreeFormTransform4D,
        gradient: &mut [f64],
        weight: f64,
    ) {
        if self.weight == 0.0 {
            return;
        }
        ffd.bending_energy_gradient(
            gradient,
            weight * self.weight,
            self.incl_passive,
            self.wrt_world,
        );
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffdkit_core::Lattice;

    fn ffd(dims: [usize; 4]) -> BSplineFreeFormTransform4D {
        let mut ffd = BSplineFreeFormTransform4D::new(Lattice::with_dims(dims).unwrap());
        let params: Vec<f64> = (0..ffd.number_of_dofs())
            .map(|n| ((n as f64 * 12.9898).sin() * 43758.5453).fract() * 0.1)
            .collect();
        ffd.set_parameters(&params).unwrap();
        ffd
    }

    #[test]
    fn test_zero_field_has_no_bending() {
        let reg = BendingEnergyRegularizer::new(0.1);
        let ffd = BSplineFreeFormTransform4D::new(Lattice::with_dims([6, 6, 6, 1]).unwrap());
        assert_eq!(reg.penalty(&ffd), 0.0);
        let mut gradient = vec![0.0; ffd.number_of_dofs()];
        reg.accumulate_gradient(&ffd, &mut gradient, 1.0);
        assert!(gradient.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_penalty_scales_with_weight() {
        let ffd = ffd([5, 5, 5, 1]);
        let mut reg = BendingEnergyRegularizer::new(1.0);
        let unit = reg.penalty(&ffd);
        assert!(unit > 0.0);
        reg.set_weight(0.25);
        assert_eq!(reg.weight(), 0.25);
        assert!((reg.penalty(&ffd) - 0.25 * unit).abs() < 1e-12 * unit);
        assert_eq!(reg.energy(&ffd), unit);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut ffd = ffd([5, 5, 5, 1]);
        let reg = BendingEnergyRegularizer::new(0.5);
        let mut gradient = vec![0.0; ffd.number_of_dofs()];
        reg.accumulate_gradient(&ffd, &mut gradient, 2.0);
        let h = 1e-6;
        for dof in [0, 7, 190, 200, ffd.number_of_dofs() - 1] {
            let value = ffd.get(dof);
            ffd.put(dof, value + h);
            let plus = reg.penalty(&ffd);
            ffd.put(dof, value - h);
            let minus = reg.penalty(&ffd);
            ffd.put(dof, value);
            let numeric = 2.0 * (plus - minus) / (2.0 * h);
            assert!(
                (gradient[dof] - numeric).abs() < 1e-6 * (1.0 + numeric.abs()),
                "dof {}: {} vs {}",
                dof,
                gradient[dof],
                numeric
            );
        }
    }

    #[test]
    fn test_domain_penalty() {
        let ffd = ffd([5, 5, 5, 1]);
        let domain = ImageAttributes::from_size([5, 5, 5, 1]).unwrap();
        let reg = BendingEnergyRegularizer::new(1.0).with_domain(domain.clone());
        assert_eq!(reg.penalty(&ffd), ffd.bending_energy_on(&domain, true));
        assert!(reg.domain().is_some());
    }
}
