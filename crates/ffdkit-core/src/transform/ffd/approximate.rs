//! Fitting control-point coefficients to displacements.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FfdError, Result};
use crate::image::{Grid4, ImageAttributes};
use crate::interpolation::prefilter::prefilter_in_place;
use crate::spatial::{Point3, Vector3};
use crate::transform::dof::dof_index;
use crate::transform::observer::ChangeEvent;
use super::BSplineFreeFormTransform4D;

/// A displacement observed at a world point and time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplacementSample {
    pub point: Point3,
    pub time: f64,
    pub displacement: Vector3,
    /// Relative confidence, non-negative.
    pub weight: f64,
}

impl DisplacementSample {
    /// Sample with unit weight.
    pub fn new(point: Point3, time: f64, displacement: Vector3) -> Self {
        Self {
            point,
            time,
            displacement,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Per-worker scatter buffers.
struct Scatter {
    numerator: Vec<Vector3>,
    denominator: Vec<f64>,
}

impl Scatter {
    fn new(n: usize) -> Self {
        Self {
            numerator: vec![Vector3::zeros(); n],
            denominator: vec![0.0; n],
        }
    }

    fn merge(mut self, other: Scatter) -> Self {
        for (a, b) in self.numerator.iter_mut().zip(other.numerator) {
            *a += b;
        }
        for (a, b) in self.denominator.iter_mut().zip(other.denominator) {
            *a += b;
        }
        self
    }
}

pub(super) fn merge_gradients(mut a: Vec<f64>, b: Vec<f64>) -> Vec<f64> {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
    a
}

impl BSplineFreeFormTransform4D {
    /// Scattered-data approximation of coefficients from samples.
    ///
    /// Each sample distributes its displacement over its support with
    /// `phi_k = w_k d / sum(w^2)`; a control point takes the average of the
    /// `phi_k` it received weighted by `w_k^2`. Returns `None` when no sample
    /// touches the lattice.
    fn scatter_coefficients(&self, samples: &[DisplacementSample]) -> Option<Grid4<Vector3>> {
        let n = self.number_of_control_points();
        let scatter = samples
            .par_iter()
            .fold(
                || Scatter::new(n),
                |mut acc, sample| {
                    if sample.weight <= 0.0 {
                        return acc;
                    }
                    let q = self.lattice.to_lattice_coords(&sample.point, sample.time);
                    let stencils = self.stencils(q, [0; 4]);
                    let mut support = Vec::with_capacity(256);
                    self.for_each_support(&stencils, |cp, w| support.push((cp, w)));
                    let norm: f64 = support.iter().map(|&(_, w)| w * w).sum();
                    if norm == 0.0 {
                        return acc;
                    }
                    for (cp, w) in support {
                        let w2 = w * w;
                        let phi = sample.displacement * (w / norm);
                        acc.numerator[cp] += phi * (sample.weight * w2);
                        acc.denominator[cp] += sample.weight * w2;
                    }
                    acc
                },
            )
            .reduce(|| Scatter::new(n), Scatter::merge);

        if scatter.denominator.iter().all(|&d| d == 0.0) {
            return None;
        }
        let data = scatter
            .numerator
            .into_iter()
            .zip(scatter.denominator)
            .map(|(num, den)| if den > 0.0 { num / den } else { Vector3::zeros() })
            .collect();
        Grid4::from_vec(self.lattice.dims(), data).ok()
    }

    /// Replace the coefficients by a scattered-data approximation of the
    /// samples.
    ///
    /// Control points without contribution become zero. Without samples,
    /// or when no sample touches the lattice, the coefficients are left
    /// unchanged.
    pub fn approximate_dofs(&mut self, samples: &[DisplacementSample]) {
        if samples.is_empty() {
            warn!("No samples given, coefficients unchanged");
            return;
        }
        match self.scatter_coefficients(samples) {
            Some(coefficients) => {
                self.coefficients = coefficients;
                debug!(samples = samples.len(), "Approximated control point coefficients");
                self.notify(ChangeEvent::Parameters);
            }
            None => warn!(
                samples = samples.len(),
                "No sample contributes to the lattice, coefficients unchanged"
            ),
        }
    }

    /// Residuals `u(p) - d` of the samples under the current coefficients.
    pub fn residuals(&self, samples: &[DisplacementSample]) -> Vec<DisplacementSample> {
        samples
            .par_iter()
            .map(|s| DisplacementSample {
                displacement: self.displacement(&s.point, s.time) - s.displacement,
                ..*s
            })
            .collect()
    }

    /// Weighted root mean square residual of the samples.
    pub fn rms_error(&self, samples: &[DisplacementSample]) -> f64 {
        let (sum, total) = self
            .residuals(samples)
            .iter()
            .fold((0.0, 0.0), |(sum, total), r| {
                (sum + r.weight * r.displacement.norm_squared(), total + r.weight)
            });
        if total > 0.0 {
            (sum / total).sqrt()
        } else {
            0.0
        }
    }

    /// Iteratively refine the coefficients by approximating the remaining
    /// residuals and adding the result. Returns the final RMS residual.
    pub fn approximate(&mut self, samples: &[DisplacementSample], iterations: usize) -> f64 {
        for iteration in 0..iterations {
            let targets: Vec<DisplacementSample> = self
                .residuals(samples)
                .into_iter()
                .map(|r| DisplacementSample {
                    displacement: -r.displacement,
                    ..r
                })
                .collect();
            let Some(update) = self.scatter_coefficients(&targets) else {
                warn!("No sample contributes to the lattice, stopping refinement");
                break;
            };
            for (c, du) in self.coefficients.as_mut_slice().iter_mut().zip(update.as_slice()) {
                *c += du;
            }
            self.notify(ChangeEvent::Parameters);
            debug!(iteration, rms = self.rms_error(samples), "Refinement iteration");
        }
        self.rms_error(samples)
    }

    /// Add the gradient of `weight * 1/2 sum(w |e|^2)` with respect to every
    /// active DOF into `gradient`, where each sample carries a residual
    /// `e = u(p) - d` (see [`Self::residuals`]).
    ///
    /// Coefficients outside the lattice count as zero, whatever the
    /// configured extrapolation. Near the boundary this is the gradient of
    /// the unextrapolated field, and samples with no support inside the
    /// lattice contribute nothing.
    ///
    /// # Panics
    /// If `gradient` does not have one entry per DOF.
    pub fn approximate_dofs_gradient(
        &self,
        residuals: &[DisplacementSample],
        gradient: &mut [f64],
        weight: f64,
    ) {
        let n = self.number_of_dofs();
        assert_eq!(gradient.len(), n, "Gradient buffer must have one entry per DOF");
        let local = residuals
            .par_iter()
            .fold(
                || vec![0.0; n],
                |mut acc, r| {
                    let q = self.lattice.to_lattice_coords(&r.point, r.time);
                    self.for_each_support(&self.stencils(q, [0; 4]), |cp, w| {
                        for c in 0..3 {
                            acc[dof_index(cp, c)] += r.weight * w * r.displacement[c];
                        }
                    });
                    acc
                },
            )
            .reduce(|| vec![0.0; n], merge_gradients);
        self.accumulate_active(&local, gradient, weight);
    }

    /// Add `weight * local` into `gradient` for active DOFs.
    pub(crate) fn accumulate_active(&self, local: &[f64], gradient: &mut [f64], weight: f64) {
        for (dof, (g, l)) in gradient.iter_mut().zip(local).enumerate() {
            if self.is_active(dof) {
                *g += weight * l;
            }
        }
    }

    /// Set coefficients so the field passes exactly through the given
    /// displacements at every lattice node.
    ///
    /// `displacements` is ordered like the parameter vector. Exactness holds
    /// when no extrapolation is configured.
    ///
    /// # Errors
    /// If the length is not the number of DOFs.
    pub fn interpolate(&mut self, displacements: &[f64]) -> Result<()> {
        FfdError::check_length(self.number_of_dofs(), displacements.len())?;
        let data = displacements
            .chunks_exact(3)
            .map(|v| Vector3::new(v[0], v[1], v[2]))
            .collect();
        let mut coefficients = Grid4::from_vec(self.lattice.dims(), data)?;
        prefilter_in_place(&mut coefficients);
        self.coefficients = coefficients;
        debug!(dims = ?self.lattice.dims(), "Interpolated node displacements");
        self.notify(ChangeEvent::Parameters);
        Ok(())
    }

    /// Chain a dense voxel-wise gradient field `dE/du` on an image domain to
    /// the DOFs and add `weight` times the result into `gradient`.
    ///
    /// # Panics
    /// If the field extents differ from the image size or `gradient` does
    /// not have one entry per DOF.
    pub fn parametric_gradient(
        &self,
        attributes: &ImageAttributes,
        voxel_gradient: &Grid4<Vector3>,
        gradient: &mut [f64],
        weight: f64,
    ) {
        assert_eq!(
            voxel_gradient.dims(),
            attributes.size(),
            "Voxel gradient extents must match the image size"
        );
        let n = self.number_of_dofs();
        assert_eq!(gradient.len(), n, "Gradient buffer must have one entry per DOF");
        let local = voxel_gradient
            .as_slice()
            .par_iter()
            .enumerate()
            .fold(
                || vec![0.0; n],
                |mut acc, (offset, g)| {
                    if *g == Vector3::zeros() {
                        return acc;
                    }
                    let [i, j, k, l] = voxel_gradient.index_of(offset);
                    let p = attributes.voxel_to_world(&Point3::new(i as f64, j as f64, k as f64));
                    let q = self.lattice.to_lattice_coords(&p, attributes.voxel_to_time(l as f64));
                    self.for_each_support(&self.stencils(q, [0; 4]), |cp, w| {
                        for c in 0..3 {
                            acc[dof_index(cp, c)] += w * g[c];
                        }
                    });
                    acc
                },
            )
            .reduce(|| vec![0.0; n], merge_gradients);
        self.accumulate_active(&local, gradient, weight);
    }
}
