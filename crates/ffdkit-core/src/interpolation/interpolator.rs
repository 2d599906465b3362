//! Interpolation of dense grids at continuous voxel coordinates.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{FfdError, Result};
use crate::image::{Grid4, Voxel};
use super::kernel::{CatmullRom, CubicBSpline, Gaussian, MAX_GAUSSIAN_RADIUS};
use super::prefilter::interpolation_coefficients;
use super::stencil::{
    convolve_extrapolated, convolve_inside, convolve_skip, convolve_with_padding,
    split_coordinate, stencils_inside, Extrapolation, Stencil,
};

/// Interpolation method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Value of the closest voxel.
    Nearest,
    /// Multilinear interpolation.
    #[default]
    Linear,
    /// Cubic B-spline interpolation of prefiltered coefficients.
    BSpline,
    /// Catmull-Rom cubic interpolation.
    CSpline,
    /// Normalized Gaussian weighting.
    Gaussian { sigma: f64 },
}

/// Samples a `Grid4` at continuous voxel coordinates `(i, j, k, l)`.
///
/// Axes of extent one are collapsed: the coordinate along them is ignored,
/// so the same interpolator serves 1D to 4D data.
#[derive(Debug, Clone)]
pub struct GridInterpolator<'a, T: Voxel> {
    samples: &'a Grid4<T>,
    coefficients: Cow<'a, Grid4<T>>,
    mode: InterpolationMode,
    extrapolation: Option<Extrapolation<T>>,
    default_value: T,
}

impl<'a, T: Voxel> GridInterpolator<'a, T> {
    /// Create an interpolator.
    ///
    /// # Errors
    /// If the Gaussian sigma is not positive and finite.
    pub fn new(samples: &'a Grid4<T>, mode: InterpolationMode) -> Result<Self> {
        let coefficients = match mode {
            InterpolationMode::BSpline => Cow::Owned(interpolation_coefficients(samples)),
            InterpolationMode::Gaussian { sigma } if !(sigma.is_finite() && sigma > 0.0) => {
                return Err(FfdError::invalid_configuration(format!(
                    "Gaussian sigma must be positive and finite, got {}",
                    sigma
                )));
            }
            _ => Cow::Borrowed(samples),
        };
        Ok(Self {
            samples,
            coefficients,
            mode,
            extrapolation: None,
            default_value: T::zero(),
        })
    }

    /// Resolve outside taps with `extrapolation` instead of skipping them.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation<T>) -> Self {
        self.extrapolation = Some(extrapolation);
        self
    }

    /// Value returned where no sample contributes.
    pub fn with_default_value(mut self, value: T) -> Self {
        self.default_value = value;
        self
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    pub fn extrapolation(&self) -> Option<&Extrapolation<T>> {
        self.extrapolation.as_ref()
    }

    fn stencil(&self, x: f64, n: usize) -> Stencil {
        if n == 1 {
            return Stencil::single(0, 1.0);
        }
        let (i, f) = split_coordinate(x, n);
        match self.mode {
            InterpolationMode::Nearest => Stencil::single(split_coordinate(x.round(), n).0, 1.0),
            InterpolationMode::Linear => Stencil::from_slice(i, &[1.0 - f, f]),
            InterpolationMode::BSpline => Stencil::from_row(i, CubicBSpline::lookup(0, f)),
            InterpolationMode::CSpline => Stencil::from_row(i, CatmullRom::weights(f)),
            InterpolationMode::Gaussian { sigma } => {
                let kernel = Gaussian::new(sigma);
                let mut weights = [0.0; 2 * MAX_GAUSSIAN_RADIUS];
                let len = kernel.weights_into(f, &mut weights);
                Stencil::from_slice(i - kernel.radius() as isize + 1, &weights[..len])
            }
        }
    }

    /// Per-axis stencils at a continuous voxel coordinate.
    pub fn stencils(&self, x: [f64; 4]) -> [Stencil; 4] {
        let dims = self.samples.dims();
        std::array::from_fn(|d| self.stencil(x[d], dims[d]))
    }

    /// Whether every sample needed at `x` lies inside the grid.
    pub fn is_inside(&self, x: [f64; 4]) -> bool {
        stencils_inside(&self.stencils(x), self.samples.dims())
    }

    /// Interpolate, dispatching on whether `x` is inside.
    pub fn get(&self, x: [f64; 4]) -> T {
        let s = self.stencils(x);
        if stencils_inside(&s, self.samples.dims()) {
            convolve_inside(&self.coefficients, &s)
        } else {
            self.outside(&s)
        }
    }

    /// Interpolate at a coordinate known to be inside.
    ///
    /// # Panics
    /// If a sample outside the grid is accessed.
    pub fn get_inside(&self, x: [f64; 4]) -> T {
        convolve_inside(&self.coefficients, &self.stencils(x))
    }

    /// Interpolate with bounds checks and extrapolation.
    pub fn get_outside(&self, x: [f64; 4]) -> T {
        self.outside(&self.stencils(x))
    }

    fn outside(&self, s: &[Stencil; 4]) -> T {
        match &self.extrapolation {
            Some(extrapolation) => convolve_extrapolated(&self.coefficients, s, extrapolation),
            None => convolve_skip(&self.coefficients, s).unwrap_or(self.default_value),
        }
    }

    /// Interpolate over foreground samples only.
    ///
    /// Samples equal to `background` and samples outside the grid are
    /// ignored and the remaining weights renormalized. Returns the default
    /// value when no foreground sample contributes.
    pub fn get_with_padding(&self, x: [f64; 4], background: T) -> T {
        convolve_with_padding(self.samples, &self.coefficients, &self.stencils(x), background)
            .unwrap_or(self.default_value)
    }
}
