//! Interpolation kernels and grid interpolators.
//!
//! This module provides the cubic B-spline kernel shared with the free-form
//! transformation, separable stencil convolution, and interpolators for
//! sampling dense grids at continuous voxel coordinates.

pub mod interpolator;
pub mod kernel;
pub mod prefilter;
pub mod stencil;

pub use interpolator::{GridInterpolator, InterpolationMode};
pub use kernel::{CatmullRom, CubicBSpline, Gaussian, KernelRow, LOOKUP_TABLE_SIZE};
pub use stencil::{Extrapolation, Stencil};
