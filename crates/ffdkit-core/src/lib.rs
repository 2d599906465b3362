//! Cubic B-spline free-form transformations over space and time.
//!
//! The crate is organized bottom-up:
//! * [`spatial`] - nalgebra aliases and bounding boxes
//! * [`image`] - image geometry and dense 4D grids
//! * [`interpolation`] - kernels, stencils and grid interpolators
//! * [`transform`] - lattice, free-form transformation and tensor seam

pub mod error;
pub mod image;
pub mod interpolation;
pub mod spatial;
pub mod transform;

pub use error::{FfdError, Result};
pub use image::{Grid4, ImageAttributes};
pub use spatial::{BoundingBox, Point3, Vector3};
pub use transform::{
    BSplineFreeFormTransform4D, BendingEnergyMode, DisplacementSample, DofStatus, Lattice,
    PartialFreeFormTransform, Transform, TransformationJacobian,
};
