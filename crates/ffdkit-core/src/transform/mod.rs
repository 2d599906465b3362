//! Transform types and operations.
//!
//! This module provides the control-point lattice, the cubic B-spline
//! free-form transformation built on it, and the tensor `Transform` seam.

pub mod dof;
pub mod ffd;
pub mod lattice;
pub mod observer;
pub mod partial;
pub mod trait_;

pub use dof::{DofStatus, TransformationJacobian};
pub use ffd::{BSplineFreeFormTransform4D, BendingEnergyMode, DisplacementSample, FfdTimeSlice};
pub use lattice::Lattice;
pub use observer::{ChangeEvent, ObserverId};
pub use partial::PartialFreeFormTransform;
pub use trait_::Transform;
