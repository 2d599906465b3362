//! Image geometry and dense voxel storage.
//!
//! Voxel I/O is outside this crate; `ImageAttributes` carries the geometry
//! of an image domain and `Grid4` stores sampled values or control points.

pub mod attributes;
pub mod grid;

pub use attributes::ImageAttributes;
pub use grid::{Grid4, Voxel};
