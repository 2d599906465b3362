//! Image geometry.
//!
//! `ImageAttributes` describes how voxel indices of a (possibly temporal)
//! image map to world coordinates and time. Voxel data itself is not part
//! of this crate; the attributes are all a free-form transformation needs
//! to build a lattice over an image or to sample a discrete domain.

use crate::error::{FfdError, Result};
use crate::spatial::{Direction3, Matrix3, Point3, Vector3};

/// Geometry of a 4D image domain.
///
/// # Coordinate Systems
/// * **Voxel space**: continuous indices `(i, j, k, l)`
/// * **World space**: `origin + direction * (index * spacing)` for the
///   spatial part, `t_origin + l * dt` for time
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    /// Number of voxels along x, y, z, t.
    size: [usize; 4],
    /// Voxel spacing along x, y, z and temporal spacing.
    spacing: [f64; 4],
    /// World coordinate of voxel (0, 0, 0).
    origin: Point3,
    /// Orientation of the image axes.
    direction: Direction3,
    /// Time of frame 0.
    t_origin: f64,
    /// Cached inverse of `direction`.
    inverse: Matrix3,
}

impl ImageAttributes {
    /// Create image attributes, validating extents, spacing and orientation.
    pub fn new(
        size: [usize; 4],
        spacing: [f64; 4],
        origin: Point3,
        direction: Direction3,
        t_origin: f64,
    ) -> Result<Self> {
        if size.iter().any(|&n| n == 0) {
            return Err(FfdError::invalid_dimensions(format!(
                "image size must be positive along every axis, got {:?}",
                size
            )));
        }
        if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(FfdError::invalid_spacing(format!(
                "voxel spacing must be positive and finite, got {:?}",
                spacing
            )));
        }
        let inverse = direction
            .try_inverse()
            .ok_or_else(|| FfdError::singular_orientation("image direction matrix is singular"))?;
        Ok(Self {
            size,
            spacing,
            origin,
            direction,
            t_origin,
            inverse,
        })
    }

    /// Unit spacing, zero origin and identity orientation.
    pub fn from_size(size: [usize; 4]) -> Result<Self> {
        Self::new(size, [1.0; 4], Point3::origin(), Direction3::identity(), 0.0)
    }

    /// Replace the origin.
    pub fn with_origin(mut self, origin: Point3) -> Self {
        self.origin = origin;
        self
    }

    /// Replace the time of frame 0.
    pub fn with_time_origin(mut self, t_origin: f64) -> Self {
        self.t_origin = t_origin;
        self
    }

    pub fn size(&self) -> [usize; 4] {
        self.size
    }

    pub fn spacing(&self) -> [f64; 4] {
        self.spacing
    }

    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    pub fn direction(&self) -> &Direction3 {
        &self.direction
    }

    pub fn t_origin(&self) -> f64 {
        self.t_origin
    }

    /// Total number of voxels including frames.
    pub fn number_of_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// Physical extent between the first and last voxel centers per axis.
    pub fn extent(&self) -> [f64; 4] {
        std::array::from_fn(|d| (self.size[d] - 1) as f64 * self.spacing[d])
    }

    /// Map a continuous voxel index to world coordinates.
    pub fn voxel_to_world(&self, index: &Point3) -> Point3 {
        let scaled = Vector3::new(
            index[0] * self.spacing[0],
            index[1] * self.spacing[1],
            index[2] * self.spacing[2],
        );
        self.origin + self.direction * scaled
    }

    /// Map world coordinates to a continuous voxel index.
    pub fn world_to_voxel(&self, point: &Point3) -> Point3 {
        let rotated = self.inverse * (point - self.origin);
        Point3::new(
            rotated[0] / self.spacing[0],
            rotated[1] / self.spacing[1],
            rotated[2] / self.spacing[2],
        )
    }

    /// Time of a (continuous) frame index.
    pub fn voxel_to_time(&self, l: f64) -> f64 {
        self.t_origin + l * self.spacing[3]
    }

    /// Continuous frame index of a time.
    pub fn time_to_voxel(&self, t: f64) -> f64 {
        (t - self.t_origin) / self.spacing[3]
    }

    /// Iterate over all voxel indices, x fastest.
    pub fn voxel_indices(&self) -> impl Iterator<Item = [usize; 4]> + '_ {
        let [nx, ny, nz, _] = self.size;
        (0..self.number_of_voxels()).map(move |offset| {
            let i = offset % nx;
            let rest = offset / nx;
            let j = rest % ny;
            let rest = rest / ny;
            [i, j, rest % nz, rest / nz]
        })
    }
}
