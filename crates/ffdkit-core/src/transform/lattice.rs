//! Control-point lattice geometry.
//!
//! A lattice is a regular 4D grid of nodes. Node `(i, j, k)` sits at world
//! position `origin + R S (i, j, k)` where `R` is the orientation and `S`
//! the diagonal spatial spacing; node `l` sits at time `t_origin + l dt`.

use tracing::debug;

use crate::error::{FfdError, Result};
use crate::image::ImageAttributes;
use crate::spatial::{BoundingBox, Direction3, Matrix3, Point3, Vector3};

/// Regular 4D control-point lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    dims: [usize; 4],
    spacing: [f64; 4],
    origin: Point3,
    direction: Direction3,
    t_origin: f64,
    /// `R S`, lattice offsets to world offsets.
    to_world: Matrix3,
    /// `S^-1 R^-1`, world offsets to lattice offsets.
    to_lattice: Matrix3,
}

impl Lattice {
    /// Number of control points along each axis influencing a point.
    pub const KERNEL_SIZE: usize = 4;

    /// Create a lattice from explicit geometry.
    ///
    /// # Errors
    /// On zero extents, non-positive or non-finite spacing, or a singular
    /// orientation matrix.
    pub fn new(
        dims: [usize; 4],
        spacing: [f64; 4],
        origin: Point3,
        direction: Direction3,
        t_origin: f64,
    ) -> Result<Self> {
        if dims.iter().any(|&n| n == 0) {
            return Err(FfdError::invalid_dimensions(format!(
                "lattice must have at least one node per axis, got {:?}",
                dims
            )));
        }
        if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(FfdError::invalid_spacing(format!(
                "lattice spacing must be positive and finite, got {:?}",
                spacing
            )));
        }
        let to_world =
            direction * Matrix3::from_diagonal(&Vector3::new(spacing[0], spacing[1], spacing[2]));
        let to_lattice = to_world
            .try_inverse()
            .ok_or_else(|| FfdError::singular_orientation("lattice direction matrix is singular"))?;
        Ok(Self {
            dims,
            spacing,
            origin,
            direction,
            t_origin,
            to_world,
            to_lattice,
        })
    }

    /// Lattice with unit spacing, zero origin and identity orientation.
    pub fn with_dims(dims: [usize; 4]) -> Result<Self> {
        Self::new(dims, [1.0; 4], Point3::origin(), Direction3::identity(), 0.0)
    }

    /// Lattice covering an image domain with approximately the given spacing.
    ///
    /// The first node coincides with the first voxel and the axes follow the
    /// image orientation. Along each axis `n = round(extent / d) + 1` nodes
    /// are placed and the spacing adjusted so the last node coincides with
    /// the last voxel. A non-positive requested spacing selects the voxel
    /// spacing. Axes of zero extent get a single node.
    pub fn covering(attributes: &ImageAttributes, spacing: [f64; 4]) -> Result<Self> {
        let extent = attributes.extent();
        let voxel_spacing = attributes.spacing();
        let mut dims = [1usize; 4];
        let mut adjusted = [1.0f64; 4];
        for d in 0..4 {
            let requested = if spacing[d] > 0.0 { spacing[d] } else { voxel_spacing[d] };
            if !requested.is_finite() {
                return Err(FfdError::invalid_spacing(format!(
                    "requested lattice spacing must be finite, got {:?}",
                    spacing
                )));
            }
            if extent[d] > 0.0 {
                dims[d] = (extent[d] / requested).round().max(1.0) as usize + 1;
                adjusted[d] = extent[d] / (dims[d] - 1) as f64;
            } else {
                adjusted[d] = requested;
            }
        }
        debug!(
            dims = ?dims,
            spacing = ?adjusted,
            "Created lattice covering image domain"
        );
        Self::new(
            dims,
            adjusted,
            *attributes.origin(),
            *attributes.direction(),
            attributes.t_origin(),
        )
    }

    pub fn dims(&self) -> [usize; 4] {
        self.dims
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

    pub fn kernel_size(&self) -> usize {
        Self::KERNEL_SIZE
    }

    /// Whether axis `d` has a single node.
    pub fn is_flat(&self, axis: usize) -> bool {
        self.dims[axis] == 1
    }

    pub fn number_of_control_points(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn number_of_dofs(&self) -> usize {
        3 * self.number_of_control_points()
    }

    /// Linear index of a control point, x fastest.
    ///
    /// # Panics
    /// If the index is out of range.
    pub fn control_point_offset(&self, index: [usize; 4]) -> usize {
        assert!(
            index.iter().zip(self.dims.iter()).all(|(&i, &n)| i < n),
            "Control point index {:?} out of range for lattice {:?}",
            index,
            self.dims
        );
        let [nx, ny, nz, _] = self.dims;
        index[0] + nx * (index[1] + ny * (index[2] + nz * index[3]))
    }

    /// Lattice index of a linear control point index.
    ///
    /// # Panics
    /// If the index is out of range.
    pub fn control_point_index(&self, offset: usize) -> [usize; 4] {
        assert!(
            offset < self.number_of_control_points(),
            "Control point {} out of range for lattice {:?}",
            offset,
            self.dims
        );
        let [nx, ny, nz, _] = self.dims;
        let i = offset % nx;
        let rest = offset / nx;
        let j = rest % ny;
        let rest = rest / ny;
        [i, j, rest % nz, rest / nz]
    }

    /// Linear part of the world to lattice map.
    pub fn world_to_lattice_matrix(&self) -> &Matrix3 {
        &self.to_lattice
    }

    /// Linear part of the lattice to world map.
    pub fn lattice_to_world_matrix(&self) -> &Matrix3 {
        &self.to_world
    }

    /// Map a world point to continuous lattice coordinates.
    pub fn world_to_lattice(&self, p: &Point3) -> Point3 {
        Point3::from(self.to_lattice * (p - self.origin))
    }

    /// Map continuous lattice coordinates to a world point.
    pub fn lattice_to_world(&self, q: &Point3) -> Point3 {
        self.origin + self.to_world * q.coords
    }

    pub fn time_to_lattice(&self, t: f64) -> f64 {
        (t - self.t_origin) / self.spacing[3]
    }

    pub fn lattice_to_time(&self, l: f64) -> f64 {
        self.t_origin + l * self.spacing[3]
    }

    /// Continuous lattice coordinates `(x, y, z, t)` of a world point and time.
    pub fn to_lattice_coords(&self, p: &Point3, t: f64) -> [f64; 4] {
        let q = self.world_to_lattice(p);
        [q[0], q[1], q[2], self.time_to_lattice(t)]
    }

    /// World point and time of continuous lattice coordinates.
    pub fn from_lattice_coords(&self, q: [f64; 4]) -> (Point3, f64) {
        (
            self.lattice_to_world(&Point3::new(q[0], q[1], q[2])),
            self.lattice_to_time(q[3]),
        )
    }

    /// World region influenced by a control point.
    ///
    /// The lattice region is `[i - 2 f, i + 2 f]` along every axis; a
    /// fraction of one covers the full support of the cubic kernel.
    ///
    /// # Panics
    /// If the control point index is out of range.
    pub fn bounding_box(&self, cp: usize, fraction: f64) -> BoundingBox {
        let index = self.control_point_index(cp);
        let r = 2.0 * fraction;
        let corners: Vec<Point3> = (0..8)
            .map(|corner| {
                let q = Point3::new(
                    index[0] as f64 + if corner & 1 == 0 { -r } else { r },
                    index[1] as f64 + if corner & 2 == 0 { -r } else { r },
                    index[2] as f64 + if corner & 4 == 0 { -r } else { r },
                );
                self.lattice_to_world(&q)
            })
            .collect();
        let l = index[3] as f64;
        BoundingBox::enclosing(&corners, self.lattice_to_time(l - r), self.lattice_to_time(l + r))
    }

    /// Extents after subdividing the selected axes.
    ///
    /// # Panics
    /// If a selected axis has a single node.
    pub fn dims_after_subdivision(&self, axes: [bool; 4]) -> [usize; 4] {
        std::array::from_fn(|d| {
            if axes[d] {
                assert!(
                    self.dims[d] > 1,
                    "Cannot subdivide axis {} of a lattice with a single node along it",
                    d
                );
                2 * self.dims[d] + 1
            } else {
                self.dims[d]
            }
        })
    }

    /// Spacing after subdividing the selected axes.
    pub fn spacing_after_subdivision(&self, axes: [bool; 4]) -> [f64; 4] {
        std::array::from_fn(|d| if axes[d] { self.spacing[d] / 2.0 } else { self.spacing[d] })
    }

    /// Lattice after subdividing the selected axes.
    ///
    /// Old node `i` becomes new node `2 i + 1`, so the origin moves back by
    /// one new spacing along every subdivided axis.
    ///
    /// # Panics
    /// If a selected axis has a single node.
    pub fn subdivided(&self, axes: [bool; 4]) -> Lattice {
        let dims = self.dims_after_subdivision(axes);
        let spacing = self.spacing_after_subdivision(axes);
        let shift = Vector3::new(
            if axes[0] { -0.5 } else { 0.0 },
            if axes[1] { -0.5 } else { 0.0 },
            if axes[2] { -0.5 } else { 0.0 },
        );
        let origin = self.lattice_to_world(&Point3::from(shift));
        let t_origin = if axes[3] { self.lattice_to_time(-0.5) } else { self.t_origin };
        let to_world = self.direction
            * Matrix3::from_diagonal(&Vector3::new(spacing[0], spacing[1], spacing[2]));
        Lattice {
            dims,
            spacing,
            origin,
            direction: self.direction,
            t_origin,
            to_world,
            to_lattice: self.to_lattice_after_halving(axes),
        }
    }

    fn to_lattice_after_halving(&self, axes: [bool; 4]) -> Matrix3 {
        // Halving spacing along axis d doubles row d of S^-1 R^-1.
        let mut m = self.to_lattice;
        for d in 0..3 {
            if axes[d] {
                m.row_mut(d).scale_mut(2.0);
            }
        }
        m
    }
}
