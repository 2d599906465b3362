//! Exact refinement of the control lattice.
//!
//! A cubic B-spline on a lattice of spacing `h` is also a cubic B-spline on
//! spacing `h / 2`. With old node `i` mapped to new node `2 i + 1`, the new
//! coefficients are
//!
//! ```text
//! c'[2i + 1] = (c[i - 1] + 6 c[i] + c[i + 1]) / 8
//! c'[2i + 2] = (c[i] + c[i + 1]) / 2
//! ```
//!
//! with `c` zero outside the old lattice.

use tracing::debug;

use crate::image::Grid4;
use crate::spatial::Vector3;
use crate::transform::dof::DofStatus;
use crate::transform::observer::ChangeEvent;
use super::BSplineFreeFormTransform4D;

fn refine_axis(coarse: &Grid4<Vector3>, axis: usize) -> Grid4<Vector3> {
    let old_dims = coarse.dims();
    let n = old_dims[axis] as isize;
    let mut dims = old_dims;
    dims[axis] = 2 * old_dims[axis] + 1;
    let mut fine = Grid4::new(dims);
    let at = |index: [usize; 4], i: isize| -> Vector3 {
        if i < 0 || i >= n {
            Vector3::zeros()
        } else {
            let mut index = index;
            index[axis] = i as usize;
            coarse.get(index)
        }
    };
    for offset in 0..fine.len() {
        let index = fine.index_of(offset);
        let m = index[axis] as isize;
        let value = if m % 2 == 1 {
            let i = (m - 1) / 2;
            (at(index, i - 1) + at(index, i) * 6.0 + at(index, i + 1)) * 0.125
        } else {
            let i = m / 2 - 1;
            (at(index, i) + at(index, i + 1)) * 0.5
        };
        fine.as_mut_slice()[offset] = value;
    }
    fine
}

impl BSplineFreeFormTransform4D {
    /// Double the lattice resolution along the selected axes `(x, y, z, t)`
    /// without changing the field on the original domain.
    ///
    /// Every DOF of the refined lattice is active afterwards.
    ///
    /// # Panics
    /// If a selected axis has a single node.
    pub fn subdivide(&mut self, axes: [bool; 4]) {
        let lattice = self.lattice.subdivided(axes);
        let mut coefficients = self.coefficients.clone();
        for axis in (0..4).filter(|&d| axes[d]) {
            coefficients = refine_axis(&coefficients, axis);
        }
        debug!(
            from = ?self.lattice.dims(),
            to = ?lattice.dims(),
            "Subdivided control lattice"
        );
        self.status = vec![DofStatus::Active; lattice.number_of_dofs()];
        self.lattice = lattice;
        self.coefficients = coefficients;
        self.notify(ChangeEvent::Geometry);
    }

    /// Subdivide the spatial axes with more than one node.
    pub fn subdivide_spatial(&mut self) {
        let axes = std::array::from_fn(|d| d < 3 && !self.lattice.is_flat(d));
        self.subdivide(axes);
    }
}
