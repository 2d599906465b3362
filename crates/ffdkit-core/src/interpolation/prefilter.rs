//! Cubic B-spline interpolation prefilter.
//!
//! Turns node samples `v` into coefficients `c` such that the cubic B-spline
//! with coefficients `c` passes through every sample. Along each axis this
//! solves `(c[i-1] + 4 c[i] + c[i+1]) / 6 = v[i]` with `c` zero outside the
//! grid, which matches evaluation that skips outside taps.

use crate::image::{Grid4, Voxel};

/// Solve the interpolation system along one line in place.
///
/// Lines of length one are left unchanged; singleton axes are not filtered.
pub fn solve_line<T: Voxel>(line: &mut [T]) {
    let n = line.len();
    if n < 2 {
        return;
    }
    const A: f64 = 1.0 / 6.0;
    const B: f64 = 4.0 / 6.0;
    // Thomas algorithm with constant diagonals.
    let mut upper = vec![0.0; n];
    upper[0] = A / B;
    line[0] = line[0] * (1.0 / B);
    for i in 1..n {
        let m = 1.0 / (B - A * upper[i - 1]);
        upper[i] = A * m;
        line[i] = (line[i] - line[i - 1] * A) * m;
    }
    for i in (0..n - 1).rev() {
        line[i] = line[i] - line[i + 1] * upper[i];
    }
}

/// Interpolation coefficients of a grid of node samples.
pub fn interpolation_coefficients<T: Voxel>(samples: &Grid4<T>) -> Grid4<T> {
    let mut coefficients = samples.clone();
    prefilter_in_place(&mut coefficients);
    coefficients
}

/// Replace node samples by interpolation coefficients.
pub fn prefilter_in_place<T: Voxel>(grid: &mut Grid4<T>) {
    let dims = grid.dims();
    for axis in 0..4 {
        if dims[axis] > 1 {
            grid.for_each_line_mut(axis, solve_line::<T>);
        }
    }
}
