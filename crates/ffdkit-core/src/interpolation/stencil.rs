//! Separable stencils and 4D convolution over grids.
//!
//! A stencil is the list of taps along one axis. Four stencils, one per
//! axis, define a separable weighted sum over a `Grid4`. The routines here
//! differ only in how taps outside the grid are treated.

use serde::{Deserialize, Serialize};

use crate::image::{Grid4, Voxel};
use super::kernel::KernelRow;

/// Maximum number of taps along one axis.
pub const MAX_TAPS: usize = 12;

/// Weights of consecutive grid indices along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    /// Grid index of the first tap.
    pub first: isize,
    /// Number of taps in use.
    pub len: usize,
    pub weights: [f64; MAX_TAPS],
}

impl Stencil {
    /// One tap at `index`.
    pub fn single(index: isize, weight: f64) -> Self {
        let mut weights = [0.0; MAX_TAPS];
        weights[0] = weight;
        Self {
            first: index,
            len: 1,
            weights,
        }
    }

    /// Four taps starting at `floor - 1`.
    pub fn from_row(floor: isize, row: KernelRow) -> Self {
        let mut weights = [0.0; MAX_TAPS];
        weights[..4].copy_from_slice(&row);
        Self {
            first: floor - 1,
            len: 4,
            weights,
        }
    }

    /// Taps from explicit weights.
    ///
    /// # Panics
    /// If more than `MAX_TAPS` weights are given.
    pub fn from_slice(first: isize, w: &[f64]) -> Self {
        assert!(w.len() <= MAX_TAPS, "Stencil supports at most {} taps, got {}", MAX_TAPS, w.len());
        let mut weights = [0.0; MAX_TAPS];
        weights[..w.len()].copy_from_slice(w);
        Self {
            first,
            len: w.len(),
            weights,
        }
    }

    /// Last tap index (inclusive).
    pub fn last(&self) -> isize {
        self.first + self.len as isize - 1
    }

    /// Whether every tap lies in `0..n`.
    pub fn is_inside(&self, n: usize) -> bool {
        self.first >= 0 && self.last() < n as isize
    }

    /// Whether at least one tap lies in `0..n`.
    pub fn overlaps(&self, n: usize) -> bool {
        self.last() >= 0 && self.first < n as isize
    }

    /// `(index, weight)` pairs.
    pub fn taps(&self) -> impl Iterator<Item = (isize, f64)> + '_ {
        self.weights[..self.len]
            .iter()
            .enumerate()
            .map(move |(k, &w)| (self.first + k as isize, w))
    }
}

/// Floor of `x` as an index, and the fraction `x - floor(x)`.
///
/// The index is clamped to `MAX_TAPS + 1` nodes beyond either end of an
/// axis of `n` nodes, so far-out coordinates keep every tap outside the
/// axis without overflowing index arithmetic.
pub fn split_coordinate(x: f64, n: usize) -> (isize, f64) {
    let floor = x.floor();
    let margin = (MAX_TAPS + 1) as f64;
    let index = floor.clamp(-margin, n as f64 + margin) as isize;
    (index, x - floor)
}

/// Whether all four stencils lie inside the grid extents.
pub fn stencils_inside(stencils: &[Stencil; 4], dims: [usize; 4]) -> bool {
    (0..4).all(|d| stencils[d].is_inside(dims[d]))
}

/// How values outside a grid are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Extrapolation<T> {
    /// Every outside voxel has the same value.
    Constant(T),
    /// Indices are clamped to the nearest edge voxel.
    NearestEdge,
    /// Indices are reflected at the edge voxels.
    Mirror,
}

impl<T: Voxel> Extrapolation<T> {
    /// Value of the grid at a possibly outside index.
    pub fn value(&self, grid: &Grid4<T>, index: [isize; 4]) -> T {
        if grid.contains(index) {
            return grid.get(index.map(|i| i as usize));
        }
        let dims = grid.dims();
        match self {
            Extrapolation::Constant(value) => *value,
            Extrapolation::NearestEdge => {
                grid.get(std::array::from_fn(|d| clamp_index(index[d], dims[d])))
            }
            Extrapolation::Mirror => {
                grid.get(std::array::from_fn(|d| mirror_index(index[d], dims[d])))
            }
        }
    }
}

/// Clamp a signed index to `0..n`.
pub fn clamp_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

/// Reflect a signed index into `0..n` about the edge voxels.
pub fn mirror_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Weighted sum with every tap inside the grid. No bounds checks beyond
/// slice indexing.
pub fn convolve_inside<T: Voxel>(grid: &Grid4<T>, s: &[Stencil; 4]) -> T {
    let data = grid.as_slice();
    let [nx, ny, nz, _] = grid.dims();
    let mut sum = T::zero();
    for (l, wl) in s[3].taps() {
        for (k, wk) in s[2].taps() {
            let wkl = wk * wl;
            for (j, wj) in s[1].taps() {
                let wjkl = wj * wkl;
                let row = nx * (j as usize + ny * (k as usize + nz * l as usize));
                for (i, wi) in s[0].taps() {
                    sum = sum + data[row + i as usize] * (wi * wjkl);
                }
            }
        }
    }
    sum
}

/// Weighted sum over the taps inside the grid; outside taps contribute zero.
///
/// Returns `None` when no tap lies inside.
pub fn convolve_skip<T: Voxel>(grid: &Grid4<T>, s: &[Stencil; 4]) -> Option<T> {
    let dims = grid.dims();
    if !(0..4).all(|d| s[d].overlaps(dims[d])) {
        return None;
    }
    let mut sum = T::zero();
    for (l, wl) in s[3].taps().filter(|&(l, _)| l >= 0 && (l as usize) < dims[3]) {
        for (k, wk) in s[2].taps().filter(|&(k, _)| k >= 0 && (k as usize) < dims[2]) {
            for (j, wj) in s[1].taps().filter(|&(j, _)| j >= 0 && (j as usize) < dims[1]) {
                for (i, wi) in s[0].taps().filter(|&(i, _)| i >= 0 && (i as usize) < dims[0]) {
                    let value = grid.get([i as usize, j as usize, k as usize, l as usize]);
                    sum = sum + value * (wi * wj * wk * wl);
                }
            }
        }
    }
    Some(sum)
}

/// Weighted sum with outside taps resolved by `extrapolation`.
pub fn convolve_extrapolated<T: Voxel>(
    grid: &Grid4<T>,
    s: &[Stencil; 4],
    extrapolation: &Extrapolation<T>,
) -> T {
    let mut sum = T::zero();
    for (l, wl) in s[3].taps() {
        for (k, wk) in s[2].taps() {
            for (j, wj) in s[1].taps() {
                for (i, wi) in s[0].taps() {
                    let value = extrapolation.value(grid, [i, j, k, l]);
                    sum = sum + value * (wi * wj * wk * wl);
                }
            }
        }
    }
    sum
}

/// Weighted sum over foreground taps, renormalized by the foreground weight.
///
/// A tap is background when `mask` holds `background` at its index or when
/// it lies outside the grid. Values are read from `values`, which must have
/// the extents of `mask`. Returns `None` when the foreground weight is zero.
pub fn convolve_with_padding<T: Voxel>(
    mask: &Grid4<T>,
    values: &Grid4<T>,
    s: &[Stencil; 4],
    background: T,
) -> Option<T> {
    let dims = mask.dims();
    let mut sum = T::zero();
    let mut total = 0.0;
    for (l, wl) in s[3].taps().filter(|&(l, _)| l >= 0 && (l as usize) < dims[3]) {
        for (k, wk) in s[2].taps().filter(|&(k, _)| k >= 0 && (k as usize) < dims[2]) {
            for (j, wj) in s[1].taps().filter(|&(j, _)| j >= 0 && (j as usize) < dims[1]) {
                for (i, wi) in s[0].taps().filter(|&(i, _)| i >= 0 && (i as usize) < dims[0]) {
                    let index = [i as usize, j as usize, k as usize, l as usize];
                    if mask.get(index) == background {
                        continue;
                    }
                    let w = wi * wj * wk * wl;
                    sum = sum + values.get(index) * w;
                    total += w;
                }
            }
        }
    }
    if total.abs() > f64::EPSILON {
        Some(sum * (1.0 / total))
    } else {
        None
    }
}
