//! Dense 4D voxel storage.
//!
//! `Grid4` is the storage behind both sampled images and control-point
//! arrays. Elements are laid out with x fastest, then y, z and t.

use std::ops::{Add, Mul, Sub};

use crate::error::{FfdError, Result};
use crate::spatial::Vector3;

/// Values that can be stored in a grid and combined linearly.
pub trait Voxel:
    Copy
    + PartialEq
    + Send
    + Sync
    + std::fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + 'static
{
    /// Additive identity.
    fn zero() -> Self;
}

impl Voxel for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Voxel for Vector3 {
    fn zero() -> Self {
        Vector3::zeros()
    }
}

/// Dense 4D array of voxels.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid4<T> {
    dims: [usize; 4],
    data: Vec<T>,
}

impl<T: Voxel> Grid4<T> {
    /// Create a grid filled with zeros.
    ///
    /// # Panics
    /// If any extent is zero.
    pub fn new(dims: [usize; 4]) -> Self {
        Self::filled(dims, T::zero())
    }

    /// Create a grid filled with `value`.
    ///
    /// # Panics
    /// If any extent is zero.
    pub fn filled(dims: [usize; 4], value: T) -> Self {
        assert!(dims.iter().all(|&n| n > 0), "Grid extents must be positive, got {:?}", dims);
        Self {
            dims,
            data: vec![value; dims.iter().product()],
        }
    }

    /// Wrap existing data laid out x fastest.
    pub fn from_vec(dims: [usize; 4], data: Vec<T>) -> Result<Self> {
        if dims.iter().any(|&n| n == 0) {
            return Err(FfdError::invalid_dimensions(format!(
                "grid extents must be positive, got {:?}",
                dims
            )));
        }
        FfdError::check_length(dims.iter().product(), data.len())?;
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> [usize; 4] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear offset of a voxel index.
    #[inline]
    pub fn offset(&self, index: [usize; 4]) -> usize {
        let [nx, ny, nz, _] = self.dims;
        index[0] + nx * (index[1] + ny * (index[2] + nz * index[3]))
    }

    /// Voxel index of a linear offset.
    #[inline]
    pub fn index_of(&self, offset: usize) -> [usize; 4] {
        let [nx, ny, nz, _] = self.dims;
        let i = offset % nx;
        let rest = offset / nx;
        let j = rest % ny;
        let rest = rest / ny;
        [i, j, rest % nz, rest / nz]
    }

    /// Whether a signed index lies inside the grid.
    #[inline]
    pub fn contains(&self, index: [isize; 4]) -> bool {
        index
            .iter()
            .zip(self.dims.iter())
            .all(|(&i, &n)| i >= 0 && (i as usize) < n)
    }

    #[inline]
    pub fn get(&self, index: [usize; 4]) -> T {
        self.data[self.offset(index)]
    }

    #[inline]
    pub fn get_mut(&mut self, index: [usize; 4]) -> &mut T {
        let offset = self.offset(index);
        &mut self.data[offset]
    }

    #[inline]
    pub fn set(&mut self, index: [usize; 4], value: T) {
        let offset = self.offset(index);
        self.data[offset] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Replace every line of voxels along `axis` by `f(line)`.
    ///
    /// The closure receives a scratch buffer holding one line in increasing
    /// index order and modifies it in place.
    pub fn for_each_line_mut(&mut self, axis: usize, mut f: impl FnMut(&mut [T])) {
        assert!(axis < 4, "Axis must be in 0..4, got {}", axis);
        let n = self.dims[axis];
        let stride: usize = self.dims[..axis].iter().product();
        let mut line = vec![T::zero(); n];
        for start in 0..self.data.len() {
            // A line starts wherever the index along `axis` is zero.
            if (start / stride) % n != 0 {
                continue;
            }
            for (m, value) in line.iter_mut().enumerate() {
                *value = self.data[start + m * stride];
            }
            f(&mut line);
            for (m, value) in line.iter().enumerate() {
                self.data[start + m * stride] = *value;
            }
        }
    }
}
