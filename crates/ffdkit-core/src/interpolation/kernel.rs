//! Interpolation kernels.
//!
//! Kernel rows hold the weights of the four nodes `floor(x) - 1 ..= floor(x) + 2`
//! for the fractional part `f = x - floor(x)`.

use std::sync::OnceLock;

/// Number of rows in each cubic B-spline lookup table.
pub const LOOKUP_TABLE_SIZE: usize = 1000;

/// Weights of the four nodes around a coordinate.
pub type KernelRow = [f64; 4];

/// Uniform cubic B-spline basis.
///
/// The kernel is defined as:
/// - (4 - 6|u|^2 + 3|u|^3) / 6    for |u| < 1
/// - (2 - |u|)^3 / 6              for 1 <= |u| < 2
/// - 0                            otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicBSpline;

impl CubicBSpline {
    /// Highest derivative order with a lookup table.
    pub const MAX_ORDER: usize = 2;

    /// Kernel value at signed distance `u` from a node.
    pub fn weight(u: f64) -> f64 {
        let a = u.abs();
        if a < 1.0 {
            (4.0 - 6.0 * a * a + 3.0 * a * a * a) / 6.0
        } else if a < 2.0 {
            let b = 2.0 - a;
            b * b * b / 6.0
        } else {
            0.0
        }
    }

    /// Basis weights for fraction `f`.
    pub fn weights(f: f64) -> KernelRow {
        let g = 1.0 - f;
        let f2 = f * f;
        let f3 = f2 * f;
        [
            g * g * g / 6.0,
            (3.0 * f3 - 6.0 * f2 + 4.0) / 6.0,
            (-3.0 * f3 + 3.0 * f2 + 3.0 * f + 1.0) / 6.0,
            f3 / 6.0,
        ]
    }

    /// First derivatives of the basis weights with respect to the coordinate.
    pub fn first_derivatives(f: f64) -> KernelRow {
        let g = 1.0 - f;
        let f2 = f * f;
        [
            -0.5 * g * g,
            1.5 * f2 - 2.0 * f,
            -1.5 * f2 + f + 0.5,
            0.5 * f2,
        ]
    }

    /// Second derivatives of the basis weights with respect to the coordinate.
    pub fn second_derivatives(f: f64) -> KernelRow {
        [1.0 - f, 3.0 * f - 2.0, 1.0 - 3.0 * f, f]
    }

    /// Closed-form row of the given derivative order.
    ///
    /// # Panics
    /// If `order > 2`.
    pub fn row(order: usize, f: f64) -> KernelRow {
        match order {
            0 => Self::weights(f),
            1 => Self::first_derivatives(f),
            2 => Self::second_derivatives(f),
            _ => panic!("Cubic B-spline derivative order must be at most 2, got {}", order),
        }
    }

    /// Lookup table row index of fraction `f`.
    pub fn variable_to_index(f: f64) -> usize {
        if f < 0.0 {
            0
        } else if f >= 1.0 {
            LOOKUP_TABLE_SIZE - 1
        } else {
            (f * (LOOKUP_TABLE_SIZE - 1) as f64).round() as usize
        }
    }

    /// Precomputed rows for the given derivative order.
    ///
    /// Tables are built once per process on first use and shared by all
    /// threads afterwards.
    ///
    /// # Panics
    /// If `order > 2`.
    pub fn lookup_table(order: usize) -> &'static [KernelRow] {
        static TABLES: OnceLock<[Vec<KernelRow>; 3]> = OnceLock::new();
        assert!(
            order <= Self::MAX_ORDER,
            "Cubic B-spline derivative order must be at most 2, got {}",
            order
        );
        let tables = TABLES.get_or_init(|| {
            std::array::from_fn(|order| {
                (0..LOOKUP_TABLE_SIZE)
                    .map(|r| Self::row(order, r as f64 / (LOOKUP_TABLE_SIZE - 1) as f64))
                    .collect()
            })
        });
        &tables[order]
    }

    /// Quantized row for fraction `f`.
    pub fn lookup(order: usize, f: f64) -> KernelRow {
        Self::lookup_table(order)[Self::variable_to_index(f)]
    }
}

/// Catmull-Rom cubic convolution kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatmullRom;

impl CatmullRom {
    /// Weights for fraction `f`.
    pub fn weights(f: f64) -> KernelRow {
        let f2 = f * f;
        let f3 = f2 * f;
        [
            -0.5 * f3 + f2 - 0.5 * f,
            1.5 * f3 - 2.5 * f2 + 1.0,
            -1.5 * f3 + 2.0 * f2 + 0.5 * f,
            0.5 * f3 - 0.5 * f2,
        ]
    }
}

/// Largest Gaussian radius in samples.
pub const MAX_GAUSSIAN_RADIUS: usize = 6;

/// Sampled Gaussian kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    sigma: f64,
}

impl Gaussian {
    /// # Panics
    /// If `sigma` is not positive.
    pub fn new(sigma: f64) -> Self {
        assert!(sigma > 0.0, "Gaussian sigma must be positive, got {}", sigma);
        Self { sigma }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Support radius in samples, `min(ceil(3 sigma), 6)` and at least 1.
    pub fn radius(&self) -> usize {
        ((3.0 * self.sigma).ceil() as usize).clamp(1, MAX_GAUSSIAN_RADIUS)
    }

    /// Normalized weights of nodes `floor(x) - radius + 1 ..= floor(x) + radius`.
    ///
    /// Returns the number of taps written into `out`.
    pub fn weights_into(&self, f: f64, out: &mut [f64]) -> usize {
        let r = self.radius() as isize;
        let len = (2 * r) as usize;
        let denom = 2.0 * self.sigma * self.sigma;
        let mut sum = 0.0;
        for (k, w) in out[..len].iter_mut().enumerate() {
            let d = f - (k as isize - r + 1) as f64;
            *w = (-d * d / denom).exp();
            sum += *w;
        }
        for w in &mut out[..len] {
            *w /= sum;
        }
        len
    }
}
