//! Spatial types for points, displacements and orientation matrices.
//!
//! All types are plain nalgebra aliases over `f64`. Lattice coordinates and
//! world coordinates share the same types; which frame a value lives in is
//! carried by the function that produced it.

use nalgebra::{Point3 as NaPoint3, SMatrix, SVector};
use serde::{Deserialize, Serialize};

pub type Point3 = NaPoint3<f64>;
pub type Vector3 = SVector<f64, 3>;
pub type Matrix3 = SMatrix<f64, 3, 3>;

/// Orientation of three axes; column `i` is the world direction of axis `i`.
pub type Direction3 = Matrix3;

/// World-space region influenced by a control point.
///
/// The spatial part is axis-aligned in world coordinates; for oblique
/// lattices it encloses the rotated lattice-space box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
    pub t_min: f64,
    pub t_max: f64,
}

impl BoundingBox {
    /// Smallest box enclosing the given corners over `[t_min, t_max]`.
    pub fn enclosing(corners: &[Point3], t_min: f64, t_max: f64) -> Self {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in corners {
            for d in 0..3 {
                min[d] = min[d].min(corner[d]);
                max[d] = max[d].max(corner[d]);
            }
        }
        Self {
            min,
            max,
            t_min: t_min.min(t_max),
            t_max: t_min.max(t_max),
        }
    }

    /// Whether a world point at time `t` lies inside the box (inclusive).
    pub fn contains(&self, p: &Point3, t: f64) -> bool {
        (0..3).all(|d| p[d] >= self.min[d] && p[d] <= self.max[d])
            && t >= self.t_min
            && t <= self.t_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_enclosing() {
        let corners = [
            Point3::new(1.0, -2.0, 0.5),
            Point3::new(-1.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
        ];
        let bb = BoundingBox::enclosing(&corners, 4.0, 1.0);
        assert_eq!(bb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(bb.max, Point3::new(1.0, 3.0, 2.0));
        assert_eq!((bb.t_min, bb.t_max), (1.0, 4.0));
        assert!(bb.contains(&Point3::new(0.0, 0.0, 1.0), 2.0));
        assert!(!bb.contains(&Point3::new(0.0, 0.0, 1.0), 5.0));
    }
}
