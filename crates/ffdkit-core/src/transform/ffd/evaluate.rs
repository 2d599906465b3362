//! Displacement, derivatives and DOF derivatives of the B-spline FFD.
//!
//! Lattice-level functions take continuous lattice coordinates
//! `[x, y, z, t]`; world-level functions take a world point and a time.
//! Out-of-domain queries never fail: taps outside the lattice are skipped
//! or extrapolated, and a query with no tap inside yields the default
//! displacement (zero for derivatives).

use rayon::prelude::*;

use crate::image::{Grid4, ImageAttributes};
use crate::interpolation::stencil::{
    convolve_extrapolated, convolve_inside, convolve_skip, split_coordinate, stencils_inside,
    Stencil,
};
use crate::interpolation::CubicBSpline;
use crate::spatial::{Matrix3, Point3, Vector3};
use crate::transform::dof::{dof_index, TransformationJacobian};
use super::BSplineFreeFormTransform4D;

/// Derivative orders along x, y, z, t.
pub(crate) type Orders = [usize; 4];

const VALUE: Orders = [0; 4];

fn unit_orders(d: usize) -> Orders {
    let mut orders = VALUE;
    orders[d] += 1;
    orders
}

fn in_range(n: usize) -> impl Fn(&(isize, f64)) -> bool {
    move |&(i, _)| i >= 0 && (i as usize) < n
}

fn jacobian_from(mut derivative: impl FnMut(Orders) -> Vector3) -> Matrix3 {
    let mut jacobian = Matrix3::zeros();
    for d in 0..3 {
        jacobian.set_column(d, &derivative(unit_orders(d)));
    }
    jacobian
}

fn hessian_from(mut derivative: impl FnMut(Orders) -> Vector3) -> [Matrix3; 3] {
    let mut hessian = [Matrix3::zeros(); 3];
    for d in 0..3 {
        for e in d..3 {
            let mut orders = unit_orders(d);
            orders[e] += 1;
            let value = derivative(orders);
            for (c, h) in hessian.iter_mut().enumerate() {
                h[(d, e)] = value[c];
                h[(e, d)] = value[c];
            }
        }
    }
    hessian
}

impl BSplineFreeFormTransform4D {
    /// Kernel stencils at continuous lattice coordinates.
    pub(crate) fn stencils(&self, q: [f64; 4], orders: Orders) -> [Stencil; 4] {
        std::array::from_fn(|d| {
            if self.lattice.is_flat(d) {
                Stencil::single(0, if orders[d] == 0 { 1.0 } else { 0.0 })
            } else {
                let (floor, f) = split_coordinate(q[d], self.lattice.dims()[d]);
                Stencil::from_row(floor, CubicBSpline::row(orders[d], f))
            }
        })
    }

    /// Kernel stencils at a lattice node, read from the lookup tables.
    pub(crate) fn node_stencils(&self, index: [usize; 4], orders: Orders) -> [Stencil; 4] {
        std::array::from_fn(|d| {
            if self.lattice.is_flat(d) {
                Stencil::single(0, if orders[d] == 0 { 1.0 } else { 0.0 })
            } else {
                Stencil::from_row(index[d] as isize, CubicBSpline::lookup_table(orders[d])[0])
            }
        })
    }

    /// Visit every control point inside the lattice with a non-zero
    /// stencil weight, passing its linear index and weight.
    pub(crate) fn for_each_support(&self, s: &[Stencil; 4], mut f: impl FnMut(usize, f64)) {
        let dims = self.lattice.dims();
        for (l, wl) in s[3].taps().filter(in_range(dims[3])) {
            for (k, wk) in s[2].taps().filter(in_range(dims[2])) {
                for (j, wj) in s[1].taps().filter(in_range(dims[1])) {
                    let row =
                        dims[0] * (j as usize + dims[1] * (k as usize + dims[2] * l as usize));
                    for (i, wi) in s[0].taps().filter(in_range(dims[0])) {
                        let w = wi * wj * wk * wl;
                        if w != 0.0 {
                            f(row + i as usize, w);
                        }
                    }
                }
            }
        }
    }

    fn convolve(&self, s: &[Stencil; 4], fallback: Vector3) -> Vector3 {
        if stencils_inside(s, self.lattice.dims()) {
            convolve_inside(&self.coefficients, s)
        } else {
            self.convolve_outside(s, fallback)
        }
    }

    fn convolve_outside(&self, s: &[Stencil; 4], fallback: Vector3) -> Vector3 {
        match &self.extrapolation {
            Some(extrapolation) => convolve_extrapolated(&self.coefficients, s, extrapolation),
            None => convolve_skip(&self.coefficients, s).unwrap_or(fallback),
        }
    }

    fn fallback(&self, orders: Orders) -> Vector3 {
        if orders == VALUE {
            self.default_displacement
        } else {
            Vector3::zeros()
        }
    }

    /// Whether the full support of `q` lies inside the lattice.
    pub fn is_inside(&self, q: [f64; 4]) -> bool {
        stencils_inside(&self.stencils(q, VALUE), self.lattice.dims())
    }

    /// Displacement at `q` assuming full support inside the lattice.
    ///
    /// # Panics
    /// If a control point outside the lattice would be accessed.
    pub fn evaluate_inside(&self, q: [f64; 4]) -> Vector3 {
        convolve_inside(&self.coefficients, &self.stencils(q, VALUE))
    }

    /// Displacement at `q` with bounds checks and extrapolation.
    pub fn evaluate_outside(&self, q: [f64; 4]) -> Vector3 {
        self.convolve_outside(&self.stencils(q, VALUE), self.default_displacement)
    }

    /// Displacement at continuous lattice coordinates.
    pub fn evaluate(&self, q: [f64; 4]) -> Vector3 {
        self.evaluate_derivative(q, VALUE)
    }

    /// Mixed partial derivative of the displacement with respect to lattice
    /// coordinates, `orders[d]` times along axis `d` (at most 2 per axis).
    pub fn evaluate_derivative(&self, q: [f64; 4], orders: Orders) -> Vector3 {
        self.convolve(&self.stencils(q, orders), self.fallback(orders))
    }

    /// `J[(c, d)] = du_c / dq_d` for the spatial lattice axes.
    pub fn evaluate_jacobian(&self, q: [f64; 4]) -> Matrix3 {
        jacobian_from(|orders| self.evaluate_derivative(q, orders))
    }

    /// `H[c][(d, e)] = d2u_c / dq_d dq_e` for the spatial lattice axes.
    pub fn evaluate_hessian(&self, q: [f64; 4]) -> [Matrix3; 3] {
        hessian_from(|orders| self.evaluate_derivative(q, orders))
    }

    /// Sum of the pure second partials per component.
    pub fn evaluate_laplacian(&self, q: [f64; 4]) -> Vector3 {
        let hessian = self.evaluate_hessian(q);
        Vector3::from_fn(|c, _| hessian[c].trace())
    }

    fn node_derivative(&self, index: [usize; 4], orders: Orders) -> Vector3 {
        self.lattice.control_point_offset(index);
        self.convolve(&self.node_stencils(index, orders), self.fallback(orders))
    }

    /// Displacement at a lattice node.
    ///
    /// # Panics
    /// If the node index is out of range.
    pub fn evaluate_at_node(&self, index: [usize; 4]) -> Vector3 {
        self.node_derivative(index, VALUE)
    }

    /// Lattice Jacobian at a lattice node.
    pub fn evaluate_jacobian_at_node(&self, index: [usize; 4]) -> Matrix3 {
        jacobian_from(|orders| self.node_derivative(index, orders))
    }

    /// Lattice Hessian at a lattice node.
    pub fn evaluate_hessian_at_node(&self, index: [usize; 4]) -> [Matrix3; 3] {
        hessian_from(|orders| self.node_derivative(index, orders))
    }

    /// Convert a lattice Jacobian to world coordinates, `J A`.
    pub fn jacobian_to_world(&self, jacobian: &Matrix3) -> Matrix3 {
        jacobian * self.lattice.world_to_lattice_matrix()
    }

    /// Convert lattice Hessians to world coordinates, `A^T H A`.
    pub fn hessian_to_world(&self, hessian: &[Matrix3; 3]) -> [Matrix3; 3] {
        let a = self.lattice.world_to_lattice_matrix();
        hessian.map(|h| a.transpose() * h * a)
    }

    /// Jacobian with respect to world coordinates at lattice coordinates `q`.
    pub fn evaluate_jacobian_world(&self, q: [f64; 4]) -> Matrix3 {
        self.jacobian_to_world(&self.evaluate_jacobian(q))
    }

    /// Hessian with respect to world coordinates at lattice coordinates `q`.
    pub fn evaluate_hessian_world(&self, q: [f64; 4]) -> [Matrix3; 3] {
        self.hessian_to_world(&self.evaluate_hessian(q))
    }

    /// Displacement at a world point and time.
    pub fn displacement(&self, p: &Point3, t: f64) -> Vector3 {
        self.evaluate(self.lattice.to_lattice_coords(p, t))
    }

    /// Transformed position `p + u(p, t)`.
    pub fn transform_point(&self, p: &Point3, t: f64) -> Point3 {
        p + self.displacement(p, t)
    }

    /// Jacobian of the local transformation `p + u(p, t)` in world coordinates.
    pub fn local_jacobian(&self, p: &Point3, t: f64) -> Matrix3 {
        self.evaluate_jacobian_world(self.lattice.to_lattice_coords(p, t)) + Matrix3::identity()
    }

    /// Hessian of the displacement in world coordinates.
    pub fn local_hessian(&self, p: &Point3, t: f64) -> [Matrix3; 3] {
        self.evaluate_hessian_world(self.lattice.to_lattice_coords(p, t))
    }

    /// Determinant of the local Jacobian.
    pub fn jacobian_determinant(&self, p: &Point3, t: f64) -> f64 {
        self.local_jacobian(p, t).determinant()
    }

    /// Displacement at every voxel of an image domain.
    pub fn displacement_field(&self, attributes: &ImageAttributes) -> Grid4<Vector3> {
        let mut field = Grid4::new(attributes.size());
        let [nx, ny, nz, _] = attributes.size();
        field
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, value)| {
                let i = offset % nx;
                let j = (offset / nx) % ny;
                let k = (offset / (nx * ny)) % nz;
                let l = offset / (nx * ny * nz);
                let p = attributes.voxel_to_world(&Point3::new(i as f64, j as f64, k as f64));
                *value = self.displacement(&p, attributes.voxel_to_time(l as f64));
            });
        field
    }

    /// Derivatives of the displacement at `q` with respect to every active
    /// DOF in local support.
    ///
    /// Only control points inside the lattice are DOFs. Coefficients outside
    /// it count as zero, whatever the configured extrapolation, so near the
    /// boundary this is the derivative of the unextrapolated field and a
    /// query with no support inside the lattice yields an empty Jacobian.
    pub fn evaluate_jacobian_dofs(&self, q: [f64; 4]) -> TransformationJacobian {
        let mut jacobian = TransformationJacobian::new();
        self.for_each_support(&self.stencils(q, VALUE), |cp, w| {
            for c in 0..3 {
                let dof = dof_index(cp, c);
                if self.is_active(dof) {
                    let mut value = Vector3::zeros();
                    value[c] = w;
                    jacobian.add(dof, value);
                }
            }
        });
        jacobian
    }

    /// DOF derivatives at a world point and time. Outside coefficients count
    /// as zero, as in [`Self::evaluate_jacobian_dofs`].
    pub fn jacobian_dofs(&self, p: &Point3, t: f64) -> TransformationJacobian {
        self.evaluate_jacobian_dofs(self.lattice.to_lattice_coords(p, t))
    }

    /// Derivative of the displacement at `(p, t)` with respect to each
    /// component of control point `cp`. The kernel is isotropic, so all
    /// three entries are equal.
    ///
    /// # Panics
    /// If `cp` is out of range.
    pub fn jacobian_dofs_at(&self, cp: usize, p: &Point3, t: f64) -> [f64; 3] {
        let index = self.lattice.control_point_index(cp);
        let q = self.lattice.to_lattice_coords(p, t);
        let w: f64 = (0..4)
            .map(|d| {
                if self.lattice.is_flat(d) {
                    1.0
                } else {
                    CubicBSpline::weight(q[d] - index[d] as f64)
                }
            })
            .product();
        [w; 3]
    }
}
