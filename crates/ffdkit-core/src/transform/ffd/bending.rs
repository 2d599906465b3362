//! Bending energy of the displacement field.
//!
//! The bending energy density at a point is
//!
//! ```text
//! sum_c (H_xx^2 + H_yy^2 + H_zz^2 + 2 H_xy^2 + 2 H_xz^2 + 2 H_yz^2)
//! ```
//!
//! over the spatial Hessians of the three displacement components, which is
//! the squared Frobenius norm of each symmetric Hessian.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::image::ImageAttributes;
use crate::spatial::{Matrix3, Point3};
use crate::transform::dof::dof_index;
use super::approximate::merge_gradients;
use super::BSplineFreeFormTransform4D;

/// How the energy over the control lattice is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BendingEnergyMode {
    /// Average of the density at the control points.
    #[default]
    ControlPoints,
    /// Two-point Gauss-Legendre quadrature per spatial cell, at every time node.
    Quadrature,
}

fn density(hessian: &[Matrix3; 3]) -> f64 {
    hessian.iter().map(|h| h.norm_squared()).sum()
}

fn sum_count(a: (f64, usize), b: (f64, usize)) -> (f64, usize) {
    (a.0 + b.0, a.1 + b.1)
}

impl BSplineFreeFormTransform4D {
    fn maybe_world(&self, hessian: [Matrix3; 3], wrt_world: bool) -> [Matrix3; 3] {
        if wrt_world {
            self.hessian_to_world(&hessian)
        } else {
            hessian
        }
    }

    /// Bending energy density at a world point and time.
    ///
    /// Derivatives are taken with respect to lattice coordinates unless
    /// `wrt_world` is set.
    pub fn bending_energy_at(&self, p: &Point3, t: f64, wrt_world: bool) -> f64 {
        let q = self.lattice.to_lattice_coords(p, t);
        density(&self.maybe_world(self.evaluate_hessian(q), wrt_world))
    }

    /// Control points counted by the lattice energy.
    fn energy_nodes(&self, incl_passive: bool) -> Vec<usize> {
        (0..self.number_of_control_points())
            .filter(|&cp| incl_passive || !self.is_passive_control_point(cp))
            .collect()
    }

    /// Average bending energy over the control lattice.
    ///
    /// In `ControlPoints` mode, control points whose DOFs are all passive
    /// are skipped unless `incl_passive` is set. Returns zero when nothing
    /// is evaluated.
    pub fn bending_energy(
        &self,
        mode: BendingEnergyMode,
        incl_passive: bool,
        wrt_world: bool,
    ) -> f64 {
        let (sum, count) = match mode {
            BendingEnergyMode::ControlPoints => self
                .energy_nodes(incl_passive)
                .par_iter()
                .map(|&cp| {
                    let index = self.lattice.control_point_index(cp);
                    let hessian = self.maybe_world(self.evaluate_hessian_at_node(index), wrt_world);
                    (density(&hessian), 1)
                })
                .reduce(|| (0.0, 0), sum_count),
            BendingEnergyMode::Quadrature => self.quadrature_sum(wrt_world),
        };
        if count > 0 {
            sum / count as f64
        } else {
            0.0
        }
    }

    fn quadrature_sum(&self, wrt_world: bool) -> (f64, usize) {
        let offset = 0.5 / 3f64.sqrt();
        let dims = self.lattice.dims();
        let nodes: [Vec<f64>; 3] = std::array::from_fn(|d| {
            if dims[d] == 1 {
                vec![0.0]
            } else {
                (0..dims[d] - 1)
                    .flat_map(|cell| {
                        let center = cell as f64 + 0.5;
                        [center - offset, center + offset]
                    })
                    .collect()
            }
        });
        let [nx, ny, nz] = [nodes[0].len(), nodes[1].len(), nodes[2].len()];
        (0..nx * ny * nz * dims[3])
            .into_par_iter()
            .map(|n| {
                let q = [
                    nodes[0][n % nx],
                    nodes[1][(n / nx) % ny],
                    nodes[2][(n / (nx * ny)) % nz],
                    (n / (nx * ny * nz)) as f64,
                ];
                (density(&self.maybe_world(self.evaluate_hessian(q), wrt_world)), 1)
            })
            .reduce(|| (0.0, 0), sum_count)
    }

    /// Average bending energy over the voxels of an image domain.
    pub fn bending_energy_on(&self, attributes: &ImageAttributes, wrt_world: bool) -> f64 {
        let [nx, ny, nz, _] = attributes.size();
        let total = attributes.number_of_voxels();
        let sum: f64 = (0..total)
            .into_par_iter()
            .map(|offset| {
                let p = attributes.voxel_to_world(&Point3::new(
                    (offset % nx) as f64,
                    ((offset / nx) % ny) as f64,
                    ((offset / (nx * ny)) % nz) as f64,
                ));
                let t = attributes.voxel_to_time((offset / (nx * ny * nz)) as f64);
                self.bending_energy_at(&p, t, wrt_world)
            })
            .sum();
        sum / total as f64
    }

    /// Add `weight` times the gradient of the control-point bending energy
    /// (`BendingEnergyMode::ControlPoints`) into `gradient` for active DOFs.
    ///
    /// Coefficients outside the lattice are taken as zero.
    ///
    /// # Panics
    /// If `gradient` does not have one entry per DOF.
    pub fn bending_energy_gradient(
        &self,
        gradient: &mut [f64],
        weight: f64,
        incl_passive: bool,
        wrt_world: bool,
    ) {
        let n = self.number_of_dofs();
        assert_eq!(gradient.len(), n, "Gradient buffer must have one entry per DOF");
        let nodes = self.energy_nodes(incl_passive);
        if nodes.is_empty() {
            return;
        }
        let scale = 2.0 / nodes.len() as f64;
        let a = *self.lattice.world_to_lattice_matrix();
        let local = nodes
            .par_iter()
            .fold(
                || vec![0.0; n],
                |mut acc, &cp| {
                    let index = self.lattice.control_point_index(cp);
                    let hessian = self.evaluate_hessian_at_node(index);
                    // Derivative of the density with respect to the lattice Hessian.
                    let outer: [Matrix3; 3] = if wrt_world {
                        self.hessian_to_world(&hessian)
                            .map(|h| a * h * a.transpose() * scale)
                    } else {
                        hessian.map(|h| h * scale)
                    };
                    for d in 0..3 {
                        for e in d..3 {
                            let factor = if d == e { 1.0 } else { 2.0 };
                            let mut orders = [0; 4];
                            orders[d] += 1;
                            orders[e] += 1;
                            let stencils = self.node_stencils(index, orders);
                            self.for_each_support(&stencils, |k, beta| {
                                for c in 0..3 {
                                    acc[dof_index(k, c)] += factor * outer[c][(d, e)] * beta;
                                }
                            });
                        }
                    }
                    acc
                },
            )
            .reduce(|| vec![0.0; n], merge_gradients);
        self.accumulate_active(&local, gradient, weight);
    }
}
