//! Burn tensor seam.
//!
//! Tensor-based registration code consumes transforms through
//! [`Transform`]. The free-form transformation evaluates on the CPU in
//! `f64`; tensors are converted at the boundary.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::image::ImageAttributes;
use crate::spatial::Point3;
use crate::transform::trait_::Transform;
use super::BSplineFreeFormTransform4D;

/// The transformation frozen at one time, mapping `[N, 3]` world points.
#[derive(Debug, Clone, Copy)]
pub struct FfdTimeSlice<'a> {
    ffd: &'a BSplineFreeFormTransform4D,
    time: f64,
}

impl FfdTimeSlice<'_> {
    pub fn time(&self) -> f64 {
        self.time
    }
}

impl BSplineFreeFormTransform4D {
    /// View of the spatial transformation at time `t`.
    pub fn at_time(&self, t: f64) -> FfdTimeSlice<'_> {
        FfdTimeSlice { ffd: self, time: t }
    }

    /// Displacement field of one frame of an image domain as a
    /// `[3, nz, ny, nx]` tensor.
    ///
    /// # Panics
    /// If `frame` is out of range.
    pub fn displacement_field_tensor<B: Backend>(
        &self,
        attributes: &ImageAttributes,
        frame: usize,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        let [nx, ny, nz, nt] = attributes.size();
        assert!(frame < nt, "Frame {} out of range for {} frames", frame, nt);
        let t = attributes.voxel_to_time(frame as f64);
        let plane = nx * ny * nz;
        let mut values = vec![0.0f64; 3 * plane];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let p = attributes.voxel_to_world(&Point3::new(i as f64, j as f64, k as f64));
                    let u = self.displacement(&p, t);
                    let offset = i + nx * (j + ny * k);
                    for c in 0..3 {
                        values[c * plane + offset] = u[c];
                    }
                }
            }
        }
        let data = TensorData::new(values, [3, nz, ny, nx]).convert::<B::FloatElem>();
        Tensor::from_data(data, device)
    }
}

impl<B: Backend> Transform<B, 3> for FfdTimeSlice<'_> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let [n, d] = points.dims();
        assert_eq!(d, 3, "Points must have shape [Batch, 3]");
        let data = points.into_data();
        let coords: Vec<f64> = data.iter::<f64>().collect();
        let mut mapped = Vec::with_capacity(n * 3);
        for p in coords.chunks_exact(3) {
            let q = self.ffd.transform_point(&Point3::new(p[0], p[1], p[2]), self.time);
            mapped.extend_from_slice(&[q[0], q[1], q[2]]);
        }
        let data = TensorData::new(mapped, [n, 3]).convert::<B::FloatElem>();
        Tensor::from_data(data, &device)
    }
}
