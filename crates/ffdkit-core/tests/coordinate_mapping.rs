use ffdkit_core::spatial::{Direction3, Point3};
use ffdkit_core::transform::{BSplineFreeFormTransform4D, Lattice, Transform};
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction3 {
    let cx = angle_x.cos(); let sx = angle_x.sin();
    let cy = angle_y.cos(); let sy = angle_y.sin();
    let cz = angle_z.cos(); let sz = angle_z.sin();

    // Rz
    let rz = nalgebra::SMatrix::<f64, 3, 3>::new(
        cz, -sz, 0.0,
        sz, cz, 0.0,
        0.0, 0.0, 1.0
    );

    // Ry
    let ry = nalgebra::SMatrix::<f64, 3, 3>::new(
        cy, 0.0, sy,
        0.0, 1.0, 0.0,
        -sy, 0.0, cy
    );

    // Rx
    let rx = nalgebra::SMatrix::<f64, 3, 3>::new(
        1.0, 0.0, 0.0,
        0.0, cx, -sx,
        0.0, sx, cx
    );

    rx * ry * rz
}

fn relative_error(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn test_world_lattice_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let lattice = Lattice::new(
            [6, 6, 6, 2],
            [sx, sy, sz, 1.0],
            Point3::new(ox, oy, oz),
            make_rotation(ax, ay, az),
            0.0,
        ).unwrap();
        let point = Point3::new(px, py, pz);

        let q = lattice.world_to_lattice(&point);
        let recovered = lattice.lattice_to_world(&q);

        for (axis, name) in ["X", "Y", "Z"].iter().enumerate() {
            prop_assert!(
                relative_error(point[axis], recovered[axis]) < 1e-9,
                "{} mismatch: {} vs {}",
                name,
                point[axis],
                recovered[axis]
            );
        }
    }

    #[test]
    fn test_time_roundtrip(
        t0 in -100.0f64..100.0,
        dt in 0.01f64..10.0,
        t in -1000.0f64..1000.0
    ) {
        let lattice = Lattice::new(
            [4, 4, 4, 5],
            [1.0, 1.0, 1.0, dt],
            Point3::origin(),
            Direction3::identity(),
            t0,
        )
        .unwrap();
        let recovered = lattice.lattice_to_time(lattice.time_to_lattice(t));
        prop_assert!(relative_error(t, recovered) < 1e-9, "T mismatch: {} vs {}", t, recovered);
    }

    #[test]
    fn test_support_bound(
        x in -3.0f64..10.0, y in -3.0f64..10.0, z in -3.0f64..10.0, t in -3.0f64..6.0
    ) {
        let ffd = BSplineFreeFormTransform4D::new(Lattice::with_dims([8, 8, 8, 4]).unwrap());
        let q = [x, y, z, t];
        let jacobian = ffd.evaluate_jacobian_dofs(q);
        prop_assert!(jacobian.len() <= 768);
        // Stored DOFs belong to control points whose 4-ring contains floor(q).
        for (dof, _) in jacobian.iter() {
            let index = ffd.lattice().control_point_index(dof / 3);
            for d in 0..4 {
                let offset = index[d] as f64 - q[d].floor();
                prop_assert!(
                    (-1.0..=2.0).contains(&offset),
                    "DOF {} outside support of {:?}",
                    dof,
                    q
                );
            }
        }
    }

    #[test]
    fn test_tensor_batch_consistency(
        px in 0.0f64..4.0,
        py in 0.0f64..4.0,
        pz in 0.0f64..4.0
    ) {
        let mut ffd = BSplineFreeFormTransform4D::new(Lattice::with_dims([5, 5, 5, 1]).unwrap());
        let params: Vec<f64> = (0..ffd.number_of_dofs())
            .map(|n| ((n % 7) as f64 - 3.0) * 0.1)
            .collect();
        ffd.set_parameters(&params).unwrap();

        let device = Default::default();
        let points = Tensor::<Backend, 2>::from_data(
            TensorData::new(vec![px as f32, py as f32, pz as f32], [1, 3]),
            &device,
        );
        let mapped = ffd.at_time(0.0).transform_points(points);
        let values: Vec<f32> = mapped.into_data().iter::<f32>().collect();

        let rounded = Point3::new(px as f32 as f64, py as f32 as f64, pz as f32 as f64);
        let expected = ffd.transform_point(&rounded, 0.0);
        prop_assert!((values[0] as f64 - expected[0]).abs() < 1e-4);
        prop_assert!((values[1] as f64 - expected[1]).abs() < 1e-4);
        prop_assert!((values[2] as f64 - expected[2]).abs() < 1e-4);
    }
}
