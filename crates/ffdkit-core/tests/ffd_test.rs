use ffdkit_core::image::ImageAttributes;
use ffdkit_core::interpolation::Extrapolation;
use ffdkit_core::spatial::{Direction3, Point3, Vector3};
use ffdkit_core::transform::{
    BSplineFreeFormTransform4D, ChangeEvent, DisplacementSample, DofStatus, Lattice,
};
use nalgebra::Rotation3;
use std::sync::{Arc, Mutex};

fn unit_lattice() -> Lattice {
    Lattice::new([5, 5, 5, 3], [1.0; 4], Point3::origin(), Direction3::identity(), 0.0).unwrap()
}

#[test]
fn test_zero_coefficients_are_identity() {
    let ffd = BSplineFreeFormTransform4D::new(unit_lattice());
    for &(x, y, z, t) in &[(0.0, 0.0, 0.0, 0.0), (2.5, 1.25, 3.75, 1.5), (-4.0, 9.0, 2.0, 7.0)] {
        let p = Point3::new(x, y, z);
        assert_eq!(ffd.displacement(&p, t), Vector3::zeros());
        assert_eq!(ffd.transform_point(&p, t), p);
        assert_eq!(ffd.jacobian_determinant(&p, t), 1.0);
    }
}

#[test]
fn test_interpolated_unit_displacement_at_node() {
    let mut ffd = BSplineFreeFormTransform4D::new(unit_lattice());
    let node = [2, 2, 2, 1];
    let cp = ffd.lattice().control_point_offset(node);
    let mut values = vec![0.0; ffd.number_of_dofs()];
    values[3 * cp] = 1.0;
    ffd.interpolate(&values).unwrap();

    let u = ffd.displacement(&Point3::new(2.0, 2.0, 2.0), 1.0);
    assert!((u - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    // Every other node keeps its zero displacement.
    let other = ffd.displacement(&Point3::new(3.0, 2.0, 2.0), 1.0);
    assert!(other.norm() < 1e-12);
    let other = ffd.displacement(&Point3::new(2.0, 2.0, 2.0), 0.0);
    assert!(other.norm() < 1e-12);
}

#[test]
fn test_raw_coefficient_at_node() {
    let mut ffd = BSplineFreeFormTransform4D::new(unit_lattice());
    ffd.set_control_point([2, 2, 2, 1], Vector3::new(1.0, 0.0, 0.0));
    let u = ffd.displacement(&Point3::new(2.0, 2.0, 2.0), 1.0);
    assert!((u[0] - (2.0f64 / 3.0).powi(4)).abs() < 1e-12);
    assert_eq!(u[1], 0.0);
    assert_eq!(u[2], 0.0);
}

#[test]
fn test_fully_outside_returns_default() {
    let default = Vector3::new(0.0, 0.0, -2.5);
    let mut ffd =
        BSplineFreeFormTransform4D::new(unit_lattice()).with_default_displacement(default);
    let params: Vec<f64> = (0..ffd.number_of_dofs()).map(|n| (n as f64).sin()).collect();
    ffd.set_parameters(&params).unwrap();
    for p in [
        Point3::new(-3.0, 2.0, 2.0),
        Point3::new(2.0, 7.5, 2.0),
        Point3::new(2.0, 2.0, 100.0),
    ] {
        let u = ffd.displacement(&p, 1.0);
        assert_eq!(u, default);
        assert!(u.iter().all(|v| !v.is_nan()));
    }
    // Time outside the lattice as well.
    assert_eq!(ffd.displacement(&Point3::new(2.0, 2.0, 2.0), -5.0), default);

    let ffd = ffd.with_extrapolation(Extrapolation::Constant(Vector3::zeros()));
    assert_eq!(ffd.displacement(&Point3::new(-3.0, 2.0, 2.0), 1.0), Vector3::zeros());
}

#[test]
fn test_far_out_queries_return_default() {
    let default = Vector3::new(0.5, -1.0, 0.0);
    let mut ffd =
        BSplineFreeFormTransform4D::new(unit_lattice()).with_default_displacement(default);
    let params: Vec<f64> = (0..ffd.number_of_dofs()).map(|n| (n as f64).cos()).collect();
    ffd.set_parameters(&params).unwrap();

    for (p, t) in [
        (Point3::new(1e30, 2.0, 2.0), 1.0),
        (Point3::new(-1e30, 2.0, 2.0), 1.0),
        (Point3::new(2.0, 2.0, 2.0), 1e300),
        (Point3::new(2.0, 2.0, 2.0), -1e300),
        (Point3::new(f64::MAX, f64::MIN, 2.0), 1.0),
    ] {
        assert_eq!(ffd.displacement(&p, t), default);
        assert!(ffd.jacobian_dofs(&p, t).is_empty());
    }

    // Far-out samples contribute nothing to the gradient.
    let residuals = [DisplacementSample::new(Point3::new(1e30, 2.0, 2.0), 1.0, Vector3::x())];
    let mut gradient = vec![0.0; ffd.number_of_dofs()];
    ffd.approximate_dofs_gradient(&residuals, &mut gradient, 1.0);
    assert!(gradient.iter().all(|&g| g == 0.0));

    let ffd = ffd.with_extrapolation(Extrapolation::NearestEdge);
    let edge = ffd.displacement(&Point3::new(40.0, 2.0, 2.0), 1.0);
    assert_eq!(ffd.displacement(&Point3::new(1e30, 2.0, 2.0), 1.0), edge);
}

#[test]
fn test_subdivision_is_exact_on_oblique_lattice() {
    let rotation = Rotation3::from_euler_angles(0.4, -0.1, 1.2);
    let lattice = Lattice::new(
        [5, 4, 6, 3],
        [2.0, 3.0, 1.5, 0.5],
        Point3::new(10.0, -5.0, 3.0),
        *rotation.matrix(),
        2.0,
    )
    .unwrap();
    let mut coarse = BSplineFreeFormTransform4D::new(lattice);
    let params: Vec<f64> = (0..coarse.number_of_dofs())
        .map(|n| ((n as f64 * 1.618).sin() * 10.0).fract())
        .collect();
    coarse.set_parameters(&params).unwrap();

    let mut fine = coarse.clone();
    fine.subdivide([true, true, true, true]);
    fine.subdivide([true, false, true, false]);

    for step in 0..50 {
        let s = step as f64 / 49.0;
        let q = [4.0 * s, 3.0 * (1.0 - s), 5.0 * (s * 7.0).fract(), 2.0 * (s * 3.0).fract()];
        let (p, t) = coarse.lattice().from_lattice_coords(q);
        let before = coarse.displacement(&p, t);
        let after = fine.displacement(&p, t);
        assert!((before - after).norm() < 1e-6, "mismatch at {:?}", q);
    }
}

#[test]
fn test_gradient_descent_decreases_residual() {
    let mut ffd = BSplineFreeFormTransform4D::new(
        Lattice::new([6, 6, 6, 1], [2.0; 4], Point3::origin(), Direction3::identity(), 0.0)
            .unwrap(),
    );
    let samples = vec![
        DisplacementSample::new(Point3::new(4.0, 4.0, 4.0), 0.0, Vector3::new(1.0, 0.0, 0.0)),
        DisplacementSample::new(Point3::new(6.5, 5.0, 3.0), 0.0, Vector3::new(0.0, 0.5, -0.5)),
        DisplacementSample::new(Point3::new(2.2, 7.1, 5.5), 0.0, Vector3::new(-0.2, 0.1, 0.3))
            .with_weight(2.0),
    ];
    let loss = |ffd: &BSplineFreeFormTransform4D| -> f64 {
        ffd.residuals(&samples)
            .iter()
            .map(|r| 0.5 * r.weight * r.displacement.norm_squared())
            .sum()
    };

    let mut previous = loss(&ffd);
    let learning_rate = 1.0;
    for _ in 0..100 {
        let mut gradient = vec![0.0; ffd.number_of_dofs()];
        ffd.approximate_dofs_gradient(&ffd.residuals(&samples), &mut gradient, 1.0);
        let params: Vec<f64> = ffd
            .parameters()
            .iter()
            .zip(&gradient)
            .map(|(p, g)| p - learning_rate * g)
            .collect();
        ffd.set_parameters(&params).unwrap();
        let current = loss(&ffd);
        if previous < 1e-20 {
            break;
        }
        assert!(current < previous, "loss increased from {} to {}", previous, current);
        previous = current;
    }
    assert!(previous < 1e-3);
}

#[test]
fn test_passive_dofs_are_frozen_by_gradient() {
    let mut ffd = BSplineFreeFormTransform4D::new(unit_lattice());
    ffd.set_all_status(DofStatus::Passive);
    let residuals = [DisplacementSample::new(
        Point3::new(2.0, 2.0, 2.0),
        1.0,
        Vector3::new(1.0, 1.0, 1.0),
    )];
    let mut gradient = vec![0.0; ffd.number_of_dofs()];
    ffd.approximate_dofs_gradient(&residuals, &mut gradient, 1.0);
    assert!(gradient.iter().all(|&g| g == 0.0));
    assert!(ffd.jacobian_dofs(&Point3::new(2.0, 2.0, 2.0), 1.0).is_empty());
}

#[test]
fn test_lattice_from_image_and_displacement_field() {
    let attr = ImageAttributes::new(
        [9, 7, 5, 2],
        [1.0, 1.5, 2.0, 1.0],
        Point3::new(-4.0, 0.0, 1.0),
        Direction3::identity(),
        0.0,
    )
    .unwrap();
    let mut ffd = BSplineFreeFormTransform4D::from_attributes(&attr, [2.0, 3.0, 4.0, 1.0]).unwrap();
    assert_eq!(ffd.lattice().dims(), [5, 4, 3, 2]);
    let params: Vec<f64> = (0..ffd.number_of_dofs()).map(|n| (n as f64 * 0.7).cos()).collect();
    ffd.set_parameters(&params).unwrap();

    let field = ffd.displacement_field(&attr);
    assert_eq!(field.dims(), attr.size());
    for index in [[0, 0, 0, 0], [8, 6, 4, 1], [3, 2, 1, 1]] {
        let voxel = Point3::new(index[0] as f64, index[1] as f64, index[2] as f64);
        let p = attr.voxel_to_world(&voxel);
        let t = attr.voxel_to_time(index[3] as f64);
        assert_eq!(field.get(index), ffd.displacement(&p, t));
    }
}

#[test]
fn test_change_notifications() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut ffd = BSplineFreeFormTransform4D::new(unit_lattice());
    let sink = Arc::clone(&events);
    ffd.on_change(move |event| sink.lock().unwrap().push(*event));

    ffd.approximate_dofs(&[DisplacementSample::new(Point3::new(2.0, 2.0, 2.0), 1.0, Vector3::x())]);
    ffd.set_status(0, DofStatus::Passive);
    ffd.subdivide([true, false, false, false]);
    ffd.approximate_dofs(&[]);

    assert_eq!(
        *events.lock().unwrap(),
        vec![ChangeEvent::Parameters, ChangeEvent::Status, ChangeEvent::Geometry]
    );
    // Copies do not inherit observers.
    let mut copy = ffd.clone();
    copy.put(0, 1.0);
    assert_eq!(events.lock().unwrap().len(), 3);
}
