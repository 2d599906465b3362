use burn_ndarray::NdArray;
use ffdkit_core::image::ImageAttributes;
use ffdkit_core::{
    BSplineFreeFormTransform4D, BendingEnergyMode, DisplacementSample, Point3, Vector3,
};
use ffdkit_registration::optimizer::GradientDescent;
use ffdkit_registration::regularization::BendingEnergyRegularizer;
use ffdkit_registration::{DisplacementFitter, FittingConfig};

type B = NdArray<f32>;

fn target(p: &Point3) -> Vector3 {
    Vector3::new(
        0.5 * (p.x / 2.0).sin(),
        0.3 * (p.y / 3.0).cos(),
        0.2 * (p.z / 2.0).sin(),
    )
}

/// Samples of a smooth field at every voxel of a 9x9x9 grid.
fn setup() -> (ImageAttributes, BSplineFreeFormTransform4D, Vec<DisplacementSample>) {
    let attr = ImageAttributes::from_size([9, 9, 9, 1]).unwrap();
    let ffd = BSplineFreeFormTransform4D::from_attributes(&attr, [2.0, 2.0, 2.0, 0.0]).unwrap();
    let samples = attr
        .voxel_indices()
        .map(|[i, j, k, _]| {
            let p = attr.voxel_to_world(&Point3::new(i as f64, j as f64, k as f64));
            DisplacementSample::new(p, 0.0, target(&p))
        })
        .collect();
    (attr, ffd, samples)
}

fn assert_non_increasing(history: &[f64]) {
    for (n, pair) in history.windows(2).enumerate() {
        assert!(
            pair[1] <= pair[0] + 1e-14,
            "loss increased at iteration {}: {} -> {}",
            n,
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_unregularized_fit_reduces_residual() {
    let (_, mut ffd, samples) = setup();
    assert_eq!(ffd.lattice().dims(), [5, 5, 5, 1]);

    let mut seeded = ffd.clone();
    seeded.approximate_dofs(&samples);
    let seed_rms = seeded.rms_error(&samples);

    let config = FittingConfig::new()
        .with_regularization_weight(0.0)
        .with_patience(0);
    let mut fitter = DisplacementFitter::from_config(config).unwrap();
    let report = fitter.fit(&mut ffd, &samples).unwrap();

    assert_eq!(report.iterations, 200);
    assert_eq!(report.loss_history.len(), 201);
    assert_non_increasing(&report.loss_history);
    assert!(report.final_rms < seed_rms, "{} vs {}", report.final_rms, seed_rms);
    assert!(report.final_rms < 0.07, "final rms {}", report.final_rms);
}

#[test]
fn test_bending_penalty_smooths_the_fit() {
    let (_, plain, samples) = setup();
    let config = FittingConfig::new().with_patience(0);

    let mut unregularized = plain.clone();
    DisplacementFitter::new(
        GradientDescent::new(1.0),
        BendingEnergyRegularizer::new(0.0),
        config.clone(),
    )
    .unwrap()
    .fit(&mut unregularized, &samples)
    .unwrap();

    let mut regularized = plain;
    let report = DisplacementFitter::new(
        GradientDescent::new(1.0),
        BendingEnergyRegularizer::new(2.0).with_world_derivatives(false),
        config,
    )
    .unwrap()
    .fit(&mut regularized, &samples)
    .unwrap();
    assert_non_increasing(&report.loss_history);

    let energy = |ffd: &BSplineFreeFormTransform4D| {
        ffd.bending_energy(BendingEnergyMode::ControlPoints, false, false)
    };
    assert!(
        energy(&regularized) < 0.1 * energy(&unregularized),
        "{} vs {}",
        energy(&regularized),
        energy(&unregularized)
    );
}

#[test]
fn test_fitted_field_exports_to_tensor() {
    let (attr, mut ffd, samples) = setup();
    let mut fitter = DisplacementFitter::from_config(
        FittingConfig::new()
            .with_regularization_weight(0.0)
            .with_max_gradient_norm(Some(1.0)),
    )
    .unwrap();
    fitter.fit(&mut ffd, &samples).unwrap();

    let device = Default::default();
    let field = ffd.displacement_field_tensor::<B>(&attr, 0, &device);
    assert_eq!(field.dims(), [3, 9, 9, 9]);
    let values: Vec<f32> = field.into_data().iter::<f32>().collect();
    let plane = 9 * 9 * 9;
    let center = 4 + 9 * (4 + 9 * 4);
    let expected = target(&Point3::new(4.0, 4.0, 4.0));
    for c in 0..3 {
        assert!(
            (values[c * plane + center] as f64 - expected[c]).abs() < 0.1,
            "component {}: {} vs {}",
            c,
            values[c * plane + center],
            expected[c]
        );
    }
}
