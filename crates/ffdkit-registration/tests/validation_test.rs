use ffdkit_registration::optimizer::{LearningRateScheduler, StepDecay};
use ffdkit_registration::validation::clip_gradient;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_clip_gradient_bounds_norm(
        gradient in prop::collection::vec(-1e3f64..1e3, 1..64),
        max_norm in 1e-3f64..1e2
    ) {
        let mut clipped = gradient.clone();
        let norm = clip_gradient(&mut clipped, max_norm);
        let clipped_norm = clipped.iter().map(|g| g * g).sum::<f64>().sqrt();
        prop_assert!(clipped_norm <= max_norm * (1.0 + 1e-12) || clipped_norm == norm);
        prop_assert!(clipped_norm <= norm * (1.0 + 1e-12));

        // Direction is preserved
        if norm > 0.0 && clipped_norm > 0.0 {
            for (a, b) in gradient.iter().zip(&clipped) {
                prop_assert!((a / norm - b / clipped_norm).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_step_decay_is_non_increasing(
        step_size in 1usize..50,
        gamma in 0.1f64..1.0,
        step in 0usize..100
    ) {
        let schedule = StepDecay::new(step_size, gamma);
        let now = schedule.get_lr(step, 1.0);
        let next = schedule.get_lr(step + 1, 1.0);
        prop_assert!(next <= now);
        prop_assert!(now > 0.0 && now <= 1.0);
    }
}
