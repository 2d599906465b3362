//! Optimizer trait for parameter optimization.
//!
//! Optimizers act on the flat parameter vector of a transformation, laid
//! out like `BSplineFreeFormTransform4D::parameters`.

/// Optimizer over a flat parameter vector.
///
/// # Examples
///
/// ```rust,ignore
/// use ffdkit_registration::optimizer::{GradientDescent, Optimizer};
///
/// let mut optimizer = GradientDescent::new(0.5);
/// optimizer.step(&mut params, &gradient);
/// ```
pub trait Optimizer {
    /// Perform a single optimization step, updating `params` in place.
    ///
    /// # Panics
    /// If `params` and `gradient` differ in length.
    fn step(&mut self, params: &mut [f64], gradient: &[f64]);

    /// Get the current learning rate.
    fn learning_rate(&self) -> f64;

    /// Set the learning rate.
    fn set_learning_rate(&mut self, lr: f64);
}

/// Learning rate scheduler trait.
///
/// Schedulers adjust the learning rate during fitting to improve convergence.
pub trait LearningRateScheduler: Send + Sync {
    /// Get the learning rate for the current step.
    fn get_lr(&self, step: usize, initial_lr: f64) -> f64;
}

/// Step decay learning rate scheduler.
///
/// Reduces the learning rate by a factor every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepDecay {
    step_size: usize,
    gamma: f64,
}

impl StepDecay {
    /// Create a new step decay scheduler.
    ///
    /// # Arguments
    /// * `step_size` - Number of steps between LR reductions
    /// * `gamma` - Multiplicative factor (typically 0.1 to 0.5)
    pub fn new(step_size: usize, gamma: f64) -> Self {
        assert!(gamma > 0.0 && gamma <= 1.0, "Gamma must be in (0, 1]");
        assert!(step_size > 0, "Step size must be positive");
        Self { step_size, gamma }
    }
}

impl LearningRateScheduler for StepDecay {
    fn get_lr(&self, step: usize, initial_lr: f64) -> f64 {
        let exponent = step / self.step_size;
        initial_lr * self.gamma.powi(exponent as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_decay() {
        let schedule = StepDecay::new(10, 0.5);
        assert_eq!(schedule.get_lr(0, 1.0), 1.0);
        assert_eq!(schedule.get_lr(9, 1.0), 1.0);
        assert_eq!(schedule.get_lr(10, 1.0), 0.5);
        assert_eq!(schedule.get_lr(25, 2.0), 0.5);
    }

    #[test]
    #[should_panic(expected = "Gamma")]
    fn test_step_decay_rejects_gamma() {
        StepDecay::new(10, 1.5);
    }
}
