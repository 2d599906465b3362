//! Fitting a free-form transformation to scattered displacement samples.
//!
//! The fitter seeds the coefficients with a scattered-data approximation and
//! then minimizes
//!
//! ```text
//! E = 1/2 sum(w |u(p) - d|^2) / sum(w) + R(u)
//! ```
//!
//! by first-order descent on the active parameters, where `R` is a
//! [`Regularizer`].

use burn::config::Config;
use ffdkit_core::{BSplineFreeFormTransform4D, DisplacementSample};

use crate::error::RegistrationError;
use crate::optimizer::{GradientDescent, LearningRateScheduler, Optimizer, StepDecay};
use crate::regularization::{BendingEnergyRegularizer, Regularizer};
use crate::validation::{
    validate_iterations, validate_learning_rate, validate_weight, ConvergenceChecker,
};

/// Configuration of [`DisplacementFitter`].
#[derive(Config, Debug)]
pub struct FittingConfig {
    /// Step size of the descent.
    #[config(default = "1.0")]
    pub learning_rate: f64,
    /// Maximum number of descent iterations.
    #[config(default = "200")]
    pub max_iterations: usize,
    /// Weight of the bending energy penalty.
    #[config(default = "0.01")]
    pub regularization_weight: f64,
    /// Gradients are clipped to this Euclidean norm.
    #[config(default = "None")]
    pub max_gradient_norm: Option<f64>,
    /// Minimum relative loss improvement over `patience` iterations.
    #[config(default = "1e-6")]
    pub min_improvement: f64,
    #[config(default = "10")]
    pub patience: usize,
    /// Stop once the loss falls below this value.
    #[config(default = "None")]
    pub min_loss: Option<f64>,
    /// Seed the coefficients with `approximate_dofs` before descending.
    #[config(default = "true")]
    pub initial_approximation: bool,
    /// Iterations between learning rate reductions, 0 to disable.
    #[config(default = "0")]
    pub lr_decay_step: usize,
    #[config(default = "0.5")]
    pub lr_decay_gamma: f64,
    /// Iterations between progress log lines.
    #[config(default = "50")]
    pub log_interval: usize,
}

impl FittingConfig {
    /// Check every setting.
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_learning_rate(self.learning_rate)?;
        validate_iterations(self.max_iterations)?;
        validate_weight(self.regularization_weight)?;
        if let Some(norm) = self.max_gradient_norm {
            if !(norm > 0.0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "Maximum gradient norm must be positive, got {}",
                    norm
                )));
            }
        }
        if self.lr_decay_step > 0 && !(self.lr_decay_gamma > 0.0 && self.lr_decay_gamma <= 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "Learning rate decay must be in (0, 1], got {}",
                self.lr_decay_gamma
            )));
        }
        Ok(())
    }
}

/// Outcome of [`DisplacementFitter::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittingReport {
    /// Descent iterations performed.
    pub iterations: usize,
    /// Total loss before each iteration, followed by the final loss.
    pub loss_history: Vec<f64>,
    /// Weighted RMS residual after fitting.
    pub final_rms: f64,
    /// Whether the convergence criterion stopped the descent.
    pub converged: bool,
}

/// Fits a free-form transformation to displacement samples.
pub struct DisplacementFitter<O: Optimizer, R: Regularizer> {
    optimizer: O,
    regularizer: R,
    config: FittingConfig,
}

impl DisplacementFitter<GradientDescent, BendingEnergyRegularizer> {
    /// Gradient descent with a bending energy penalty, both set up from
    /// `config`.
    pub fn from_config(config: FittingConfig) -> crate::error::Result<Self> {
        let optimizer = GradientDescent::new(config.learning_rate)
            .with_max_gradient_norm(config.max_gradient_norm);
        let regularizer = BendingEnergyRegularizer::new(config.regularization_weight);
        Self::new(optimizer, regularizer, config)
    }
}

impl<O: Optimizer, R: Regularizer> DisplacementFitter<O, R> {
    pub fn new(optimizer: O, regularizer: R, config: FittingConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self {
            optimizer,
            regularizer,
            config,
        })
    }

    pub fn config(&self) -> &FittingConfig {
        &self.config
    }

    pub fn regularizer(&self) -> &R {
        &self.regularizer
    }

    /// Data term `1/2 sum(w |e|^2) / sum(w)` of the residuals.
    fn data_loss(residuals: &[DisplacementSample], total_weight: f64) -> f64 {
        0.5 * residuals
            .iter()
            .map(|r| r.weight * r.displacement.norm_squared())
            .sum::<f64>()
            / total_weight
    }

    /// Fit `ffd` to `samples`, updating its coefficients in place.
    ///
    /// # Errors
    /// If there are no samples, the sample weights do not sum to a positive
    /// value, or the loss becomes non-finite.
    pub fn fit(
        &mut self,
        ffd: &mut BSplineFreeFormTransform4D,
        samples: &[DisplacementSample],
    ) -> crate::error::Result<FittingReport> {
        if samples.is_empty() {
            return Err(RegistrationError::invalid_configuration("No displacement samples given"));
        }
        let total_weight: f64 = samples.iter().map(|s| s.weight).sum();
        if !(total_weight > 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "Sample weights must sum to a positive value, got {}",
                total_weight
            )));
        }

        if self.config.initial_approximation {
            ffd.approximate_dofs(samples);
        }

        let mut checker =
            ConvergenceChecker::new(self.config.min_improvement, self.config.patience);
        if let Some(min_loss) = self.config.min_loss {
            checker = checker.with_min_loss(min_loss);
        }
        let schedule = (self.config.lr_decay_step > 0)
            .then(|| StepDecay::new(self.config.lr_decay_step, self.config.lr_decay_gamma));

        tracing::info!(
            samples = samples.len(),
            dofs = ffd.number_of_dofs(),
            "Fitting free-form transformation"
        );

        let n = ffd.number_of_dofs();
        let mut loss_history = Vec::with_capacity(self.config.max_iterations + 1);
        let mut gradient = vec![0.0; n];
        let mut params = ffd.parameters();
        let mut converged = false;
        let mut iterations = 0;

        loop {
            let residuals = ffd.residuals(samples);
            let loss = Self::data_loss(&residuals, total_weight) + self.regularizer.penalty(ffd);
            if !loss.is_finite() {
                return Err(RegistrationError::numerical_instability(format!(
                    "Loss became {} at iteration {}",
                    loss, iterations
                )));
            }
            loss_history.push(loss);

            if self.config.log_interval > 0 && iterations % self.config.log_interval == 0 {
                tracing::info!("Iteration {}: Loss {:.6}", iterations, loss);
            }
            if checker.check_convergence(&loss_history) {
                converged = true;
                break;
            }
            if iterations == self.config.max_iterations {
                break;
            }

            if let Some(schedule) = &schedule {
                self.optimizer
                    .set_learning_rate(schedule.get_lr(iterations, self.config.learning_rate));
            }
            gradient.iter_mut().for_each(|g| *g = 0.0);
            ffd.approximate_dofs_gradient(&residuals, &mut gradient, 1.0 / total_weight);
            self.regularizer.accumulate_gradient(ffd, &mut gradient, 1.0);
            self.optimizer.step(&mut params, &gradient);
            ffd.set_parameters(&params)?;
            iterations += 1;
        }

        let final_rms = ffd.rms_error(samples);
        tracing::info!(
            iterations,
            converged,
            rms = final_rms,
            "Fitting finished"
        );
        Ok(FittingReport {
            iterations,
            loss_history,
            final_rms,
            converged,
        })
    }
}
