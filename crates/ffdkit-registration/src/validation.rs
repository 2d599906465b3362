//! Validation utilities for fitting.
//!
//! This module provides parameter validation, gradient clipping and
//! convergence checks for iterative fitting loops.

use crate::error::{RegistrationError, Result};

/// Scale `gradient` in place so its Euclidean norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_gradient(gradient: &mut [f64], max_norm: f64) -> f64 {
    let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        gradient.iter_mut().for_each(|g| *g *= scale);
    }
    norm
}

/// Validate learning rate.
pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if !(lr > 0.0) || !lr.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate must be positive and finite, got {}",
            lr
        )));
    }

    if lr > 100.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate too large: {}",
            lr
        )));
    }

    if lr < 1e-10 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate too small: {}",
            lr
        )));
    }

    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

/// Validate a regularization weight.
pub fn validate_weight(weight: f64) -> Result<()> {
    if weight < 0.0 || !weight.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "Regularization weight must be non-negative and finite, got {}",
            weight
        )));
    }
    Ok(())
}

/// Check for convergence based on loss history.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    /// Minimum relative improvement over the patience window.
    pub min_improvement: f64,
    /// Number of iterations to check for improvement.
    pub patience: usize,
    /// Minimum absolute loss to consider converged.
    pub min_loss: Option<f64>,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self {
            min_improvement: 1e-6,
            patience: 50,
            min_loss: None,
        }
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(min_improvement: f64, patience: usize) -> Self {
        Self {
            min_improvement,
            patience,
            min_loss: None,
        }
    }

    /// Set minimum loss threshold.
    pub fn with_min_loss(mut self, min_loss: f64) -> Self {
        self.min_loss = Some(min_loss);
        self
    }

    /// Check if converged based on loss history.
    ///
    /// Converged when the last loss is below the minimum loss, or when the
    /// loss improved by less than `min_improvement` (relative) over the
    /// last `patience` iterations.
    pub fn check_convergence(&self, loss_history: &[f64]) -> bool {
        let Some(&current) = loss_history.last() else {
            return false;
        };

        if let Some(min_loss) = self.min_loss {
            if current < min_loss {
                return true;
            }
        }

        // Need at least patience + 1 samples
        if self.patience == 0 || loss_history.len() < self.patience + 1 {
            return false;
        }

        let reference = loss_history[loss_history.len() - self.patience - 1];
        let relative_improvement = (reference - current) / (reference.abs() + 1e-10);

        relative_improvement < self.min_improvement
    }
}
