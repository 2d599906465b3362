//! Optimizer module for fitting transformation parameters.
//!
//! Optimizers update the flat parameter vector of a free-form
//! transformation from a gradient of the same length.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ffdkit_registration::optimizer::{GradientDescent, Optimizer};
//!
//! let mut optimizer = GradientDescent::new(0.5).with_max_gradient_norm(Some(10.0));
//! let mut params = ffd.parameters();
//! optimizer.step(&mut params, &gradient);
//! ffd.set_parameters(&params)?;
//! ```

pub mod gradient_descent;
pub mod trait_;

pub use gradient_descent::GradientDescent;
pub use trait_::{LearningRateScheduler, Optimizer, StepDecay};
