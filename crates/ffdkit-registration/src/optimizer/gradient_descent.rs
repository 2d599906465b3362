use crate::optimizer::Optimizer;
use crate::validation::clip_gradient;

/// Plain gradient descent with optional gradient norm clipping.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f64,
    max_gradient_norm: Option<f64>,
    scratch: Vec<f64>,
}

impl GradientDescent {
    /// Create a new gradient descent optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The learning rate
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            max_gradient_norm: None,
            scratch: Vec::new(),
        }
    }

    /// Clip each gradient to at most this Euclidean norm before stepping.
    pub fn with_max_gradient_norm(mut self, max_norm: Option<f64>) -> Self {
        self.max_gradient_norm = max_norm;
        self
    }

    pub fn max_gradient_norm(&self) -> Option<f64> {
        self.max_gradient_norm
    }
}

impl Optimizer for GradientDescent {
    fn step(&mut self, params: &mut [f64], gradient: &[f64]) {
        assert_eq!(
            params.len(),
            gradient.len(),
            "Parameter and gradient lengths differ"
        );
        let gradient = match self.max_gradient_norm {
            Some(max_norm) => {
                self.scratch.clear();
                self.scratch.extend_from_slice(gradient);
                clip_gradient(&mut self.scratch, max_norm);
                &self.scratch[..]
            }
            None => gradient,
        };
        for (p, g) in params.iter_mut().zip(gradient) {
            *p -= self.learning_rate * g;
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}
