//! Batch normalization.

use crate::nn::Module;
use crate::tensor::{BuildResult, GraphContext, Tensor};
use std::cell::RefCell;
use std::rc::Rc;

const EPS: f64 = 1e-5;

/// Batch normalization over the channel axis of `[N, C, ...]` inputs:
/// `y = gamma * (x - mean) / sqrt(var + eps) + beta`.
///
/// `nn.batch_norm` yields a `(output, mean, var)` tuple; the layer projects
/// the normalized output out of it with `TupleGetItem`.
pub struct BatchNorm {
    pub gamma: Tensor,
    pub beta: Tensor,
    pub moving_mean: Tensor,
    pub moving_var: Tensor,
    pub eps: f64,
    pub name: String,
}

impl BatchNorm {
    pub fn new(ctx: &Rc<RefCell<GraphContext>>, name: &str, channels: usize) -> Self {
        let param = |suffix: &str| Tensor::new_parameter(ctx, &format!("{}.{}", name, suffix), vec![channels]);
        Self {
            gamma: param("gamma"),
            beta: param("beta"),
            moving_mean: param("moving_mean"),
            moving_var: param("moving_var"),
            eps: EPS,
            name: name.to_string(),
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }
}

impl Module for BatchNorm {
    fn forward(&self, x: &Tensor) -> BuildResult<Tensor> {
        x.batch_norm(&self.gamma, &self.beta, &self.moving_mean, &self.moving_var, self.eps)?
            .tuple_get_item(0)
    }

    /// Running statistics are not trained.
    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }
}
