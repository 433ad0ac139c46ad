//! Activation layers. None of them own parameters.

use crate::nn::module::Module;
use crate::tensor::{BuildResult, Tensor};

/// `max(0, x)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReLU;

impl Module for ReLU {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.relu()
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

/// `max(alpha * x, x)`.
#[derive(Debug, Clone, Copy)]
pub struct LeakyReLU {
    pub alpha: f64,
}

impl LeakyReLU {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Module for LeakyReLU {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.leaky_relu(self.alpha)
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sigmoid;

impl Module for Sigmoid {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.sigmoid()
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Tanh;

impl Module for Tanh {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.tanh()
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

/// Softmax along `axis`; negative values count from the last axis.
#[derive(Debug, Clone, Copy)]
pub struct Softmax {
    pub axis: i64,
}

impl Softmax {
    pub fn new(axis: i64) -> Self {
        Self { axis }
    }
}

impl Default for Softmax {
    fn default() -> Self {
        Self::new(-1)
    }
}

impl Module for Softmax {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.softmax(self.axis)
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}
