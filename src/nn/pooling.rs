//! Pooling layers for `[N, C, H, W]` inputs. None of them own parameters.

use crate::nn::module::Module;
use crate::shapes::Window;
use crate::tensor::{BuildResult, Tensor};

/// Max pooling over each window.
///
/// ```rust,ignore
/// let pool = MaxPool2d::square(2);
/// let output = pool.forward(&input)?; // halves H and W
/// ```
pub struct MaxPool2d {
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
}

impl MaxPool2d {
    pub fn new(kernel_size: (usize, usize), stride: (usize, usize)) -> Self {
        Self { kernel_size, stride, padding: (0, 0) }
    }

    /// Window and stride both `size`.
    pub fn square(size: usize) -> Self {
        Self::new((size, size), (size, size))
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }
}

impl Module for MaxPool2d {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.max_pool2d(Window::new(self.kernel_size, self.stride, self.padding))
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

/// Average pooling over each window.
pub struct AvgPool2d {
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
}

impl AvgPool2d {
    pub fn new(kernel_size: (usize, usize), stride: (usize, usize)) -> Self {
        Self { kernel_size, stride, padding: (0, 0) }
    }

    pub fn square(size: usize) -> Self {
        Self::new((size, size), (size, size))
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }
}

impl Module for AvgPool2d {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.avg_pool2d(Window::new(self.kernel_size, self.stride, self.padding))
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

/// Average pooling to a fixed spatial output size, whatever the input size.
pub struct AdaptiveAvgPool2d {
    pub output_size: (usize, usize),
}

impl AdaptiveAvgPool2d {
    pub fn new(output_size: (usize, usize)) -> Self {
        Self { output_size }
    }

    /// Global average pooling, output `[N, C, 1, 1]`.
    pub fn global() -> Self {
        Self { output_size: (1, 1) }
    }
}

impl Module for AdaptiveAvgPool2d {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        inputs.adaptive_avg_pool2d(self.output_size)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::ResultType;
    use crate::tensor::GraphContext;

    #[test]
    fn test_max_pool2d() {
        let context = GraphContext::shared("pool");
        let input = Tensor::new_input(&context, "input", vec![1, 6, 28, 28]);
        let pool = MaxPool2d::square(2);

        let output = pool.forward(&input).unwrap();
        assert_eq!(output.ty, ResultType::Tensor(vec![1, 6, 14, 14]));
        assert!(pool.parameters().is_empty());
    }

    #[test]
    fn test_avg_pool2d_padding() {
        let context = GraphContext::shared("pool");
        let input = Tensor::new_input(&context, "input", vec![1, 4, 7, 7]);
        let pool = AvgPool2d::new((3, 3), (2, 2)).with_padding((1, 1));

        let output = pool.forward(&input).unwrap();
        assert_eq!(output.ty, ResultType::Tensor(vec![1, 4, 4, 4]));
    }

    #[test]
    fn test_global_avg_pool() {
        let context = GraphContext::shared("gap");
        let input = Tensor::new_input(&context, "input", vec![2, 32, 9, 9]);
        let output = AdaptiveAvgPool2d::global().forward(&input).unwrap();
        assert_eq!(output.ty, ResultType::Tensor(vec![2, 32, 1, 1]));
    }
}
