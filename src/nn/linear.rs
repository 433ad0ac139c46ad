//! Fully connected layer.

use crate::nn::module::Module;
use crate::tensor::{BuildResult, GraphContext, Tensor};
use std::cell::RefCell;
use std::rc::Rc;

/// Fully connected layer: `y = dense(x, W) + b`.
///
/// The layer holds no data. Its weights and bias are `Parameter` variables of
/// the graph, `[out_features, in_features]` and `[out_features]`.
pub struct Linear {
    pub weights: Tensor,
    pub bias: Tensor,
}

impl Linear {
    /// Registers `{name}.weights` and `{name}.bias` in the graph.
    pub fn new(
        context: &Rc<RefCell<GraphContext>>,
        in_features: usize,
        out_features: usize,
        name: &str,
    ) -> Self {
        let weights = Tensor::new_parameter(context, &format!("{}.weights", name), vec![out_features, in_features]);
        let bias = Tensor::new_parameter(context, &format!("{}.bias", name), vec![out_features]);
        Self { weights, bias }
    }
}

impl Module for Linear {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        let rank = inputs.shape("nn.dense")?.len();
        inputs.dense(&self.weights)?.bias_add(&self.bias, rank.saturating_sub(1))
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.weights.clone(), self.bias.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::ResultType;

    #[test]
    fn test_linear_forward() {
        let context = GraphContext::shared("linear");
        let x = Tensor::new_input(&context, "x", vec![4, 784]);
        let fc = Linear::new(&context, 784, 128, "fc1");

        let y = fc.forward(&x).unwrap();
        assert_eq!(y.ty, ResultType::Tensor(vec![4, 128]));
        assert_eq!(fc.parameters().len(), 2);
        // input, weights, bias, dense, bias_add
        assert_eq!(context.borrow().graph().nodes.len(), 5);
    }

    #[test]
    fn test_linear_rejects_wrong_width() {
        let context = GraphContext::shared("linear");
        let x = Tensor::new_input(&context, "x", vec![4, 10]);
        let fc = Linear::new(&context, 784, 128, "fc1");
        assert!(fc.forward(&x).is_err());
    }
}
