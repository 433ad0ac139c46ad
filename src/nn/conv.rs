//! Convolutional layers.

use crate::nn::module::Module;
use crate::shapes::Window;
use crate::tensor::{BuildResult, GraphContext, Tensor};
use std::cell::RefCell;
use std::rc::Rc;

/// Configuration for a `Conv2d` layer.
#[derive(Debug, Clone)]
pub struct Conv2dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    /// Number of groups for grouped/depthwise convolution.
    pub groups: usize,
    pub bias: bool,
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            out_channels: 1,
            kernel_size: (3, 3),
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            bias: true,
        }
    }
}

impl Conv2dConfig {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            ..Default::default()
        }
    }

    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: (usize, usize)) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    fn window(&self) -> Window {
        Window {
            kernel: self.kernel_size,
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
        }
    }
}

/// 2D convolution over `[N, C_in, H, W]` inputs.
///
/// Emits `nn.conv2d` and, when the layer has a bias, `nn.bias_add` on the
/// channel axis.
pub struct Conv2d {
    /// `[C_out, C_in / groups, kH, kW]`.
    pub weight: Tensor,
    /// `[C_out]`.
    pub bias: Option<Tensor>,
    pub config: Conv2dConfig,
}

impl Conv2d {
    pub fn new(
        context: &Rc<RefCell<GraphContext>>,
        name: &str,
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
    ) -> Self {
        Self::from_config(context, name, Conv2dConfig::new(in_channels, out_channels, kernel_size))
    }

    pub fn from_config(context: &Rc<RefCell<GraphContext>>, name: &str, config: Conv2dConfig) -> Self {
        let per_group = config.in_channels / config.groups.max(1);
        let weight = Tensor::new_parameter(
            context,
            &format!("{}.weight", name),
            vec![config.out_channels, per_group, config.kernel_size.0, config.kernel_size.1],
        );
        let bias = config
            .bias
            .then(|| Tensor::new_parameter(context, &format!("{}.bias", name), vec![config.out_channels]));
        Self { weight, bias, config }
    }
}

impl Module for Conv2d {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        let out = inputs.conv2d(&self.weight, self.config.window(), self.config.groups)?;
        match &self.bias {
            Some(bias) => out.bias_add(bias, 1),
            None => Ok(out),
        }
    }

    fn parameters(&self) -> Vec<Tensor> {
        std::iter::once(self.weight.clone()).chain(self.bias.clone()).collect()
    }
}

/// Transposed 2D convolution, used for upsampling in decoders and generators.
pub struct ConvTranspose2d {
    /// `[C_in, C_out, kH, kW]`.
    pub weight: Tensor,
    pub bias: Option<Tensor>,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub output_padding: (usize, usize),
}

impl ConvTranspose2d {
    pub fn new(
        context: &Rc<RefCell<GraphContext>>,
        name: &str,
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
    ) -> Self {
        let weight = Tensor::new_parameter(
            context,
            &format!("{}.weight", name),
            vec![in_channels, out_channels, kernel_size.0, kernel_size.1],
        );
        let bias = Some(Tensor::new_parameter(context, &format!("{}.bias", name), vec![out_channels]));
        Self {
            weight,
            bias,
            kernel_size,
            stride: (1, 1),
            padding: (0, 0),
            output_padding: (0, 0),
        }
    }

    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_output_padding(mut self, output_padding: (usize, usize)) -> Self {
        self.output_padding = output_padding;
        self
    }
}

impl Module for ConvTranspose2d {
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor> {
        let window = Window::new(self.kernel_size, self.stride, self.padding);
        let out = inputs.conv2d_transpose(&self.weight, window, self.output_padding)?;
        match &self.bias {
            Some(bias) => out.bias_add(bias, 1),
            None => Ok(out),
        }
    }

    fn parameters(&self) -> Vec<Tensor> {
        std::iter::once(self.weight.clone()).chain(self.bias.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::{Attr, ResultType};

    #[test]
    fn test_conv2d_creation() {
        let context = GraphContext::shared("conv");
        let config = Conv2dConfig::new(3, 64, (3, 3)).with_padding((1, 1));
        let conv = Conv2d::from_config(&context, "conv1", config);

        assert_eq!(conv.weight.ty, ResultType::Tensor(vec![64, 3, 3, 3]));
        assert!(conv.bias.is_some());
        assert_eq!(conv.parameters().len(), 2);
    }

    #[test]
    fn test_conv2d_forward_records_attrs() {
        let context = GraphContext::shared("conv");
        let input = Tensor::new_input(&context, "input", vec![1, 3, 32, 32]);
        let config = Conv2dConfig::new(3, 16, (3, 3)).with_stride((2, 2)).with_padding((1, 1)).with_bias(false);
        let conv = Conv2d::from_config(&context, "conv1", config);

        let output = conv.forward(&input).unwrap();
        assert_eq!(output.ty, ResultType::Tensor(vec![1, 16, 16, 16]));

        let graph = context.borrow().graph().clone();
        let call = graph.get_node(output.node_id).unwrap().as_call().unwrap();
        assert_eq!(call.op, "nn.conv2d");
        assert_eq!(call.attrs.get("padding"), Some(&Attr::Ints(vec![1, 1])));
    }

    #[test]
    fn test_grouped_conv_weight_shape() {
        let context = GraphContext::shared("depthwise");
        let config = Conv2dConfig::new(8, 8, (3, 3)).with_groups(8);
        let conv = Conv2d::from_config(&context, "dw", config);
        assert_eq!(conv.weight.ty, ResultType::Tensor(vec![8, 1, 3, 3]));
    }

    #[test]
    fn test_conv_transpose2d_upsamples() {
        let context = GraphContext::shared("deconv");
        let input = Tensor::new_input(&context, "input", vec![1, 64, 8, 8]);
        let deconv = ConvTranspose2d::new(&context, "deconv1", 64, 3, (4, 4))
            .with_stride((2, 2))
            .with_padding((1, 1));

        let output = deconv.forward(&input).unwrap();
        assert_eq!(output.ty, ResultType::Tensor(vec![1, 3, 16, 16]));
        assert_eq!(deconv.parameters().len(), 2);
    }
}
