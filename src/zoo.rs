//! Ready-made model graphs, built through the layers in [`crate::nn`].
//!
//! Every builder returns a finished [`Asg`] with a single output, so the
//! graphs can go straight into a `Pipeline`.

use crate::asg::Asg;
use crate::nn::{
    AdaptiveAvgPool2d, BatchNorm, Conv2d, Conv2dConfig, ConvTranspose2d, LeakyReLU, Linear, MaxPool2d, Module,
    ReLU, Sigmoid, Softmax, Tanh,
};
use crate::tensor::{BuildError, BuildResult, GraphContext, Tensor};
use std::cell::RefCell;
use std::rc::Rc;

/// A named model builder.
#[derive(Clone, Copy)]
pub struct ModelEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub build: fn() -> BuildResult<Asg>,
}

const CATALOG: &[ModelEntry] = &[
    ModelEntry { name: "mlp", description: "two-layer perceptron on flat 784 inputs", build: mlp },
    ModelEntry { name: "lenet", description: "LeNet-5 style classifier on 1x28x28 images", build: lenet },
    ModelEntry {
        name: "resnet_tiny",
        description: "two residual blocks with a strided projection shortcut",
        build: resnet_tiny,
    },
    ModelEntry {
        name: "dcgan_generator",
        description: "transposed-conv generator from a 100-d latent to 3x32x32",
        build: dcgan_generator,
    },
    ModelEntry {
        name: "dcgan_discriminator",
        description: "strided-conv discriminator on 3x32x32 images",
        build: dcgan_discriminator,
    },
];

/// All models in a fixed order.
pub fn catalog() -> &'static [ModelEntry] {
    CATALOG
}

/// Builds the model registered under `name`.
pub fn build(name: &str) -> BuildResult<Asg> {
    let entry = CATALOG
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| BuildError::UnknownModel(name.to_string()))?;
    tracing::debug!(model = name, "building graph");
    (entry.build)()
}

fn sequential(x: Tensor, layers: &[&dyn Module]) -> BuildResult<Tensor> {
    layers.iter().try_fold(x, |h, layer| layer.forward(&h))
}

pub fn mlp() -> BuildResult<Asg> {
    let ctx = GraphContext::shared("mlp");
    let x = Tensor::new_input(&ctx, "x", vec![1, 784]);
    let fc1 = Linear::new(&ctx, 784, 256, "fc1");
    let fc2 = Linear::new(&ctx, 256, 10, "fc2");
    let y = sequential(x, &[&fc1, &ReLU, &fc2, &Softmax::default()])?;
    Ok(GraphContext::finish(&ctx, &y))
}

pub fn lenet() -> BuildResult<Asg> {
    let ctx = GraphContext::shared("lenet");
    let x = Tensor::new_input(&ctx, "image", vec![1, 1, 28, 28]);

    let conv1 = Conv2d::from_config(&ctx, "conv1", Conv2dConfig::new(1, 6, (5, 5)).with_padding((2, 2)));
    let conv2 = Conv2d::new(&ctx, "conv2", 6, 16, (5, 5));
    let pool = MaxPool2d::square(2);
    let features = sequential(x, &[&conv1, &ReLU, &pool, &conv2, &ReLU, &pool])?;

    let fc1 = Linear::new(&ctx, 16 * 5 * 5, 120, "fc1");
    let fc2 = Linear::new(&ctx, 120, 84, "fc2");
    let fc3 = Linear::new(&ctx, 84, 10, "fc3");
    let y = sequential(features.batch_flatten()?, &[&fc1, &ReLU, &fc2, &ReLU, &fc3])?;
    Ok(GraphContext::finish(&ctx, &y))
}

/// conv-bn-relu-conv-bn plus a shortcut, then relu. The block input is
/// consumed by both branches, so it is a shared node of the graph.
fn residual_block(
    ctx: &Rc<RefCell<GraphContext>>,
    name: &str,
    x: &Tensor,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
) -> BuildResult<Tensor> {
    let conv = |suffix: &str, cin: usize, stride: usize| {
        let config = Conv2dConfig::new(cin, out_channels, (3, 3))
            .with_stride((stride, stride))
            .with_padding((1, 1))
            .with_bias(false);
        Conv2d::from_config(ctx, &format!("{}.{}", name, suffix), config)
    };
    let conv1 = conv("conv1", in_channels, stride);
    let bn1 = BatchNorm::new(ctx, &format!("{}.bn1", name), out_channels);
    let conv2 = conv("conv2", out_channels, 1);
    let bn2 = BatchNorm::new(ctx, &format!("{}.bn2", name), out_channels);
    let branch = sequential(x.clone(), &[&conv1, &bn1, &ReLU, &conv2, &bn2])?;

    let shortcut = if stride != 1 || in_channels != out_channels {
        let config = Conv2dConfig::new(in_channels, out_channels, (1, 1))
            .with_stride((stride, stride))
            .with_bias(false);
        let proj = Conv2d::from_config(ctx, &format!("{}.downsample", name), config);
        let bn = BatchNorm::new(ctx, &format!("{}.downsample_bn", name), out_channels);
        sequential(x.clone(), &[&proj, &bn])?
    } else {
        x.clone()
    };
    branch.add(&shortcut)?.relu()
}

pub fn resnet_tiny() -> BuildResult<Asg> {
    let ctx = GraphContext::shared("resnet_tiny");
    let x = Tensor::new_input(&ctx, "image", vec![1, 3, 32, 32]);

    let stem = Conv2d::from_config(
        &ctx,
        "stem",
        Conv2dConfig::new(3, 16, (3, 3)).with_padding((1, 1)).with_bias(false),
    );
    let stem_bn = BatchNorm::new(&ctx, "stem_bn", 16);
    let h = sequential(x, &[&stem, &stem_bn, &ReLU])?;

    let h = residual_block(&ctx, "layer1", &h, 16, 16, 1)?;
    let h = residual_block(&ctx, "layer2", &h, 16, 32, 2)?;

    let pooled = AdaptiveAvgPool2d::global().forward(&h)?.batch_flatten()?;
    let fc = Linear::new(&ctx, 32, 10, "fc");
    let y = fc.forward(&pooled)?;
    Ok(GraphContext::finish(&ctx, &y))
}

pub fn dcgan_generator() -> BuildResult<Asg> {
    let ctx = GraphContext::shared("dcgan_generator");
    let z = Tensor::new_input(&ctx, "z", vec![1, 100, 1, 1]);

    // 1x1 -> 4x4 -> 8x8 -> 16x16 -> 32x32
    let project = ConvTranspose2d::new(&ctx, "project", 100, 128, (4, 4));
    let mut h = sequential(z, &[&project, &BatchNorm::new(&ctx, "project_bn", 128), &ReLU])?;
    for (i, (cin, cout)) in [(128, 64), (64, 32)].into_iter().enumerate() {
        let up = ConvTranspose2d::new(&ctx, &format!("up{}", i + 1), cin, cout, (4, 4))
            .with_stride((2, 2))
            .with_padding((1, 1));
        let bn = BatchNorm::new(&ctx, &format!("up{}_bn", i + 1), cout);
        h = sequential(h, &[&up, &bn, &ReLU])?;
    }
    let to_rgb = ConvTranspose2d::new(&ctx, "to_rgb", 32, 3, (4, 4))
        .with_stride((2, 2))
        .with_padding((1, 1));
    let y = sequential(h, &[&to_rgb, &Tanh])?;
    Ok(GraphContext::finish(&ctx, &y))
}

pub fn dcgan_discriminator() -> BuildResult<Asg> {
    let ctx = GraphContext::shared("dcgan_discriminator");
    let x = Tensor::new_input(&ctx, "image", vec![1, 3, 32, 32]);
    let leaky = LeakyReLU::new(0.2);

    let down = |name: &str, cin: usize, cout: usize| {
        let config = Conv2dConfig::new(cin, cout, (4, 4))
            .with_stride((2, 2))
            .with_padding((1, 1));
        Conv2d::from_config(&ctx, name, config)
    };

    // 32x32 -> 16x16 -> 8x8 -> 4x4 -> 1x1
    let mut h = sequential(x, &[&down("down1", 3, 32), &leaky])?;
    for (i, (cin, cout)) in [(32, 64), (64, 128)].into_iter().enumerate() {
        let conv = down(&format!("down{}", i + 2), cin, cout);
        let bn = BatchNorm::new(&ctx, &format!("down{}_bn", i + 2), cout);
        h = sequential(h, &[&conv, &bn, &leaky])?;
    }
    let score = Conv2d::new(&ctx, "score", 128, 1, (4, 4));
    let y = sequential(h, &[&score])?.batch_flatten()?;
    let y = Sigmoid.forward(&y)?;
    Ok(GraphContext::finish(&ctx, &y))
}
