//! # Layers
//!
//! Each layer is a constructor that adds a fixed pattern of call nodes and
//! parameter variables to the graph held by a `GraphContext`. Parameter
//! shapes are fixed at construction so every call gets a concrete result
//! type.
//!
//! - [`Linear`]: `nn.dense` followed by `nn.bias_add`
//! - [`Conv2d`], [`ConvTranspose2d`]: 2D convolutions with optional bias
//! - [`MaxPool2d`], [`AvgPool2d`], [`AdaptiveAvgPool2d`]
//! - [`BatchNorm`]: `nn.batch_norm` plus `TupleGetItem` of the normalized output
//! - [`ReLU`], [`LeakyReLU`], [`Sigmoid`], [`Tanh`], [`Softmax`]

pub mod activations;
pub mod batchnorm;
pub mod conv;
pub mod linear;
pub mod module;
pub mod pooling;

pub use activations::{LeakyReLU, ReLU, Sigmoid, Softmax, Tanh};
pub use batchnorm::BatchNorm;
pub use conv::{Conv2d, Conv2dConfig, ConvTranspose2d};
pub use linear::Linear;
pub use module::Module;
pub use pooling::{AdaptiveAvgPool2d, AvgPool2d, MaxPool2d};
