//! The `Module` trait shared by all layers.

use crate::tensor::{BuildResult, Tensor};

/// A layer that appends its pattern of operations and parameters to the
/// graph under construction.
pub trait Module {
    /// Symbolic forward pass: builds this layer's part of the graph on top of
    /// `inputs`. Shape mismatches surface as `BuildError`s.
    fn forward(&self, inputs: &Tensor) -> BuildResult<Tensor>;

    /// Trainable parameters owned by this module.
    fn parameters(&self) -> Vec<Tensor>;
}
