//! # `ReLU6` Activation
use burn::prelude::{Backend, Module, Tensor};

/// Bounded rectified linear unit.
///
/// ```text
/// y = min(max(x, 0), 6)
/// ```
///
/// The input tensor is consumed; the backend reuses its buffer when uniquely owned.
#[derive(Module, Clone, Debug, Default)]
pub struct Relu6;

impl Relu6 {
    /// The upper bound of the activation.
    pub const CAP: f32 = 6.0;

    /// Create the module.
    pub fn new() -> Self {
        Self
    }

    /// Forward pass.
    ///
    /// Any shape; the output shape matches the input.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clamp(0.0, Self::CAP)
    }
}
