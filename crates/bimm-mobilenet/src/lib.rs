#![warn(missing_docs)]
//!# bimm-mobilenet - `MobileNetV2` Blocks for Burn
//!
//! ## Notable Components
//!
//! * [`compat`] - compat code, ported or planned for an upcoming release of ``burn``.
//!   * [`compat::conv_shape`] - convolution output shape arithmetic.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation layers.
//!     * [`layers::activation::relu6::Relu6`] - the bounded ``ReLU``.
//!     * [`layers::activation::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`layers::padding`] - "same" padding arithmetic.
//!   * [`layers::sequential`] - composition of optional layers.
//!   * [`layers::blocks::conv_block`] - ``Conv2d + Norm + Activation`` block.
//! * [`models`] - model components.
//!   * [`models::mobilenet`] - `MobileNetV2` inverted residual blocks and stages.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bimm_mobilenet::models::mobilenet::inverted_residuals::inverted_residuals;
//!
//! // 16 → 24 channels, downsample by 2, three blocks.
//! let stage = inverted_residuals::<B>(16, 24, 6, 2, 3, &device);
//! let y = stage.forward(x);
//! ```

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod layers;
pub mod models;
