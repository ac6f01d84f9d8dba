//! # `MobileNetV2` Blocks
//!
//! * [`inverted_residual`] - the inverted residual / linear bottleneck block.
//! * [`inverted_residuals`] - chained stages of inverted residual blocks.
pub mod inverted_residual;
pub mod inverted_residuals;
