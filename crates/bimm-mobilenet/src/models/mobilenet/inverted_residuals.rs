//! # Inverted Residual Stack
//!
//! An [`InvertedResiduals`] is a chain of [`InvertedResidual`] blocks.
//!
//! [`InvertedResidualsMeta`] defines a common meta API for [`InvertedResiduals`]
//! and [`InvertedResidualsConfig`].
//!
//! [`InvertedResidualsConfig::build`] lays out the usual `MobileNetV2` stage:
//! the first block changes channels and stride, the rest preserve shape.

use crate::layers::sequential::{FeatureLayer, forward_sequence};
use crate::models::mobilenet::inverted_residual::{
    DEFAULT_EXPANSION, InvertedResidual, InvertedResidualConfig, InvertedResidualMeta,
};
use bimm_contracts::{ShapeContract, run_every_nth, shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`InvertedResiduals`] Meta API.
pub trait InvertedResidualsMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stack is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input channels.
    ///
    /// # Panics
    ///
    /// If the stack is empty.
    fn in_channels(&self) -> usize;

    /// The number of output channels.
    ///
    /// # Panics
    ///
    /// If the stack is empty.
    fn out_channels(&self) -> usize;

    /// Get the effective stride of the stack.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2];
}

/// [`InvertedResiduals`] Configuration.
#[derive(Config, Debug)]
pub struct InvertedResidualsConfig {
    /// The component blocks.
    pub blocks: Vec<InvertedResidualConfig>,
}

impl From<Vec<InvertedResidualConfig>> for InvertedResidualsConfig {
    fn from(blocks: Vec<InvertedResidualConfig>) -> Self {
        Self { blocks }
    }
}

impl InvertedResidualsMeta for InvertedResidualsConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_channels(&self) -> usize {
        self.blocks
            .first()
            .map(|block| block.in_channels())
            .unwrap_or_else(|| panic!("in_channels of an empty stack"))
    }

    fn out_channels(&self) -> usize {
        self.blocks
            .last()
            .map(|block| block.out_channels())
            .unwrap_or_else(|| panic!("out_channels of an empty stack"))
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl InvertedResidualsConfig {
    /// Build a stage config.
    ///
    /// The first block maps ``in_channels → out_channels`` with `stride`;
    /// the remaining ``num_blocks - 1`` map ``out_channels → out_channels``
    /// with stride 1. The first block is always built, even for ``num_blocks == 0``.
    pub fn build(
        in_channels: usize,
        out_channels: usize,
        expansion: usize,
        stride: usize,
        num_blocks: usize,
    ) -> Self {
        let blocks = (0..num_blocks.max(1))
            .map(|b| {
                let block = if b == 0 {
                    InvertedResidualConfig::new(in_channels, out_channels).with_stride(stride)
                } else {
                    InvertedResidualConfig::new(out_channels, out_channels)
                };
                block.with_expansion(expansion)
            })
            .collect();

        Self { blocks }
    }

    /// Build a single-block, stride-1 stage with the default expansion.
    pub fn build_default(
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        Self::build(in_channels, out_channels, DEFAULT_EXPANSION, 1, 1)
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| format!("block[{idx}]: {err}"))?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_channels() != curr.in_channels() {
                return Err(format!(
                    "block[{}].out_channels({}) != block[{}].in_channels({})\n{:#?}",
                    idx - 1,
                    prev.out_channels(),
                    idx,
                    curr.in_channels(),
                    self,
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a new [`InvertedResiduals`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    #[tracing::instrument(level = "debug", skip_all, fields(num_blocks = self.blocks.len()))]
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> InvertedResiduals<B> {
        self.expect_valid();

        InvertedResiduals {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, InvertedResidualConfig) -> InvertedResidualConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }
}

/// Build and initialize an inverted residual stage.
///
/// See [`InvertedResidualsConfig::build`].
pub fn inverted_residuals<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    expansion: usize,
    stride: usize,
    num_blocks: usize,
    device: &B::Device,
) -> InvertedResiduals<B> {
    InvertedResidualsConfig::build(in_channels, out_channels, expansion, stride, num_blocks)
        .init(device)
}

/// A chain of [`InvertedResidual`] blocks.
#[derive(Module, Debug)]
pub struct InvertedResiduals<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<InvertedResidual<B>>,
}

impl<B: Backend> InvertedResidualsMeta for InvertedResiduals<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_channels(&self) -> usize {
        self.blocks
            .first()
            .map(|block| block.in_channels())
            .unwrap_or_else(|| panic!("in_channels of an empty stack"))
    }

    fn out_channels(&self) -> usize {
        self.blocks
            .last()
            .map(|block| block.out_channels())
            .unwrap_or_else(|| panic!("out_channels of an empty stack"))
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl<B: Backend> InvertedResiduals<B> {
    /// Apply the blocks in order.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        static INPUT_CONTRACT: ShapeContract =
            shape_contract!["batch", "in_channels", "in_height", "in_width"];
        let [batch, in_height, in_width] = INPUT_CONTRACT.unpack_shape(
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = forward_sequence(&self.blocks, input);

        run_every_nth!({
            static OUTPUT_CONTRACT: ShapeContract =
                shape_contract!["batch", "out_channels", "out_height", "out_width"];
            OUTPUT_CONTRACT.assert_shape(
                &x,
                &[
                    ("batch", batch),
                    ("out_channels", self.out_channels()),
                    ("out_height", out_height),
                    ("out_width", out_width),
                ],
            );
        });

        x
    }
}

impl<B: Backend> FeatureLayer<B> for InvertedResiduals<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        InvertedResiduals::forward(self, input)
    }
}
