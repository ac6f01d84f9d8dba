//! # Inverted Residual Block
//!
//! The `MobileNetV2` block: expand, filter depthwise, project.
//!
//! ```text
//! x ─┬─ conv1x1(in → in*expansion) ─ norm ─ act
//!    │  conv3x3(stride, groups=in*expansion) ─ norm ─ act
//!    │  conv1x1(in*expansion → out) ─ norm
//!    └─────────────── (+ x, if stride == 1 and in == out)
//! ```
//!
//! The projection has no activation (the "linear bottleneck").
//!
//! [`InvertedResidualMeta`] defines a common meta API for [`InvertedResidual`]
//! and [`InvertedResidualConfig`].
//!
//! [`InvertedResidualConfig`] implements [`Config`], and provides
//! [`InvertedResidualConfig::init`] to initialize an [`InvertedResidual`].

use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::activation::activation_wrapper::{ActivationConfig, default_activation};
use crate::layers::blocks::conv_block::{ConvBlockConfig, ConvBlockMeta};
use crate::layers::sequential::{FeatureLayer, Sequential, sequential};
use bimm_contracts::{ShapeContract, run_every_nth, shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// The conventional `MobileNetV2` expansion factor.
pub const DEFAULT_EXPANSION: usize = 6;

/// The kernel size of the depthwise stage.
pub const DEPTHWISE_KERNEL_SIZE: usize = 3;

/// [`InvertedResidual`] Meta API.
pub trait InvertedResidualMeta {
    /// The number of input channels.
    fn in_channels(&self) -> usize;

    /// The number of expanded channels of the depthwise stage.
    fn hidden_channels(&self) -> usize;

    /// The number of output channels.
    fn out_channels(&self) -> usize;

    /// The stride of the depthwise stage.
    fn stride(&self) -> usize;

    /// Does the block add its input to its output?
    ///
    /// True exactly when the block preserves shape:
    /// `stride == 1 && in_channels == out_channels`.
    fn is_residual(&self) -> bool {
        self.stride() == 1 && self.in_channels() == self.out_channels()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``; ``ceil(in / stride)`` on each axis.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        ConvBlockConfig::new(self.hidden_channels(), self.hidden_channels())
            .with_kernel_size(DEPTHWISE_KERNEL_SIZE)
            .with_stride(self.stride())
            .output_resolution(input_resolution)
    }
}

/// [`InvertedResidual`] Config.
///
/// Implements [`InvertedResidualMeta`].
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    /// The number of input channels.
    pub in_channels: usize,

    /// The number of output channels.
    pub out_channels: usize,

    /// Channel expansion factor of the hidden stage.
    #[config(default = "DEFAULT_EXPANSION")]
    pub expansion: usize,

    /// Stride of the depthwise stage.
    #[config(default = 1)]
    pub stride: usize,

    /// Normalization used after every conv.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,

    /// Activation of the expansion and depthwise stages.
    #[config(default = "default_activation()")]
    pub act: ActivationConfig,
}

impl InvertedResidualMeta for InvertedResidualConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn hidden_channels(&self) -> usize {
        self.in_channels * self.expansion
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl InvertedResidualConfig {
    /// The pointwise expansion stage: ``in → hidden``, with activation.
    pub fn expand_config(&self) -> ConvBlockConfig {
        ConvBlockConfig::new(self.in_channels(), self.hidden_channels())
            .with_kernel_size(1)
            .with_norm(Some(self.norm.clone()))
            .with_act(Some(self.act.clone()))
    }

    /// The depthwise stage: ``hidden → hidden``, one group per channel, with activation.
    pub fn depthwise_config(&self) -> ConvBlockConfig {
        let channels = self.hidden_channels();
        ConvBlockConfig::new(channels, channels)
            .with_kernel_size(DEPTHWISE_KERNEL_SIZE)
            .with_stride(self.stride())
            .with_groups(channels)
            .with_norm(Some(self.norm.clone()))
            .with_act(Some(self.act.clone()))
    }

    /// The pointwise projection stage: ``hidden → out``, without activation.
    pub fn project_config(&self) -> ConvBlockConfig {
        ConvBlockConfig::new(self.hidden_channels(), self.out_channels())
            .with_kernel_size(1)
            .with_norm(Some(self.norm.clone()))
            .with_act(None)
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.expansion == 0 {
            return Err(format!("expansion must be > 0:\n{self:#?}"));
        }
        self.expand_config().try_validate()?;
        self.depthwise_config().try_validate()?;
        self.project_config().try_validate()
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err)
        }
    }

    /// Initialize an [`InvertedResidual`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    #[tracing::instrument(level = "debug", skip_all, fields(
        in_channels = self.in_channels,
        out_channels = self.out_channels,
        stride = self.stride,
    ))]
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InvertedResidual<B> {
        self.expect_valid();

        let bottlebody = sequential([
            Some(self.expand_config().init::<B>(device)),
            Some(self.depthwise_config().init::<B>(device)),
            Some(self.project_config().init::<B>(device)),
        ]);

        let is_residual = self.is_residual();
        tracing::debug!(
            hidden_channels = self.hidden_channels(),
            is_residual,
            "built inverted residual"
        );

        InvertedResidual {
            bottlebody,
            in_channels: self.in_channels(),
            hidden_channels: self.hidden_channels(),
            out_channels: self.out_channels(),
            stride: self.stride(),
            is_residual,
        }
    }
}

/// `MobileNetV2` inverted residual block.
///
/// The residual flag is fixed when the block is built.
///
/// Implements [`InvertedResidualMeta`].
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// The expand / depthwise / project conv blocks.
    pub bottlebody: Sequential<B>,

    /// Input channels.
    pub in_channels: usize,

    /// Expanded channels.
    pub hidden_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Depthwise stride.
    pub stride: usize,

    /// Add the input to the output.
    pub is_residual: bool,
}

impl<B: Backend> InvertedResidualMeta for InvertedResidual<B> {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn is_residual(&self) -> bool {
        self.is_residual
    }
}

impl<B: Backend> InvertedResidual<B> {
    /// Forward Pass.
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

        let x = if self.is_residual {
            self.bottlebody.forward(input.clone()) + input
        } else {
            self.bottlebody.forward(input)
        };

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

impl<B: Backend> FeatureLayer<B> for InvertedResidual<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        InvertedResidual::forward(self, input)
    }
}
