//! # Conv Block - conv/norm/activation.
//!
//! A conv block is a [`Sequential`] of:
//! * a bias-free [`Conv2d`] layer,
//! * an optional [`Normalization`] layer, sized to the conv output channels,
//! * an optional [`Activation`] layer.
//!
//! Padding defaults to [`same_padding`] for the kernel and dilation.
//!
//! [`ConvBlockConfig`] is the hyperparameter descriptor;
//! [`ConvBlockConfig::init`] (or [`conv`]) builds the block.
//!
//! [`Normalization`]: crate::compat::normalization_wrapper::Normalization
//! [`Activation`]: crate::layers::activation::activation_wrapper::Activation

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::activation::activation_wrapper::{ActivationConfig, default_activation};
use crate::layers::padding::same_padding;
use crate::layers::sequential::{Layer, Sequential, sequential};
use burn::config::Config;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::Backend;

/// [`ConvBlockConfig`] Meta API.
pub trait ConvBlockMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Square kernel size.
    fn kernel_size(&self) -> usize;

    /// Stride, on both spatial axes.
    fn stride(&self) -> usize;

    /// Kernel dilation.
    fn dilation(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// The effective padding, on every side.
    ///
    /// Never zero unless the kernel itself needs none.
    fn padding(&self) -> usize;

    /// Is this a depthwise convolution?
    ///
    /// Depthwise means one group per channel.
    fn is_depthwise(&self) -> bool {
        self.groups() == self.in_channels() && self.in_channels() == self.out_channels()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the kernel does not fit in the padded input.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let k = self.kernel_size();
        let s = self.stride();
        let p = self.padding();
        let d = self.dilation();
        expect_conv_output_shape(input_resolution, [k, k], [s, s], [p, p], [d, d])
    }
}

/// Conv Block Config.
///
/// Implements [`ConvBlockMeta`].
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Square kernel size.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Explicit padding; when `None` or `Some(0)`, [`same_padding`] is used.
    #[config(default = "None")]
    pub padding: Option<usize>,

    /// Kernel dilation.
    #[config(default = 1)]
    pub dilation: usize,

    /// Number of groups; must divide both channel counts.
    #[config(default = 1)]
    pub groups: usize,

    /// The normalization config; resized to `out_channels` on init.
    #[config(default = "Some(NormalizationConfig::default())")]
    pub norm: Option<NormalizationConfig>,

    /// The activation config.
    #[config(default = "Some(default_activation())")]
    pub act: Option<ActivationConfig>,
}

impl ConvBlockMeta for ConvBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn dilation(&self) -> usize {
        self.dilation
    }

    fn groups(&self) -> usize {
        self.groups
    }

    fn padding(&self) -> usize {
        self.padding
            .filter(|&padding| padding != 0)
            .unwrap_or_else(|| same_padding(self.kernel_size, self.dilation))
    }
}

impl ConvBlockConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("kernel_size", self.kernel_size),
            ("stride", self.stride),
            ("dilation", self.dilation),
            ("groups", self.groups),
        ] {
            if value == 0 {
                return Err(format!("{name} must be > 0:\n{self:#?}"));
            }
        }
        if self.in_channels % self.groups != 0 || self.out_channels % self.groups != 0 {
            return Err(format!(
                "groups({}) must divide in_channels({}) and out_channels({})",
                self.groups, self.in_channels, self.out_channels,
            ));
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err)
        }
    }

    /// The [`Conv2dConfig`] of the conv layer.
    ///
    /// The conv layer carries no bias; the norm layer which usually
    /// follows it has its own shift.
    pub fn conv_config(&self) -> Conv2dConfig {
        let padding = self.padding();
        Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_dilation([self.dilation, self.dilation])
        .with_groups(self.groups)
        .with_bias(false)
    }

    /// The norm config, if any, matched to the conv output channels.
    pub fn matched_norm(&self) -> Option<NormalizationConfig> {
        self.norm
            .clone()
            .map(|norm| norm.with_num_features(self.out_channels))
    }

    /// Initialize the conv block.
    ///
    /// Every call builds fresh layers; no layer is shared with
    /// any other block built from the same config.
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    #[tracing::instrument(level = "trace", skip(device))]
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Sequential<B> {
        self.expect_valid();

        let conv: Conv2d<B> = self.conv_config().init(device);
        let norm = self.matched_norm().map(|norm| norm.init::<B>(device));
        let act = self.act.as_ref().map(|act| act.init::<B>(device));

        sequential([
            Some(Layer::from(conv)),
            norm.map(Layer::from),
            act.map(Layer::from),
        ])
    }
}

/// Build a conv/norm/activation block.
///
/// Equivalent to [`ConvBlockConfig::init`].
pub fn conv<B: Backend>(
    config: &ConvBlockConfig,
    device: &B::Device,
) -> Sequential<B> {
    config.init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::activation::activation_wrapper::Activation;
    use bimm_contracts::{ShapeContract, shape_contract};
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::GroupNormConfig;
    use burn::prelude::Tensor;
    use burn::tensor::Distribution;

    #[test]
    fn test_config_defaults() {
        let config = ConvBlockConfig::new(8, 16);

        assert_eq!(config.in_channels(), 8);
        assert_eq!(config.out_channels(), 16);
        assert_eq!(config.kernel_size(), 3);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.dilation(), 1);
        assert_eq!(config.groups(), 1);
        assert_eq!(config.padding(), 1);
        assert!(!config.is_depthwise());
        assert!(matches!(config.norm, Some(NormalizationConfig::Batch(_))));
        assert!(matches!(config.act, Some(ActivationConfig::Relu6)));

        assert_eq!(config.output_resolution([12, 9]), [12, 9]);
        assert_eq!(
            config.clone().with_stride(2).output_resolution([12, 9]),
            [6, 5]
        );
    }

    #[test]
    fn test_padding() {
        let config = ConvBlockConfig::new(4, 4).with_dilation(2);
        assert_eq!(config.padding(), 2);

        let config = ConvBlockConfig::new(4, 4).with_kernel_size(1);
        assert_eq!(config.padding(), 0);

        // An explicit 0 falls back to same padding.
        let config = ConvBlockConfig::new(4, 4).with_padding(Some(0));
        assert_eq!(config.padding(), 1);
        assert_eq!(config.output_resolution([8, 8]), [8, 8]);
        assert!(matches!(
            config.conv_config().padding,
            PaddingConfig2d::Explicit(1, 1)
        ));

        let config = ConvBlockConfig::new(4, 4)
            .with_kernel_size(5)
            .with_padding(Some(0));
        assert_eq!(config.padding(), 2);

        let config = ConvBlockConfig::new(4, 4).with_padding(Some(2));
        assert_eq!(config.padding(), 2);
        assert_eq!(config.output_resolution([8, 8]), [10, 10]);

        let conv_config = ConvBlockConfig::new(4, 4).with_padding(Some(3)).conv_config();
        assert!(matches!(
            conv_config.padding,
            PaddingConfig2d::Explicit(3, 3)
        ));
        assert!(!conv_config.bias);
    }

    #[test]
    fn test_depthwise_meta() {
        let config = ConvBlockConfig::new(12, 12).with_groups(12);
        assert!(config.is_depthwise());
        config.expect_valid();
    }

    #[test]
    fn test_validate() {
        assert!(ConvBlockConfig::new(8, 16).try_validate().is_ok());
        assert!(ConvBlockConfig::new(0, 16).try_validate().is_err());
        assert!(
            ConvBlockConfig::new(8, 16)
                .with_kernel_size(0)
                .try_validate()
                .is_err()
        );
        assert!(
            ConvBlockConfig::new(8, 12)
                .with_groups(8)
                .try_validate()
                .is_err()
        );
    }

    #[test]
    #[should_panic(expected = "groups(3) must divide")]
    fn test_init_invalid_panics() {
        type B = NdArray<f32>;
        let device = Default::default();

        let _block: Sequential<B> = ConvBlockConfig::new(4, 8).with_groups(3).init(&device);
    }

    #[test]
    fn test_init_structure() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: Sequential<B> = ConvBlockConfig::new(2, 6).with_stride(2).init(&device);
        assert_eq!(block.len(), 3);

        match &block.layers[0] {
            Layer::Conv(conv) => {
                assert_eq!(conv.weight.shape().dims, [6, 2, 3, 3]);
                assert!(conv.bias.is_none());
                assert_eq!(conv.stride, [2, 2]);
            }
            _ => unreachable!(),
        }
        match &block.layers[1] {
            Layer::Norm(norm) => assert_eq!(norm.num_features(), 6),
            _ => unreachable!(),
        }
        assert!(matches!(
            &block.layers[2],
            Layer::Act(Activation::Relu6(_))
        ));
    }

    #[test]
    fn test_init_optional_stages() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: Sequential<B> = ConvBlockConfig::new(2, 6).with_act(None).init(&device);
        assert_eq!(block.len(), 2);
        assert!(matches!(&block.layers[1], Layer::Norm(_)));

        let block: Sequential<B> = ConvBlockConfig::new(2, 6)
            .with_norm(None)
            .with_act(None)
            .init(&device);
        assert_eq!(block.len(), 1);
        assert!(matches!(&block.layers[0], Layer::Conv(_)));

        let block: Sequential<B> = ConvBlockConfig::new(2, 6)
            .with_norm(Some(GroupNormConfig::new(3, 0).into()))
            .init(&device);
        match &block.layers[1] {
            Layer::Norm(norm) => assert_eq!(norm.num_features(), 6),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_conv_forward() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let config = ConvBlockConfig::new(2, 4).with_stride(2);
        let block: Sequential<B> = conv(&config, &device);

        let batch_size = 2;
        let input: Tensor<B, 4> =
            Tensor::random([batch_size, 2, 9, 10], Distribution::Default, &device);

        let output = block.forward(input.clone());

        let [out_height, out_width] = config.output_resolution([9, 10]);
        assert_eq!([out_height, out_width], [5, 5]);
        static CONTRACT: ShapeContract =
            shape_contract!["batch", "out_channels", "out_height", "out_width"];
        CONTRACT.assert_shape(
            &output,
            &[
                ("batch", batch_size),
                ("out_channels", 4),
                ("out_height", out_height),
                ("out_width", out_width),
            ],
        );

        let expected = {
            let x = block.layers[0].forward(input);
            let x = block.layers[1].forward(x);
            block.layers[2].forward(x)
        };
        output.to_data().assert_eq(&expected.to_data(), true);

        // Relu6 bounds the output.
        let max: f32 = output.clone().max().into_scalar();
        let min: f32 = output.min().into_scalar();
        assert!(min >= 0.0);
        assert!(max <= 6.0);
    }
}
