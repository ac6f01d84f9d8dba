//! # Activation Layer Wrapper
use crate::layers::activation::relu6::Relu6;
use burn::nn::{
    Gelu, HardSigmoid, HardSigmoidConfig, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu,
    Sigmoid, Tanh,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Activation`] Configuration.
///
/// Restricted to shape-preserving activations,
/// so every variant can follow a convolution.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu6`] activation layer.
    Relu6,

    /// [`Gelu`] activation layer.
    Gelu,

    /// [`PRelu`] activation layer.
    PRelu(PReluConfig),

    /// [`Relu`] activation layer.
    Relu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),

    /// [`Sigmoid`] activation layer.
    Sigmoid,

    /// [`Tanh`] activation layer.
    Tanh,

    /// [`HardSigmoid`] activation layer.
    HardSigmoid(HardSigmoidConfig),
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl From<HardSigmoidConfig> for ActivationConfig {
    fn from(config: HardSigmoidConfig) -> Self {
        Self::HardSigmoid(config)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        default_activation()
    }
}

/// The default activation of the MobileNet blocks: [`Relu6`].
///
/// This returns a config, not a layer; every [`ActivationConfig::init`]
/// call builds an independent layer, so blocks never share an activation.
pub fn default_activation() -> ActivationConfig {
    ActivationConfig::Relu6
}

impl ActivationConfig {
    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            ActivationConfig::Relu6 => Activation::Relu6(Relu6),
            ActivationConfig::Relu => Activation::Relu(Relu),
            ActivationConfig::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
            ActivationConfig::Gelu => Activation::Gelu(Gelu),
            ActivationConfig::PRelu(conf) => Activation::PRelu(conf.init(device)),
            ActivationConfig::HardSigmoid(conf) => Activation::HardSigmoid(conf.init()),
            ActivationConfig::Sigmoid => Activation::Sigmoid(Sigmoid),
            ActivationConfig::Tanh => Activation::Tanh(Tanh),
        }
    }
}

/// Activation Layer Wrapper.
///
/// Provides support for [`Relu6`] and the shape-preserving `burn::nn` activations.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu6`] activation layer.
    Relu6(Relu6),

    /// [`Gelu`] activation layer.
    Gelu(Gelu),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),

    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    /// [`Tanh`] activation layer.
    Tanh(Tanh),

    /// [`HardSigmoid`] activation layer.
    HardSigmoid(HardSigmoid),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu6(layer) => layer.forward(input),
            Activation::Relu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
            Activation::Gelu(layer) => layer.forward(input),
            Activation::PRelu(layer) => layer.forward(input),
            Activation::HardSigmoid(layer) => layer.forward(input),
            Activation::Sigmoid(layer) => layer.forward(input),
            Activation::Tanh(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Relu6(_) => ActivationConfig::Relu6,
            Activation::Relu(_) => ActivationConfig::Relu,
            Activation::LeakyRelu(layer) => LeakyReluConfig::new()
                .with_negative_slope(layer.negative_slope)
                .into(),
            Activation::Gelu(_) => ActivationConfig::Gelu,
            Activation::PRelu(layer) => PReluConfig::new()
                .with_alpha(layer.alpha_value)
                .with_num_parameters(layer.alpha.shape().dims[0])
                .into(),
            Activation::HardSigmoid(layer) => HardSigmoidConfig::new()
                .with_alpha(layer.alpha)
                .with_beta(layer.beta)
                .into(),
            Activation::Sigmoid(_) => ActivationConfig::Sigmoid,
            Activation::Tanh(_) => ActivationConfig::Tanh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data([[[[-7.0, -0.5], [0.0, 3.0]], [[5.5, 6.0], [6.5, 100.0]]]], device)
    }

    fn check_stateless_config_output<B: Backend, const D: usize>(
        config: ActivationConfig,
        input: Tensor<B, D>,
        expected: Tensor<B, D>,
        device: &B::Device,
    ) {
        let act1 = config.init(device);
        let record: ActivationRecord<B> = act1.into_record();

        let act = config.init(device).load_record(record);
        assert_eq!(format!("{:?}", act.to_config()), format!("{config:?}"));

        let output = act.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_default_activation() {
        assert!(matches!(default_activation(), ActivationConfig::Relu6));
        assert!(matches!(ActivationConfig::default(), ActivationConfig::Relu6));
    }

    #[test]
    fn test_relu6() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let expected = Tensor::from_data([[[[0.0, 0.0], [0.0, 3.0]], [[5.5, 6.0], [6.0, 6.0]]]], &device);

        check_stateless_config_output(ActivationConfig::Relu6, input, expected, &device)
    }

    #[test]
    fn test_fresh_instances() {
        let device = Default::default();
        let config: ActivationConfig = PReluConfig::new().with_alpha(0.5).into();

        let mut a: Activation<TestBackend> = config.init(&device);
        let b: Activation<TestBackend> = config.init(&device);

        // Mutating one instance leaves the other untouched.
        if let Activation::PRelu(layer) = &mut a {
            layer.alpha = layer.alpha.clone().map(|p| p.mul_scalar(0.5));
        }

        let input = make_input::<TestBackend>(&device);

        let expected_a = PReluConfig::new()
            .with_alpha(0.25)
            .init(&device)
            .forward(input.clone());
        let expected_b = PReluConfig::new()
            .with_alpha(0.5)
            .init(&device)
            .forward(input.clone());

        a.forward(input.clone())
            .to_data()
            .assert_eq(&expected_a.to_data(), true);
        b.forward(input)
            .to_data()
            .assert_eq(&expected_b.to_data(), true);
    }

    #[test]
    fn test_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let expected = Relu::default().forward(input.clone());

        check_stateless_config_output(ActivationConfig::Relu, input, expected, &device)
    }

    #[test]
    fn test_leaky_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let inner_config = LeakyReluConfig::new();
        let expected = inner_config.init().forward(input.clone());

        check_stateless_config_output(inner_config.into(), input, expected, &device)
    }

    #[test]
    fn test_gelu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let expected = Gelu::default().forward(input.clone());

        check_stateless_config_output(ActivationConfig::Gelu, input, expected, &device)
    }

    #[test]
    fn test_hard_sigmoid() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let inner_config = HardSigmoidConfig::new();
        let expected = inner_config.init().forward(input.clone());

        check_stateless_config_output(inner_config.into(), input, expected, &device)
    }

    #[test]
    fn test_sigmoid_tanh() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let expected = Sigmoid::default().forward(input.clone());
        check_stateless_config_output(ActivationConfig::Sigmoid, input.clone(), expected, &device);

        let expected = Tanh::default().forward(input.clone());
        check_stateless_config_output(ActivationConfig::Tanh, input, expected, &device);
    }
}
