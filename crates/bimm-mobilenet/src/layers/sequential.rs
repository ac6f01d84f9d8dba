//! # Sequential Composition
//!
//! [`FeatureLayer`] is the one-operation contract shared by every unit
//! which maps a ``[batch, channels, height, width]`` feature map to another.
//!
//! [`Layer`] wraps the leaf units ([`Conv2d`], [`Normalization`], [`Activation`]),
//! and [`Sequential`] applies an ordered list of them.
//!
//! [`sequential`] builds a [`Sequential`] from optional units,
//! dropping the absent ones:
//!
//! ```rust,ignore
//! let block: Sequential<B> = sequential([
//!     Some(Layer::from(conv)),
//!     norm.map(Layer::from),
//!     act.map(Layer::from),
//! ]);
//! ```

use crate::compat::normalization_wrapper::Normalization;
use crate::layers::activation::activation_wrapper::Activation;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};

/// A unit mapping a feature map to a feature map.
///
/// Units are composed, never introspected; shape compatibility
/// between neighbours is only checked when data flows through them.
pub trait FeatureLayer<B: Backend> {
    /// Apply the unit.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4>;
}

impl<B: Backend> FeatureLayer<B> for Conv2d<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        Conv2d::forward(self, input)
    }
}

impl<B: Backend> FeatureLayer<B> for Normalization<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        Normalization::forward(self, input)
    }
}

impl<B: Backend> FeatureLayer<B> for Activation<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        Activation::forward(self, input)
    }
}

/// Apply a sequence of units in order.
///
/// An empty sequence returns the input unchanged.
pub fn forward_sequence<B, L>(
    units: &[L],
    input: Tensor<B, 4>,
) -> Tensor<B, 4>
where
    B: Backend,
    L: FeatureLayer<B>,
{
    units.iter().fold(input, |x, unit| unit.forward(x))
}

/// A leaf unit of a [`Sequential`].
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Layer<B: Backend> {
    /// A [`Conv2d`] layer.
    Conv(Conv2d<B>),

    /// A [`Normalization`] layer.
    Norm(Normalization<B>),

    /// An [`Activation`] layer.
    Act(Activation<B>),
}

impl<B: Backend> From<Conv2d<B>> for Layer<B> {
    fn from(layer: Conv2d<B>) -> Self {
        Self::Conv(layer)
    }
}

impl<B: Backend> From<Normalization<B>> for Layer<B> {
    fn from(layer: Normalization<B>) -> Self {
        Self::Norm(layer)
    }
}

impl<B: Backend> From<Activation<B>> for Layer<B> {
    fn from(layer: Activation<B>) -> Self {
        Self::Act(layer)
    }
}

impl<B: Backend> Layer<B> {
    /// Apply the wrapped layer.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Conv(layer) => layer.forward(input),
            Self::Norm(layer) => layer.forward(input),
            Self::Act(layer) => layer.forward(input),
        }
    }
}

impl<B: Backend> FeatureLayer<B> for Layer<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        Layer::forward(self, input)
    }
}

/// An ordered composition of [`Layer`]s.
///
/// Nested compositions are flattened on construction;
/// applying ``[a, [b, c]]`` and ``[a, b, c]`` is the same computation.
#[derive(Module, Debug)]
pub struct Sequential<B: Backend> {
    /// The layers, in application order.
    pub layers: Vec<Layer<B>>,
}

impl<B: Backend> Default for Sequential<B> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<B: Backend> From<Layer<B>> for Sequential<B> {
    fn from(layer: Layer<B>) -> Self {
        Self {
            layers: vec![layer],
        }
    }
}

impl<B: Backend> From<Vec<Layer<B>>> for Sequential<B> {
    fn from(layers: Vec<Layer<B>>) -> Self {
        Self { layers }
    }
}

impl<B: Backend> FromIterator<Layer<B>> for Sequential<B> {
    fn from_iter<I: IntoIterator<Item = Layer<B>>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

impl<B: Backend> FromIterator<Sequential<B>> for Sequential<B> {
    fn from_iter<I: IntoIterator<Item = Sequential<B>>>(iter: I) -> Self {
        iter.into_iter().flat_map(|seq| seq.layers).collect()
    }
}

impl<B: Backend> Sequential<B> {
    /// The number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if there are no layers; an empty [`Sequential`] is the identity.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Apply the layers in order.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        forward_sequence(&self.layers, input)
    }
}

impl<B: Backend> FeatureLayer<B> for Sequential<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        Sequential::forward(self, input)
    }
}

/// Compose optional units into one [`Sequential`].
///
/// `None` entries are dropped; the remaining units keep their relative order.
/// If nothing remains, the result is the empty (identity) [`Sequential`].
///
/// No shape checks happen here; an incompatible neighbour
/// fails when the composite is applied.
pub fn sequential<B, U, I>(units: I) -> Sequential<B>
where
    B: Backend,
    U: Into<Sequential<B>>,
    I: IntoIterator<Item = Option<U>>,
{
    units
        .into_iter()
        .flatten()
        .map(Into::<Sequential<B>>::into)
        .collect()
}
