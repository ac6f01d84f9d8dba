//! # Activation Layers
//!
//! * [`relu6::Relu6`] - the bounded rectified linear unit.
//! * [`activation_wrapper::Activation`] - activation layer abstraction wrapper.
pub mod activation_wrapper;
pub mod relu6;
