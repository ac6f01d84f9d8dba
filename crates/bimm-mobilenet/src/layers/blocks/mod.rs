//! Miscellaneous blocks.
pub mod conv_block;
