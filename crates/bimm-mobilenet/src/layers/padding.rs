//! # "Same" Padding
//!
//! Symmetric padding which preserves the spatial size of a stride-1 convolution.

use burn::nn::PaddingConfig2d;

/// Compute the symmetric padding which preserves spatial size.
///
/// ```text
/// padding = floor( (kernel_size - 1) * dilation / 2 )
/// ```
///
/// The result is exact "same" padding only for stride 1 and odd kernel sizes;
/// even kernels lose one row/column.
///
/// # Arguments
///
/// - `kernel_size`: the kernel size, must be > 0.
/// - `dilation`: the kernel dilation, must be > 0; conventionally 1.
///
/// # Returns
///
/// The padding to add to each side of the input.
#[inline(always)]
pub fn same_padding(
    kernel_size: usize,
    dilation: usize,
) -> usize {
    (kernel_size - 1) * dilation / 2
}

/// Build an explicit, square [`PaddingConfig2d`] from [`same_padding`].
pub fn same_padding_2d(
    kernel_size: usize,
    dilation: usize,
) -> PaddingConfig2d {
    let padding = same_padding(kernel_size, dilation);
    PaddingConfig2d::Explicit(padding, padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::conv_shape::expect_conv1d_output_size;

    #[test]
    fn test_same_padding() {
        assert_eq!(same_padding(3, 1), 1);
        assert_eq!(same_padding(1, 1), 0);
        assert_eq!(same_padding(3, 2), 2);
        assert_eq!(same_padding(5, 1), 2);
        assert_eq!(same_padding(7, 3), 9);

        // Even kernels floor.
        assert_eq!(same_padding(2, 1), 0);
        assert_eq!(same_padding(4, 1), 1);
    }

    #[test]
    fn test_same_padding_preserves_size() {
        for input_size in 5..12 {
            for kernel_size in [1, 3, 5, 7] {
                for dilation in 1..3 {
                    let padding = same_padding(kernel_size, dilation);
                    if 1 + dilation * (kernel_size - 1) > input_size + 2 * padding {
                        continue;
                    }
                    assert_eq!(
                        expect_conv1d_output_size(input_size, kernel_size, 1, padding, dilation),
                        input_size,
                        "kernel_size={kernel_size}, dilation={dilation}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_padding_2d() {
        match same_padding_2d(3, 2) {
            PaddingConfig2d::Explicit(h, w) => {
                assert_eq!(h, 2);
                assert_eq!(w, 2);
            }
            _ => unreachable!(),
        }
    }
}
