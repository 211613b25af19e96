//! Uniform ("boxcar") smoothing with centered, zero-padded, same-size output.
//!
//! Alignment follows the usual `convolve(x, ones(k) / k, "same")` rule:
//! output `i` averages inputs `i + (k - 1) / 2 - j` for `j` in `0..k`,
//! treating indices outside the input as zeros. The output always has the
//! input's length, including when the input is shorter than the kernel.

use ndarray::{Array2, ArrayViewMut1, Axis};

/// Boxcar-smooth `input` with a kernel of `width` taps.
pub fn box_smooth(input: &[f32], width: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 || width <= 1 {
        return input.to_vec();
    }

    // f64 prefix sums keep the windowed sums stable across long inputs.
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &v in input {
        acc += v as f64;
        prefix.push(acc);
    }

    let offset = (width - 1) / 2;
    let scale = 1.0 / width as f64;
    (0..n)
        .map(|i| {
            // Inclusive input range [lo, hi] covered by the kernel.
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset).saturating_sub(width - 1);
            if lo > hi {
                return 0.0;
            }
            ((prefix[hi + 1] - prefix[lo]) * scale) as f32
        })
        .collect()
}

/// Smooth every lane of `grid` along `axis` in place.
pub fn smooth_axis(grid: &mut Array2<f32>, axis: Axis, width: usize) {
    if width <= 1 {
        return;
    }
    for lane in grid.lanes_mut(axis) {
        smooth_lane(lane, width);
    }
}

fn smooth_lane(mut lane: ArrayViewMut1<'_, f32>, width: usize) {
    let smoothed = box_smooth(&lane.to_vec(), width);
    for (dst, src) in lane.iter_mut().zip(smoothed) {
        *dst = src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn assert_slice_eq(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-6);
        }
    }

    #[test]
    fn even_kernel_leans_backwards() {
        assert_slice_eq(&box_smooth(&[1.0, 2.0, 3.0, 4.0], 2), &[0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn odd_kernel_is_centered() {
        assert_slice_eq(&box_smooth(&[3.0, 6.0, 9.0], 3), &[3.0, 6.0, 5.0]);
    }

    #[test]
    fn zero_padding_at_both_edges() {
        assert_slice_eq(
            &box_smooth(&[1.0, 0.0, 0.0, 0.0, 0.0, 2.0], 4),
            &[0.25, 0.25, 0.25, 0.0, 0.5, 0.5],
        );
    }

    #[test]
    fn kernel_longer_than_input_keeps_length() {
        let out = box_smooth(&[4.0, 4.0], 20);
        assert_eq!(out.len(), 2);
        // offset 9: both outputs see the whole input
        assert_slice_eq(&out, &[0.4, 0.4]);
    }

    #[test]
    fn width_one_is_identity() {
        assert_slice_eq(&box_smooth(&[1.0, -2.0, 3.0], 1), &[1.0, -2.0, 3.0]);
    }

    #[test]
    fn smooth_axis_touches_only_the_requested_axis() {
        let mut grid = array![[1.0f32, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0]];
        smooth_axis(&mut grid, Axis(1), 2);
        assert_slice_eq(grid.row(0).as_slice().unwrap(), &[0.5, 1.5, 2.5, 3.5]);
        assert_slice_eq(grid.row(1).as_slice().unwrap(), &[0.0; 4]);
    }
}
