//! Global cosine similarity between two spectrograms.
//!
//! Both grids are cut to their shared frame count, then scored as
//! `Σ(a · b) / (‖a‖ · ‖b‖)` over the whole truncated grid. Magnitudes are
//! non-negative, so the score lands in `[0, 1]` up to float rounding.

use ndarray::s;
use tracing::debug;

use super::Spectrogram;

/// Score two spectrograms; `0.0` when either side has no energy.
pub fn compare(a: &Spectrogram, b: &Spectrogram) -> f32 {
    debug_assert_eq!(
        a.bins(),
        b.bins(),
        "spectrograms built with different window lengths"
    );
    let bins = a.bins().min(b.bins());
    let frames = a.frames().min(b.frames());

    let av = a.values();
    let bv = b.values();
    let av = av.slice(s![..bins, ..frames]);
    let bv = bv.slice(s![..bins, ..frames]);

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in av.iter().zip(bv.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        debug!(frames, bins, "degenerate comparison, scoring 0");
        return 0.0;
    }
    (dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn spectrogram(values: Array2<f32>) -> Spectrogram {
        Spectrogram::new(values)
    }

    #[test]
    fn identical_grids_score_one() {
        let a = spectrogram(array![[1.0, 2.0], [3.0, 4.0]]);
        assert_relative_eq!(compare(&a, &a), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn orthogonal_grids_score_zero() {
        let a = spectrogram(array![[1.0, 0.0], [0.0, 0.0]]);
        let b = spectrogram(array![[0.0, 0.0], [0.0, 1.0]]);
        assert_eq!(compare(&a, &b), 0.0);
    }

    #[test]
    fn longer_grid_is_truncated() {
        let a = spectrogram(array![[1.0, 2.0], [3.0, 4.0]]);
        let b = spectrogram(array![[1.0, 2.0, 100.0], [3.0, 4.0, -50.0]]);
        assert_relative_eq!(compare(&a, &b), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn score_is_global_not_per_frame() {
        // Frame 0 identical, frame 1 orthogonal; the global cosine is
        // (1·1 + 0) / (√2 · √2) = 0.5.
        let a = spectrogram(array![[1.0, 1.0], [0.0, 0.0]]);
        let b = spectrogram(array![[1.0, 0.0], [0.0, 1.0]]);
        assert_relative_eq!(compare(&a, &b), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn silence_scores_zero() {
        let a = spectrogram(array![[1.0, 2.0], [3.0, 4.0]]);
        let silent = spectrogram(Array2::zeros((2, 2)));
        assert_eq!(compare(&a, &silent), 0.0);
        assert_eq!(compare(&silent, &silent), 0.0);
    }

    #[test]
    fn empty_grid_scores_zero() {
        let a = spectrogram(array![[1.0, 2.0], [3.0, 4.0]]);
        let empty = Spectrogram::empty(2);
        assert_eq!(compare(&a, &empty), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = spectrogram(array![[0.3, 2.0, 1.0], [3.0, 0.1, 4.0]]);
        let b = spectrogram(array![[1.5, 0.2], [0.7, 2.5]]);
        assert_eq!(compare(&a, &b), compare(&b, &a));
    }
}
