//! Noise: Shannon entropy of the grayscale histogram.
//!
//! A clean scan piles its mass into a few bins (paper and ink). Sensor and
//! compression noise smear it across many bins and push entropy up, so the
//! check passes on LOW entropy.

use image::GrayImage;

/// Added inside the logarithm so empty bins contribute nothing instead of NaN.
pub const ENTROPY_EPSILON: f64 = 1e-7;

/// 256-bin intensity histogram.
pub fn intensity_histogram(img: &GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for pixel in img.pixels() {
        bins[pixel.0[0] as usize] += 1;
    }
    bins
}

/// `H = -Σ p·log2(p + ε)` over the normalized histogram, in bits (0..=8).
pub fn histogram_entropy(img: &GrayImage) -> f64 {
    let bins = intensity_histogram(img);
    let total: u64 = bins.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    -bins
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            p * (p + ENTROPY_EPSILON).log2()
        })
        .sum::<f64>()
}
