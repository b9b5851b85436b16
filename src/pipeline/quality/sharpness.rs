//! Sharpness: variance of the Laplacian response.
//!
//! A focused page has hard ink edges everywhere, so the second derivative
//! swings widely. Blur flattens those swings and the variance collapses
//! toward zero. A blank page scores 0 and fails, which is what we want.

use image::GrayImage;

/// Mirror an out-of-range index back into `0..len` without repeating the edge
/// sample (`dcb|abcd|cba`).
pub(crate) fn reflect_101(i: i64, len: i64) -> i64 {
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * len - 2 - i;
        }
    }
    i
}

/// Laplacian response `[0,1,0; 1,-4,1; 0,1,0]` at every pixel, borders
/// reflected, so the field has the input's dimensions.
pub fn laplacian_response(img: &GrayImage) -> Vec<f64> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let at = |x: i64, y: i64| -> f64 {
        let x = reflect_101(x, w) as u32;
        let y = reflect_101(y, h) as u32;
        img.get_pixel(x, y).0[0] as f64
    };

    let mut response = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let value = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            response.push(value);
        }
    }
    response
}

/// Population variance of the Laplacian response. Higher = sharper.
///
/// Soft phone captures land around 30-100, crisp scans well above 500.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let response = laplacian_response(img);
    if response.is_empty() {
        return 0.0;
    }

    let n = response.len() as f64;
    let mean = response.iter().sum::<f64>() / n;
    let variance = response.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance.max(0.0)
}
