//! Framing: how much of the frame the document outline covers.
//!
//! grayscale → 5x5 Gaussian → Canny → close 1px gaps → external contours →
//! largest enclosed area / frame area.
//!
//! This is a coarse heuristic. The largest outer contour is assumed to be
//! the page, which cluttered backgrounds can defeat.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::sharpness::reflect_101;

/// Canny needs a 3x3 neighbourhood around every interior pixel.
const MIN_FRAMING_DIMENSION: u32 = 3;

/// Binomial 5-tap kernel; sums to 16.
const GAUSSIAN_5: [u32; 5] = [1, 4, 6, 4, 1];

/// Why no document outline could be measured. Always turns into a failed
/// framing check, never into an error for the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryError {
    #[error("Image too small for edge detection")]
    TooSmall,

    #[error("No contours found in edge map")]
    NoContours,

    #[error("Largest contour encloses no area")]
    ZeroArea,
}

/// Separable 5x5 Gaussian blur with reflected borders.
pub fn gaussian_blur_5x5(img: &GrayImage) -> GrayImage {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return img.clone();
    }

    // Horizontal pass keeps the x16 scale to avoid rounding twice.
    let mut horizontal = vec![0u32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, weight) in GAUSSIAN_5.iter().enumerate() {
                let sx = reflect_101(x + k as i64 - 2, w) as u32;
                acc += weight * img.get_pixel(sx, y as u32).0[0] as u32;
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, weight) in GAUSSIAN_5.iter().enumerate() {
                let sy = reflect_101(y + k as i64 - 2, h);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out.put_pixel(x as u32, y as u32, Luma([((acc + 128) / 256) as u8]));
        }
    }
    out
}

/// Polygon area via the shoelace formula. Orientation-independent.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice_area as f64 / 2.0).abs()
}

fn is_external(contour: &Contour<i32>) -> bool {
    contour.parent.is_none() && matches!(contour.border_type, BorderType::Outer)
}

/// Area of the largest external contour in a binary edge map.
pub fn largest_external_area(edges: &GrayImage) -> Result<f64, GeometryError> {
    let contours = find_contours::<i32>(edges);
    let areas: Vec<f64> = contours
        .iter()
        .filter(|c| is_external(c))
        .map(|c| contour_area(&c.points))
        .collect();

    debug!(
        contours = contours.len(),
        external = areas.len(),
        "Extracted document contours"
    );

    let largest = areas
        .into_iter()
        .fold(None, |best: Option<f64>, area| match best {
            Some(b) if b >= area => Some(b),
            _ => Some(area),
        })
        .ok_or(GeometryError::NoContours)?;

    if largest <= 0.0 {
        return Err(GeometryError::ZeroArea);
    }
    Ok(largest)
}

/// Binary edge map of the page outline after blur, Canny and gap closing.
pub fn document_edges(gray: &GrayImage, canny_low: f32, canny_high: f32) -> GrayImage {
    let blurred = gaussian_blur_5x5(gray);
    let edges = canny(&blurred, canny_low, canny_high);
    dilate(&edges, Norm::LInf, 1)
}

/// Fraction of the frame enclosed by the largest outer contour.
pub fn document_area_ratio(
    gray: &GrayImage,
    canny_low: f32,
    canny_high: f32,
) -> Result<f64, GeometryError> {
    let (w, h) = gray.dimensions();
    if w < MIN_FRAMING_DIMENSION || h < MIN_FRAMING_DIMENSION {
        return Err(GeometryError::TooSmall);
    }

    let edges = document_edges(gray, canny_low, canny_high);
    let area = largest_external_area(&edges)?;
    Ok(area / (w as f64 * h as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Light page with ruled "text" lines on a dark desk.
    fn page_on_desk(size: u32, page: (u32, u32, u32, u32)) -> GrayImage {
        let (x0, y0, x1, y1) = page;
        let mut img = GrayImage::from_pixel(size, size, Luma([30]));
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([225]));
            }
        }
        for y in (y0 + 10..y1.saturating_sub(10)).step_by(8) {
            for x in x0 + 10..x1 - 10 {
                img.put_pixel(x, y, Luma([30]));
                img.put_pixel(x, y + 1, Luma([30]));
            }
        }
        img
    }

    #[test]
    fn blur_keeps_flat_regions() {
        let img = GrayImage::from_pixel(20, 12, Luma([77]));
        let blurred = gaussian_blur_5x5(&img);
        assert_eq!(blurred.dimensions(), (20, 12));
        assert!(blurred.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn blur_spreads_a_spike() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([255]));
        let blurred = gaussian_blur_5x5(&img);

        // Centre weight is 36/256.
        assert_eq!(blurred.get_pixel(4, 4).0[0], 36);
        assert!(blurred.get_pixel(3, 4).0[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn shoelace_area_of_rectangle() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 5),
            Point::new(0, 5),
        ];
        assert_eq!(contour_area(&square), 50.0);

        let reversed: Vec<Point<i32>> = square.iter().rev().cloned().collect();
        assert_eq!(contour_area(&reversed), 50.0);
    }

    #[test]
    fn degenerate_polygons_have_no_area() {
        assert_eq!(contour_area(&[]), 0.0);
        assert_eq!(contour_area(&[Point::new(1, 1), Point::new(4, 4)]), 0.0);
        let line = [Point::new(0, 0), Point::new(5, 0), Point::new(9, 0)];
        assert_eq!(contour_area(&line), 0.0);
    }

    #[test]
    fn filled_block_is_measured() {
        let mut edges = GrayImage::new(50, 50);
        for y in 10..30 {
            for x in 5..45 {
                edges.put_pixel(x, y, Luma([255]));
            }
        }
        let area = largest_external_area(&edges).unwrap();
        // Contour runs through the outermost pixel centres: 39 x 19.
        assert!((area - 741.0).abs() < 1.0, "area was {area}");
    }

    #[test]
    fn inner_contours_are_ignored() {
        // Hollow frame with a block inside: the block lives in the frame's hole.
        let mut edges = GrayImage::new(60, 60);
        for y in 5..55 {
            for x in 5..55 {
                let on_border = x < 8 || x >= 52 || y < 8 || y >= 52;
                if on_border {
                    edges.put_pixel(x, y, Luma([255]));
                }
            }
        }
        for y in 20..40 {
            for x in 20..40 {
                edges.put_pixel(x, y, Luma([255]));
            }
        }

        let contours = find_contours::<i32>(&edges);
        let external = contours.iter().filter(|c| is_external(c)).count();
        assert_eq!(external, 1);
        let area = largest_external_area(&edges).unwrap();
        assert!(area > 2000.0, "area was {area}");
    }

    #[test]
    fn empty_edge_map_has_no_contours() {
        let edges = GrayImage::new(40, 40);
        assert_eq!(largest_external_area(&edges), Err(GeometryError::NoContours));
    }

    #[test]
    fn full_page_covers_most_of_frame() {
        let img = page_on_desk(200, (20, 20, 180, 180));
        let ratio = document_area_ratio(&img, 75.0, 200.0).unwrap();
        assert!(ratio > 0.55 && ratio < 0.8, "ratio was {ratio}");
    }

    #[test]
    fn small_page_covers_a_tenth() {
        let img = page_on_desk(200, (70, 70, 133, 133));
        let ratio = document_area_ratio(&img, 75.0, 200.0).unwrap();
        assert!(ratio > 0.05 && ratio < 0.2, "ratio was {ratio}");
    }

    #[test]
    fn blank_capture_has_no_outline() {
        let img = GrayImage::from_pixel(120, 90, Luma([200]));
        assert_eq!(
            document_area_ratio(&img, 75.0, 200.0),
            Err(GeometryError::NoContours)
        );
    }

    #[test]
    fn tiny_image_is_rejected_before_canny() {
        let img = GrayImage::from_pixel(2, 40, Luma([10]));
        assert_eq!(
            document_area_ratio(&img, 75.0, 200.0),
            Err(GeometryError::TooSmall)
        );
    }
}
