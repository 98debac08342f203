//! Pixel predicates over RGB regions
//!
//! Channel values are normalised to `0.0..=1.0` before comparison.

use image::{Rgb, RgbImage};

fn proportion(image: &RgbImage, predicate: impl Fn(f64) -> bool) -> f64 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let hits = raw.iter().filter(|&&v| predicate(f64::from(v) / 255.0)).count();
    hits as f64 / raw.len() as f64
}

/// More than `min_proportion` of channel values lie below `threshold`
pub fn is_black(image: &RgbImage, threshold: f64, min_proportion: f64) -> bool {
    proportion(image, |v| v < threshold) > min_proportion
}

/// More than `min_proportion` of channel values lie above `threshold`
pub fn is_white(image: &RgbImage, threshold: f64, min_proportion: f64) -> bool {
    proportion(image, |v| v > threshold) > min_proportion
}

/// Mean squared channel difference of two same-sized images, in `0.0..=1.0`.
///
/// Returns `None` when the sizes differ.
pub fn normalized_difference(a: &RgbImage, b: &RgbImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return None;
    }
    let sum: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = (f64::from(x) - f64::from(y)) / 255.0;
            d * d
        })
        .sum();
    Some(sum / a.as_raw().len() as f64)
}

/// Every channel of `pixel` within `tolerance` of `expected`
pub fn colour_matches(pixel: &Rgb<u8>, expected: [u8; 3], tolerance: u8) -> bool {
    pixel
        .0
        .iter()
        .zip(expected)
        .all(|(&actual, want)| actual.abs_diff(want) <= tolerance)
}
