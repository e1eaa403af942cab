//! Edge map and edge-density metric.
//!
//! Everything here is pure: a captured frame plus a threshold pair in, an edge
//! map or a density out. The calibrator and the trigger loop share it.

use image::{GrayImage, Rgb, RgbImage, RgbaImage};
use imageproc::edges::canny;

use crate::region::ThresholdPair;

/// A captured frame with its grayscale copy and Canny edge map.
#[derive(Debug, Clone)]
pub struct EdgeFrame {
    pub raw: RgbImage,
    pub edges: GrayImage,
    pub density: f64,
}

impl EdgeFrame {
    pub fn from_capture(capture: &RgbaImage, thresholds: ThresholdPair) -> Self {
        let raw = rgba_to_rgb(capture);
        let gray = image::imageops::grayscale(&raw);
        let edges = edge_map(&gray, thresholds);
        let density = density_of(&edges);
        Self {
            raw,
            edges,
            density,
        }
    }

    pub fn percent(&self) -> f64 {
        self.density * 100.0
    }
}

/// Binary edge map: every pixel is either 0 or 255.
pub fn edge_map(gray: &GrayImage, thresholds: ThresholdPair) -> GrayImage {
    let (lo, hi) = thresholds.ordered();
    canny(gray, lo, hi)
}

/// Fraction of pixels classified as edges after running Canny on `gray`.
pub fn edge_density(gray: &GrayImage, thresholds: ThresholdPair) -> f64 {
    density_of(&edge_map(gray, thresholds))
}

/// Fraction of non-zero pixels in an edge map.
pub fn density_of(edges: &GrayImage) -> f64 {
    let total = u64::from(edges.width()) * u64::from(edges.height());
    if total == 0 {
        return 0.0;
    }
    let hits = edges.pixels().filter(|p| p.0[0] > 0).count() as u64;
    hits as f64 / total as f64
}

/// Grey edge map expanded to RGB for the preview.
pub fn edges_to_rgb(edges: &GrayImage) -> RgbImage {
    RgbImage::from_fn(edges.width(), edges.height(), |x, y| {
        let v = edges.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

fn rgba_to_rgb(src: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(src.width(), src.height(), |x, y| {
        let p = src.get_pixel(x, y).0;
        Rgb([p[0], p[1], p[2]])
    })
}
