//! Post-processing that turns a photographic render into black-on-white line art.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, imageops};
use tracing::{debug, warn};

/// Default binarization level; darker pixels become ink.
pub const DEFAULT_THRESHOLD: u8 = 185;

/// Laplacian-style 3x3 edge kernel.
const FIND_EDGES_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Converts a generated image to a high-contrast forensic sketch.
///
/// Chain: grayscale, autocontrast, edge detection, invert, threshold,
/// autocontrast, back to RGB. Images too small for the edge kernel are
/// returned unchanged.
pub fn convert_to_sketch(image: &DynamicImage, threshold: u8) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        warn!(
            "Sketch post-processing skipped: {}x{} image is smaller than the edge kernel",
            width, height
        );
        return image.clone();
    }

    let mut gray = image.to_luma8();
    autocontrast(&mut gray);

    let mut edges: GrayImage = imageops::filter3x3(&gray, &FIND_EDGES_KERNEL);
    imageops::invert(&mut edges);
    apply_threshold(&mut edges, threshold);
    autocontrast(&mut edges);

    debug!("Converted {}x{} image to line art (threshold {})", width, height, threshold);
    DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(edges).to_rgb8())
}

/// Stretches the histogram so the darkest level maps to 0 and the brightest to 255.
/// A single-level image is left as is.
pub fn autocontrast(image: &mut GrayImage) {
    let (lo, hi) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), Luma([v])| (lo.min(*v), hi.max(*v)));
    if hi <= lo {
        return;
    }

    let range = u32::from(hi - lo);
    for Luma([v]) in image.pixels_mut() {
        // Truncating division, as PIL's lookup table does.
        let stretched = u32::from(*v - lo) * 255 / range;
        *v = stretched.min(255) as u8;
    }
}

/// Maps every pixel below `threshold` to 0 and the rest to 255.
pub fn apply_threshold(image: &mut GrayImage, threshold: u8) {
    for Luma([v]) in image.pixels_mut() {
        *v = if *v < threshold { 0 } else { 255 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 200 + 20) as u8;
            Rgb([v, v / 2, 255 - v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_autocontrast_stretches_range() {
        let mut img = GrayImage::from_raw(3, 1, vec![50, 100, 150]).unwrap();
        autocontrast(&mut img);
        assert_eq!(img.as_raw(), &vec![0, 127, 255]);
    }

    #[test]
    fn test_autocontrast_truncates_fractional_levels() {
        // 255 * (v - 10) / 3 for v in 10..=13
        let mut img = GrayImage::from_raw(4, 1, vec![10, 11, 12, 13]).unwrap();
        autocontrast(&mut img);
        assert_eq!(img.as_raw(), &vec![0, 85, 170, 255]);

        let mut img = GrayImage::from_raw(3, 1, vec![0, 4, 7]).unwrap();
        autocontrast(&mut img);
        assert_eq!(img.as_raw(), &vec![0, 145, 255]);
    }

    #[test]
    fn test_autocontrast_leaves_flat_image() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([77]));
        autocontrast(&mut img);
        assert!(img.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn test_threshold_is_idempotent_on_binarized_image() {
        let mut binary = GrayImage::from_fn(16, 16, |x, y| {
            if (x + y) % 3 == 0 { Luma([0]) } else { Luma([255]) }
        });
        autocontrast(&mut binary);
        apply_threshold(&mut binary, DEFAULT_THRESHOLD);
        let once = binary.clone();

        autocontrast(&mut binary);
        apply_threshold(&mut binary, DEFAULT_THRESHOLD);
        assert_eq!(once, binary);
    }

    #[test]
    fn test_sketch_output_is_black_and_white_rgb() {
        let sketch = convert_to_sketch(&gradient(32, 24), DEFAULT_THRESHOLD);
        assert_eq!(sketch.dimensions(), (32, 24));

        let rgb = sketch.as_rgb8().expect("sketch must be RGB8");
        for Rgb([r, g, b]) in rgb.pixels() {
            assert!(*r == 0 || *r == 255);
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn test_sketch_reapplication_is_stable() {
        let sketch = convert_to_sketch(&gradient(20, 20), DEFAULT_THRESHOLD);
        let mut gray = sketch.to_luma8();
        let before = gray.clone();
        autocontrast(&mut gray);
        apply_threshold(&mut gray, DEFAULT_THRESHOLD);
        assert_eq!(before, gray);
    }

    #[test]
    fn test_flat_image_becomes_blank_paper() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([90, 90, 90])));
        let sketch = convert_to_sketch(&flat, DEFAULT_THRESHOLD);
        assert!(sketch.to_luma8().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_tiny_image_is_returned_unchanged() {
        let tiny = gradient(2, 2);
        let out = convert_to_sketch(&tiny, DEFAULT_THRESHOLD);
        assert_eq!(out.as_bytes(), tiny.as_bytes());
    }
}
