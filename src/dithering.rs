use clap::ValueEnum;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;

/// Binarization strategy applied before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Threshold at the image's mean intensity
    #[value(name = "mean-threshold")]
    MeanThreshold,
    /// Floyd-Steinberg error diffusion
    #[value(name = "floyd-steinberg")]
    FloydSteinberg,
    /// Atkinson error diffusion
    Atkinson,
    /// Circle-cell halftone
    Halftone,
    /// Fixed mid-gray threshold, for inputs that are already binary
    None,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::FloydSteinberg
    }
}

/// Reduces a grayscale image to pure black/white with the chosen algorithm.
///
/// Every output pixel is 0 or 255.
pub fn binarize(mut gray: GrayImage, algorithm: Algorithm) -> GrayImage {
    match algorithm {
        Algorithm::MeanThreshold => {
            let cutoff = mean_intensity(&gray);
            threshold(&mut gray, cutoff);
        }
        Algorithm::FloydSteinberg => {
            image::imageops::dither(&mut gray, &image::imageops::BiLevel);
        }
        Algorithm::Atkinson => {
            atkinson_dither(&mut gray);
        }
        Algorithm::Halftone => {
            gray = halftone_dither(&gray);
        }
        Algorithm::None => {
            threshold(&mut gray, 127);
        }
    }
    gray
}

fn mean_intensity(img: &GrayImage) -> u8 {
    let raw = img.as_raw();
    if raw.is_empty() {
        return 127;
    }
    let sum: u64 = raw.iter().map(|&p| p as u64).sum();
    (sum / raw.len() as u64) as u8
}

fn threshold(img: &mut GrayImage, cutoff: u8) {
    for pixel in img.pixels_mut() {
        pixel[0] = if pixel[0] > cutoff { 255 } else { 0 };
    }
}

/// Applies Atkinson dithering to a grayscale image buffer in-place.
///
/// Three-quarters of the quantization error is diffused over six
/// neighbors, one eighth each.
pub fn atkinson_dither(img: &mut GrayImage) {
    let (width, height) = img.dimensions();
    let raw = img.as_mut();
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let old_pixel = raw[idx];
            let new_pixel = if old_pixel > 127 { 255 } else { 0 };
            raw[idx] = new_pixel;
            let error = old_pixel as i16 - new_pixel as i16;

            let mut spread = |dx: i32, dy: i32| {
                let (nx, ny) = (x as i32 + dx, y as i32 + dy);
                if nx >= 0 && nx < width as i32 && ny >= 0 && ny < height as i32 {
                    let idx = (ny as u32 * width + nx as u32) as usize;
                    let new_val = raw[idx] as i16 + error / 8;
                    raw[idx] = new_val.clamp(0, 255) as u8;
                }
            };

            spread(1, 0);
            spread(2, 0);
            spread(-1, 1);
            spread(0, 1);
            spread(1, 1);
            spread(0, 2);
        }
    }
}

/// Applies halftone dithering to a grayscale image, returning a new image.
///
/// Each 4x4 cell becomes a filled circle whose radius tracks the cell's
/// darkness. Output width equals input width whenever the input width is
/// a multiple of the cell size.
pub fn halftone_dither(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let side = 4u32;
    let jump = 4u32;
    let alpha = 3.0f32;

    let height_output = side * ((height as f32 / jump as f32).ceil() as u32);
    let width_output = side * ((width as f32 / jump as f32).ceil() as u32);
    let mut canvas = GrayImage::from_pixel(width_output, height_output, Luma([255]));

    let mut y_output = 0;
    for y in (0..height).step_by(jump as usize) {
        let mut x_output = 0;
        for x in (0..width).step_by(jump as usize) {
            let mut sum = 0.0;
            let mut n = 0;
            for dy in 0..jump {
                for dx in 0..jump {
                    if x + dx < width && y + dy < height {
                        sum += img.get_pixel(x + dx, y + dy)[0] as f32;
                        n += 1;
                    }
                }
            }
            let avg = sum / n as f32;
            let intensity = 1.0 - avg / 255.0;
            let radius = (alpha * intensity * side as f32 / 2.0) as i32;

            if radius > 0 {
                let mut cell = GrayImage::from_pixel(side, side, Luma([255]));
                draw_filled_circle_mut(
                    &mut cell,
                    (side as i32 / 2, side as i32 / 2),
                    radius,
                    Luma([0]),
                );
                image::imageops::overlay(&mut canvas, &cell, x_output as i64, y_output as i64);
            }
            x_output += side;
        }
        y_output += side;
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width.max(1)) as u8])
        })
    }

    #[test]
    fn every_algorithm_yields_pure_black_and_white() {
        for algorithm in [
            Algorithm::MeanThreshold,
            Algorithm::FloydSteinberg,
            Algorithm::Atkinson,
            Algorithm::None,
        ] {
            let out = binarize(gradient(64, 32), algorithm);
            assert!(
                out.pixels().all(|p| p[0] == 0 || p[0] == 255),
                "{:?} left gray pixels",
                algorithm
            );
        }
    }

    #[test]
    fn mean_threshold_splits_a_gradient() {
        let out = binarize(gradient(64, 8), Algorithm::MeanThreshold);
        assert!(out.pixels().any(|p| p[0] == 0));
        assert!(out.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn halftone_preserves_width_at_cell_multiples() {
        let out = binarize(gradient(384, 40), Algorithm::Halftone);
        assert_eq!(out.width(), 384);
    }

    #[test]
    fn none_thresholds_midgray() {
        let mut img = GrayImage::from_pixel(4, 1, Luma([200]));
        img.put_pixel(0, 0, Luma([10]));
        let out = binarize(img, Algorithm::None);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }
}
