use std::io::{self, BufRead, Write};
use std::path::Path;

use image::imageops::FilterType;
use image::{GrayImage, ImageError};
use tracing::info;

use crate::dithering::{binarize, Algorithm};
use crate::error::{PrintError, PrintResult};

/// A monochrome bit matrix ready for encoding.
///
/// Wraps a grayscale buffer in which every pixel is 0 (black) or
/// 255 (white).
#[derive(Debug)]
pub struct BinarizedImage {
    image: GrayImage,
}

impl BinarizedImage {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw grayscale buffer, row-major, 0 = black.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    /// Asserts the width invariant the encoder depends on.
    pub fn ensure_width(&self, expected: u32) -> PrintResult<()> {
        if self.width() != expected {
            return Err(PrintError::DimensionMismatch {
                expected,
                actual: self.width(),
            });
        }
        Ok(())
    }
}

/// Loads an image file and binarizes it at the printer raster width.
///
/// The image is converted to grayscale, resized to `target_width`
/// preserving aspect ratio, then reduced to black/white with the chosen
/// algorithm.
///
/// - `path`: image file to load
/// - `target_width`: printer raster width in pixels
/// - `algorithm`: binarization strategy
///
/// Returns the binarized image
pub fn acquire(path: &Path, target_width: u32, algorithm: Algorithm) -> PrintResult<BinarizedImage> {
    let img = image::open(path).map_err(|e| match e {
        ImageError::Unsupported(u) => PrintError::UnsupportedFormat(u.to_string()),
        other => PrintError::ImageLoad(other),
    })?;

    let gray = img.to_luma8();
    let (orig_w, orig_h) = gray.dimensions();
    let scale = target_width as f32 / orig_w as f32;
    let target_h = ((orig_h as f32) * scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(&gray, target_width, target_h, FilterType::Lanczos3);

    let bin = binarize(resized, algorithm);
    info!(width = bin.width(), height = bin.height(), ?algorithm, "binarized image");
    Ok(BinarizedImage::new(bin))
}

/// Renders the image to the terminal with half-block characters and asks
/// for confirmation. Interactive only.
///
/// Returns true when the user confirms printing
pub fn show_preview(img: &BinarizedImage) -> io::Result<bool> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_preview(img, &mut out)?;
    write!(out, "Print this image? [y/N]: ")?;
    out.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Writes a downsampled half-block rendering of the image.
/// One output row covers two pixel rows.
fn render_preview(img: &BinarizedImage, out: &mut impl Write) -> io::Result<()> {
    // keep the preview within a typical terminal
    let step = (img.width() / 96).max(1);
    let dark = |x: u32, y: u32| y < img.height() && img.get_pixel(x, y) == 0;

    let mut y = 0;
    while y < img.height() {
        let mut row = String::new();
        let mut x = 0;
        while x < img.width() {
            let top = dark(x, y);
            let bottom = dark(x, y + step);
            row.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
            x += step;
        }
        writeln!(out, "{}", row)?;
        y += 2 * step;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PRINT_WIDTH;
    use image::Luma;

    #[test]
    fn acquire_resizes_to_print_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        let img = GrayImage::from_fn(100, 60, |x, y| Luma([((x + y) % 256) as u8]));
        img.save(&path).unwrap();

        let bin = acquire(&path, PRINT_WIDTH, Algorithm::MeanThreshold).unwrap();
        assert_eq!(bin.width(), PRINT_WIDTH);
        // aspect preserved: 100x60 -> 384x230
        assert_eq!(bin.height(), 230);
        assert!(bin.as_raw().iter().all(|&p| p == 0 || p == 255));
        bin.ensure_width(PRINT_WIDTH).unwrap();
    }

    #[test]
    fn acquire_rejects_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = acquire(&path, PRINT_WIDTH, Algorithm::None).unwrap_err();
        assert!(matches!(
            err,
            PrintError::ImageLoad(_) | PrintError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn ensure_width_flags_mismatch() {
        let bin = BinarizedImage::new(GrayImage::from_pixel(200, 10, Luma([255])));
        let err = bin.ensure_width(PRINT_WIDTH).unwrap_err();
        assert!(matches!(
            err,
            PrintError::DimensionMismatch { expected: PRINT_WIDTH, actual: 200 }
        ));
    }

    #[test]
    fn preview_rendering_uses_blocks_for_ink() {
        let mut img = GrayImage::from_pixel(8, 4, Luma([255]));
        for x in 0..8 {
            img.put_pixel(x, 0, Luma([0]));
        }
        let bin = BinarizedImage::new(img);
        let mut buf = Vec::new();
        render_preview(&bin, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains('▀'));
    }
}
