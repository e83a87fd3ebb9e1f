use image::{GrayImage, Luma};
use tracing::debug;

use crate::error::PrintResult;
use crate::font::FontHandle;
use crate::wrap::{wrap_text, WrapConfig};

/// Smallest canvas the printer handles cleanly; a single short line is
/// padded up to this.
pub const MIN_CANVAS_HEIGHT: u32 = 50;

/// Lays wrapped lines out on a black-on-white canvas.
///
/// Per-line heights are measured independently so font fallback with
/// mixed glyph metrics still stacks correctly. Blank lines advance the
/// cursor by the font size without drawing.
///
/// - `lines`: wrapped lines, order significant
/// - `font`: font used for measurement and drawing
/// - `config`: canvas geometry
///
/// Returns the rendered image, exactly `config.target_width` wide
pub fn compose(lines: &[String], font: &FontHandle, config: &WrapConfig) -> GrayImage {
    let heights: Vec<u32> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                config.font_size
            } else {
                font.line_height(line)
            }
        })
        .collect();

    let text_height: u32 = heights.iter().sum::<u32>()
        + (lines.len().saturating_sub(1) as u32) * config.line_spacing;
    let canvas_height = (text_height + 2 * config.padding).max(MIN_CANVAS_HEIGHT);

    let mut canvas =
        GrayImage::from_pixel(config.target_width, canvas_height, Luma([255]));

    let mut y = config.padding;
    for (line, height) in lines.iter().zip(&heights) {
        if !line.trim().is_empty() {
            font.draw_line(&mut canvas, line, config.padding, y);
        }
        y += height + config.line_spacing;
    }

    debug!(width = config.target_width, height = canvas_height, lines = lines.len(), "composed canvas");
    canvas
}

/// Renders raw text to an image: wrap, then compose.
pub fn render_text(text: &str, font: &FontHandle, config: &WrapConfig) -> PrintResult<GrayImage> {
    let lines = wrap_text(text, font, config)?;
    Ok(compose(&lines, font, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_font() -> FontHandle {
        FontHandle::Builtin { size: 16 }
    }

    #[test]
    fn canvas_width_matches_target() {
        let font = test_font();
        let config = WrapConfig::default();
        let img = render_text("Hello world", &font, &config).unwrap();
        assert_eq!(img.width(), config.target_width);
    }

    #[test]
    fn single_line_is_floored_at_minimum_height() {
        let font = test_font();
        let config = WrapConfig::default();
        let img = render_text("hi", &font, &config).unwrap();
        assert!(img.height() >= MIN_CANVAS_HEIGHT);
    }

    #[test]
    fn height_grows_with_line_count() {
        let font = test_font();
        let config = WrapConfig::default();
        let mut last = 0;
        for n in [4, 8, 16] {
            let text = vec!["line of text"; n].join("\n");
            let img = render_text(&text, &font, &config).unwrap();
            assert!(img.height() > last, "height not monotone at {} lines", n);
            last = img.height();
        }
    }

    #[test]
    fn blank_lines_add_vertical_space() {
        let font = test_font();
        let config = WrapConfig::default();
        let dense = render_text(&"x\n".repeat(8), &font, &config).unwrap();
        let sparse = render_text(&"x\n\n".repeat(8), &font, &config).unwrap();
        assert!(sparse.height() > dense.height());
    }

    #[test]
    fn rendered_text_contains_black_pixels() {
        let font = test_font();
        let config = WrapConfig::default();
        let img = render_text("Hello world", &font, &config).unwrap();
        assert!(img.pixels().any(|p| p[0] == 0));
        // padding row stays white
        assert!((0..img.width()).all(|x| img.get_pixel(x, 0)[0] == 255));
    }
}
