use crate::error::{PrintError, PrintResult};
use crate::font::FontHandle;
use crate::protocol::PRINT_WIDTH;

/// Geometry for wrapping and composing text.
///
/// - `font_size`: glyph pixel size
/// - `target_width`: canvas width, must equal the printer raster width
/// - `padding`: margin on all four sides
/// - `line_spacing`: vertical gap between lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapConfig {
    pub font_size: u32,
    pub target_width: u32,
    pub padding: u32,
    pub line_spacing: u32,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self { font_size: 16, target_width: PRINT_WIDTH, padding: 10, line_spacing: 5 }
    }
}

impl WrapConfig {
    pub fn with_font_size(size: u32) -> Self {
        Self { font_size: size, ..Self::default() }
    }

    /// Horizontal pixel budget for wrapped lines.
    /// Fails fast when padding leaves no room for text.
    pub fn available_width(&self) -> PrintResult<u32> {
        if self.font_size == 0 || self.target_width == 0 {
            return Err(PrintError::InvalidConfig(
                "font size and target width must be > 0".into(),
            ));
        }
        let available = self.target_width as i64 - 2 * self.padding as i64;
        if available <= 0 {
            return Err(PrintError::InvalidConfig(format!(
                "padding {} leaves no text area at width {}",
                self.padding, self.target_width
            )));
        }
        Ok(available as u32)
    }
}

/// Greedily wraps one line of text into pieces that fit the pixel budget.
///
/// Tokens are never split: a single token wider than the budget occupies
/// its own line in full. The first token of a fresh line is always
/// accepted, even when it alone exceeds the budget.
///
/// - `line`: input line, no newlines
/// - `font`: font used for width measurement
/// - `available_width`: pixel budget per wrapped line
///
/// Returns the wrapped lines, in order
pub fn wrap_line(line: &str, font: &FontHandle, available_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    // split_whitespace never yields empty tokens, so runs of spaces
    // collapse instead of producing spurious zero-width measurements
    for word in line.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if font.measure_width(&candidate) <= available_width {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wraps a whole document, line by line.
///
/// Blank input lines are preserved as exactly one empty wrapped line so
/// the source's vertical spacing survives.
pub fn wrap_text(text: &str, font: &FontHandle, config: &WrapConfig) -> PrintResult<Vec<String>> {
    let available = config.available_width()?;
    let mut wrapped = Vec::new();
    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            wrapped.push(String::new());
        } else {
            wrapped.extend(wrap_line(raw_line, font, available));
        }
    }
    Ok(wrapped)
}
