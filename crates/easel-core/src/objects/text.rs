//! Text geometry.

use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Default font stack applied to text without one.
pub const DEFAULT_FONT_FAMILY: &str = "Arial, sans-serif";
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Line height as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.16;
/// Average glyph advance as a multiple of the font size.
const CHAR_WIDTH: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGeometry {
    pub content: String,
    #[serde(default = "default_family")]
    pub font_family: String,
    #[serde(default = "default_size")]
    pub font_size: f64,
    #[serde(default)]
    pub font_weight: Option<String>,
    #[serde(default)]
    pub text_anchor: Option<String>,
}

fn default_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_size() -> f64 {
    DEFAULT_FONT_SIZE
}

impl TextGeometry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font_family: default_family(),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: None,
            text_anchor: None,
        }
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Approximate layout box. Without a font database the width is estimated
    /// from the longest line.
    pub fn local_bounds(&self) -> Rect {
        let lines: Vec<&str> = self.content.lines().collect();
        let line_count = lines.len().max(1) as f64;
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f64;
        Rect::new(
            0.0,
            0.0,
            widest * self.font_size * CHAR_WIDTH,
            line_count * self.font_size * LINE_HEIGHT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_grow_with_content() {
        let short = TextGeometry::new("ab");
        let long = TextGeometry::new("abcdef");
        assert!(long.local_bounds().width() > short.local_bounds().width());
    }

    #[test]
    fn test_multiline_height() {
        let text = TextGeometry::new("one\ntwo").with_font_size(10.0);
        assert!((text.local_bounds().height() - 23.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_has_one_line() {
        let text = TextGeometry::new("");
        assert_eq!(text.local_bounds().width(), 0.0);
        assert!(text.local_bounds().height() > 0.0);
    }
}
