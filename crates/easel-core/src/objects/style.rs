//! Paint and style properties for drawable objects.

use peniko::Color;
use peniko::color::{Srgb, parse_color};
use serde::{Deserialize, Serialize};

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// CSS hex notation (`#rrggbb`, or `#rrggbbaa` when not fully opaque).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// How a fill or stroke is painted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Paint {
    /// Nothing is painted.
    #[default]
    None,
    /// A solid color.
    Color(SerializableColor),
    /// A value kept verbatim: `url(#gradient)`, `currentColor`, or anything
    /// the color parser does not understand.
    Reference(String),
}

impl Paint {
    /// Parse an SVG/CSS paint value.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Paint::None;
        }
        if value.starts_with("url(")
            || value.eq_ignore_ascii_case("currentcolor")
            || value.eq_ignore_ascii_case("inherit")
        {
            return Paint::Reference(value.to_string());
        }
        match parse_color(value) {
            Ok(color) => Paint::Color(color.to_alpha_color::<Srgb>().into()),
            Err(_) => Paint::Reference(value.to_string()),
        }
    }

    pub fn solid(color: SerializableColor) -> Self {
        Paint::Color(color)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Paint::None)
    }

    /// The solid color, if this paint is one.
    pub fn color(&self) -> Option<Color> {
        match self {
            Paint::Color(c) => Some((*c).into()),
            _ => None,
        }
    }

    /// Value suitable for an SVG presentation attribute.
    pub fn to_svg_value(&self) -> String {
        match self {
            Paint::None => "none".to_string(),
            Paint::Color(c) => c.to_hex(),
            Paint::Reference(r) => r.clone(),
        }
    }
}

/// Style properties shared by every drawable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Interior paint.
    #[serde(default = "default_fill")]
    pub fill: Paint,
    /// Outline paint.
    #[serde(default)]
    pub stroke: Paint,
    /// Outline width in local units.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_fill() -> Paint {
    Paint::Color(SerializableColor::black())
}

fn default_stroke_width() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: default_fill(),
            stroke: Paint::None,
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
            visible: true,
        }
    }
}

impl Style {
    /// A stroke-only style.
    pub fn outline(color: SerializableColor, width: f64) -> Self {
        Self {
            fill: Paint::None,
            stroke: Paint::Color(color),
            stroke_width: width,
            ..Self::default()
        }
    }

    /// Fill color with opacity applied.
    pub fn fill_with_opacity(&self) -> Option<Color> {
        self.fill.color().map(|color| {
            let rgba = color.to_rgba8();
            let alpha = (rgba.a as f64 * self.opacity.clamp(0.0, 1.0)) as u8;
            Color::from_rgba8(rgba.r, rgba.g, rgba.b, alpha)
        })
    }

    /// Whether anything about this style is painted at all.
    pub fn is_painted(&self) -> bool {
        self.visible && self.opacity > 0.0 && !(self.fill.is_none() && self.stroke.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_named_colors() {
        assert_eq!(
            Paint::parse("#ff0000"),
            Paint::Color(SerializableColor::new(255, 0, 0, 255))
        );
        assert_eq!(
            Paint::parse("blue"),
            Paint::Color(SerializableColor::new(0, 0, 255, 255))
        );
        assert_eq!(Paint::parse(" none "), Paint::None);
    }

    #[test]
    fn test_references_are_kept_verbatim() {
        assert_eq!(
            Paint::parse("url(#grad1)"),
            Paint::Reference("url(#grad1)".to_string())
        );
        assert_eq!(
            Paint::parse("not-a-color"),
            Paint::Reference("not-a-color".to_string())
        );
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(SerializableColor::new(255, 128, 0, 255).to_hex(), "#ff8000");
        assert_eq!(SerializableColor::new(0, 0, 0, 0).to_hex(), "#00000000");
    }

    #[test]
    fn test_fill_with_opacity() {
        let style = Style {
            opacity: 0.5,
            ..Style::default()
        };
        let color = style.fill_with_opacity().unwrap();
        assert_eq!(color.to_rgba8().a, 127);
    }

    #[test]
    fn test_is_painted() {
        assert!(Style::default().is_painted());
        let hidden = Style {
            visible: false,
            ..Style::default()
        };
        assert!(!hidden.is_painted());
        let empty = Style {
            fill: Paint::None,
            ..Style::default()
        };
        assert!(!empty.is_painted());
    }
}
