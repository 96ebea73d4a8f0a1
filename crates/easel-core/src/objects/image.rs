//! Raster or vector image reference.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use kurbo::Rect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    /// URL or data URL of the image.
    pub source: String,
    pub width: f64,
    pub height: f64,
}

impl ImageGeometry {
    pub fn new(source: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            source: source.into(),
            width,
            height,
        }
    }

    /// Build an image from raw bytes, embedding them as a base64 data URL.
    pub fn from_bytes(data: &[u8], mime: &str, width: f64, height: f64) -> Self {
        Self::new(
            format!("data:{};base64,{}", mime, BASE64.encode(data)),
            width,
            height,
        )
    }

    /// Decode the payload of a base64 data URL source.
    pub fn data(&self) -> Option<Vec<u8>> {
        let rest = self.source.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        if !meta.ends_with(";base64") {
            return None;
        }
        BASE64.decode(payload).ok()
    }

    pub fn local_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_round_trip() {
        let image = ImageGeometry::from_bytes(b"\x89PNG", "image/png", 4.0, 4.0);
        assert!(image.source.starts_with("data:image/png;base64,"));
        assert_eq!(image.data().unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_remote_source_has_no_data() {
        let image = ImageGeometry::new("https://example.com/a.png", 10.0, 10.0);
        assert!(image.data().is_none());
        assert_eq!(image.local_bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }
}
