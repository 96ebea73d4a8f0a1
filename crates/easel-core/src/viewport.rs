//! Viewport pan/zoom transform.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Fraction of the visible area the workspace fills after fitting.
pub const DEFAULT_ZOOM_RATIO: f64 = 0.85;

/// Viewport manages the view transform for the editor surface.
///
/// It converts between screen coordinates and world (document) coordinates,
/// and is captured alongside every history snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current translation offset (pan)
    pub offset: Vec2,
    /// Current zoom level (1.0 = 100%)
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.02,
            max_zoom: 20.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// World-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen-to-world transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// The transform as six affine coefficients, as stored in snapshots.
    pub fn to_coeffs(&self) -> [f64; 6] {
        self.transform().as_coeffs()
    }

    /// Restore from six affine coefficients. Only uniform scale and
    /// translation are representable; anything else is approximated.
    pub fn set_coeffs(&mut self, coeffs: [f64; 6]) {
        let [a, b, _, _, e, f] = coeffs;
        let zoom = a.hypot(b);
        if !zoom.is_finite() || zoom <= 0.0 || !e.is_finite() || !f.is_finite() {
            log::warn!("Ignoring invalid viewport transform {:?}", coeffs);
            return;
        }
        self.zoom = zoom;
        self.offset = Vec2::new(e, f);
    }

    pub fn set_transform(&mut self, transform: Affine) {
        self.set_coeffs(transform.as_coeffs());
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        let new_screen = self.world_to_screen(world_point);
        self.offset += Vec2::new(screen_point.x - new_screen.x, screen_point.y - new_screen.y);
    }

    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Scale and center so `workspace` fills `ratio` of the visible `area`.
    pub fn fit_workspace(&mut self, workspace: Rect, area: Size, ratio: f64) {
        if workspace.is_zero_area() || area.is_zero_area() {
            self.reset();
            return;
        }
        let scale = (area.width / workspace.width()).min(area.height / workspace.height());
        self.zoom = (scale * ratio).clamp(self.min_zoom, self.max_zoom);

        let center = workspace.center();
        self.offset = Vec2::new(
            area.width / 2.0 - center.x * self.zoom,
            area.height / 2.0 - center.y * self.zoom,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::new();
        assert_eq!(viewport.offset, Vec2::ZERO);
        assert_eq!(viewport.to_coeffs(), [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(30.0, -20.0);
        viewport.zoom = 2.5;
        let world = Point::new(123.0, 456.0);
        let back = viewport.screen_to_world(viewport.world_to_screen(world));
        assert!((back.x - world.x).abs() < 1e-9);
        assert!((back.y - world.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut viewport = Viewport::new();
        let anchor = Point::new(200.0, 100.0);
        let world = viewport.screen_to_world(anchor);
        viewport.zoom_at(anchor, 2.0);
        let screen = viewport.world_to_screen(world);
        assert!((screen.x - anchor.x).abs() < 1e-9);
        assert!((screen.y - anchor.y).abs() < 1e-9);
    }

    #[test]
    fn test_coeffs_round_trip() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(12.0, 34.0);
        viewport.zoom = 0.75;
        let mut restored = Viewport::new();
        restored.set_coeffs(viewport.to_coeffs());
        assert_eq!(restored, viewport);
    }

    #[test]
    fn test_invalid_coeffs_are_ignored() {
        let mut viewport = Viewport::new();
        viewport.set_coeffs([0.0, 0.0, 0.0, 0.0, 5.0, 5.0]);
        assert_eq!(viewport, Viewport::new());
    }

    #[test]
    fn test_fit_workspace() {
        let mut viewport = Viewport::new();
        let workspace = Rect::new(0.0, 0.0, 900.0, 1200.0);
        viewport.fit_workspace(workspace, Size::new(1000.0, 1000.0), DEFAULT_ZOOM_RATIO);
        assert!((viewport.zoom - 1000.0 / 1200.0 * 0.85).abs() < 1e-9);
        let center = viewport.world_to_screen(workspace.center());
        assert!((center.x - 500.0).abs() < 1e-9);
        assert!((center.y - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_into_empty_area_resets() {
        let mut viewport = Viewport::new();
        viewport.pan(Vec2::new(10.0, 10.0));
        viewport.fit_workspace(Rect::new(0.0, 0.0, 900.0, 1200.0), Size::new(0.0, 500.0), DEFAULT_ZOOM_RATIO);
        assert_eq!(viewport, Viewport::new());
    }
}
