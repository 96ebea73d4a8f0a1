//! Placement of an object relative to its own local geometry.

use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Object placement: position, non-uniform scale, rotation in degrees and a
/// pivot expressed as fractions of the local bounds.
///
/// The world affine is `T(x, y) · R(angle) · S(scale_x, scale_y) · T(-origin)`,
/// so `(x, y)` is where the pivot lands in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Rotation in degrees, clockwise in a y-down coordinate system.
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Transform {
    /// Identity transform placed at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Pivot in local coordinates.
    pub fn origin_point(&self, local: Rect) -> Point {
        Point::new(
            local.x0 + self.origin_x * local.width(),
            local.y0 + self.origin_y * local.height(),
        )
    }

    /// Rotation and scale without translation.
    pub fn linear(&self) -> Affine {
        Affine::rotate(self.angle.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Local-to-world affine for geometry whose local bounds are `local`.
    pub fn to_affine(&self, local: Rect) -> Affine {
        let origin = self.origin_point(local);
        Affine::translate((self.x, self.y)) * self.linear() * Affine::translate(-origin.to_vec2())
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    pub fn is_finite(&self) -> bool {
        [
            self.x,
            self.y,
            self.scale_x,
            self.scale_y,
            self.angle,
            self.origin_x,
            self.origin_y,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Re-express this transform for new local bounds so that geometry keeps
    /// its world placement.
    ///
    /// The pivot fractions are kept; only the position moves by the linear
    /// image of the pivot shift.
    pub fn rebase(&self, old_local: Rect, new_local: Rect) -> Transform {
        let shift = self.origin_point(new_local) - self.origin_point(old_local);
        let moved = self.linear() * Point::new(shift.x, shift.y);
        Transform {
            x: self.x + moved.x,
            y: self.y + moved.y,
            ..*self
        }
    }

    /// Decompose an affine into a transform with the given pivot fractions.
    ///
    /// Translation, rotation and scale are recovered exactly; skew has no
    /// representation and is dropped.
    pub fn from_affine(affine: Affine, local: Rect, origin_x: f64, origin_y: f64) -> Transform {
        let [a, b, c, d, _, _] = affine.as_coeffs();
        let scale_x = a.hypot(b);
        let (angle, scale_y) = if scale_x > f64::EPSILON {
            (b.atan2(a).to_degrees(), (a * d - b * c) / scale_x)
        } else {
            (0.0, c.hypot(d))
        };
        if scale_x > f64::EPSILON && (a * c + b * d).abs() > 1e-9 * scale_x.max(1.0) {
            log::debug!("Dropping skew while decomposing affine {:?}", affine.as_coeffs());
        }

        let mut transform = Transform {
            x: 0.0,
            y: 0.0,
            scale_x,
            scale_y,
            angle,
            origin_x,
            origin_y,
        };
        let pivot = affine * transform.origin_point(local);
        transform.x = pivot.x;
        transform.y = pivot.y;
        transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_identity_at_position() {
        let t = Transform::at(10.0, 20.0);
        let p = t.to_affine(Rect::new(0.0, 0.0, 5.0, 5.0)) * Point::new(1.0, 1.0);
        assert_close(p.x, 11.0);
        assert_close(p.y, 21.0);
    }

    #[test]
    fn test_centered_origin_rotation() {
        let t = Transform {
            x: 50.0,
            y: 50.0,
            angle: 90.0,
            origin_x: 0.5,
            origin_y: 0.5,
            ..Transform::default()
        };
        let local = Rect::new(0.0, 0.0, 20.0, 10.0);
        let affine = t.to_affine(local);
        // The pivot maps onto (x, y).
        let center = affine * Point::new(10.0, 5.0);
        assert_close(center.x, 50.0);
        assert_close(center.y, 50.0);
        let corner = affine * Point::new(20.0, 5.0);
        assert_close(corner.x, 50.0);
        assert_close(corner.y, 60.0);
    }

    #[test]
    fn test_rebase_keeps_world_placement() {
        let t = Transform {
            x: 100.0,
            y: 40.0,
            scale_x: 2.0,
            scale_y: 0.5,
            angle: 30.0,
            origin_x: 0.5,
            origin_y: 0.5,
        };
        let old_local = Rect::new(0.0, 0.0, 100.0, 100.0);
        let new_local = Rect::new(10.0, 20.0, 40.0, 60.0);
        let rebased = t.rebase(old_local, new_local);
        let p = Point::new(25.0, 33.0);
        let before = t.to_affine(old_local) * p;
        let after = rebased.to_affine(new_local) * p;
        assert_close(before.x, after.x);
        assert_close(before.y, after.y);
    }

    #[test]
    fn test_from_affine_round_trip() {
        let t = Transform {
            x: -12.0,
            y: 7.5,
            scale_x: 1.5,
            scale_y: 3.0,
            angle: -45.0,
            origin_x: 0.25,
            origin_y: 1.0,
        };
        let local = Rect::new(0.0, 0.0, 40.0, 20.0);
        let recovered = Transform::from_affine(t.to_affine(local), local, 0.25, 1.0);
        assert_close(recovered.x, t.x);
        assert_close(recovered.y, t.y);
        assert_close(recovered.scale_x, t.scale_x);
        assert_close(recovered.scale_y, t.scale_y);
        assert_close(recovered.angle, t.angle);
    }

    #[test]
    fn test_from_affine_with_mirror() {
        let affine = Affine::scale_non_uniform(1.0, -2.0);
        let local = Rect::new(0.0, 0.0, 10.0, 10.0);
        let t = Transform::from_affine(affine, local, 0.0, 0.0);
        assert_close(t.scale_x, 1.0);
        assert_close(t.scale_y, -2.0);
        let p = t.to_affine(local) * Point::new(3.0, 4.0);
        assert_close(p.x, 3.0);
        assert_close(p.y, -8.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(Transform::default().is_finite());
        let bad = Transform {
            x: f64::NAN,
            ..Transform::default()
        };
        assert!(!bad.is_finite());
    }
}
