//! Primitive vector shapes.

use kurbo::{BezPath, Ellipse, Point, Rect, RoundedRect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// Tolerance used when flattening curved primitives into bezier paths.
const PATH_TOLERANCE: f64 = 0.1;

/// Geometry of a primitive shape, in local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    /// Axis-aligned rectangle anchored at the local origin.
    Rect {
        width: f64,
        height: f64,
        #[serde(default)]
        corner_radius: f64,
    },
    /// Ellipse inscribed in `(0, 0, 2rx, 2ry)`.
    Ellipse { rx: f64, ry: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Polygon when `closed`, polyline otherwise.
    Polygon { points: Vec<Point>, closed: bool },
}

impl ShapeGeometry {
    pub fn rect(width: f64, height: f64) -> Self {
        ShapeGeometry::Rect {
            width,
            height,
            corner_radius: 0.0,
        }
    }

    pub fn local_bounds(&self) -> Rect {
        match self {
            ShapeGeometry::Rect { width, height, .. } => Rect::new(0.0, 0.0, *width, *height).abs(),
            ShapeGeometry::Ellipse { rx, ry } => Rect::new(0.0, 0.0, 2.0 * rx.abs(), 2.0 * ry.abs()),
            ShapeGeometry::Line { x1, y1, x2, y2 } => {
                Rect::from_points(Point::new(*x1, *y1), Point::new(*x2, *y2))
            }
            ShapeGeometry::Polygon { points, .. } => {
                let mut iter = points.iter();
                let Some(first) = iter.next() else {
                    return Rect::ZERO;
                };
                iter.fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
            }
        }
    }

    pub fn to_path(&self) -> BezPath {
        match self {
            ShapeGeometry::Rect {
                width,
                height,
                corner_radius,
            } => {
                let rect = Rect::new(0.0, 0.0, *width, *height).abs();
                if *corner_radius > 0.0 {
                    RoundedRect::from_rect(rect, *corner_radius).to_path(PATH_TOLERANCE)
                } else {
                    rect.to_path(PATH_TOLERANCE)
                }
            }
            ShapeGeometry::Ellipse { rx, ry } => {
                Ellipse::new(Point::new(*rx, *ry), (*rx, *ry), 0.0).to_path(PATH_TOLERANCE)
            }
            ShapeGeometry::Line { x1, y1, x2, y2 } => {
                let mut path = BezPath::new();
                path.move_to((*x1, *y1));
                path.line_to((*x2, *y2));
                path
            }
            ShapeGeometry::Polygon { points, closed } => {
                let mut path = BezPath::new();
                let mut iter = points.iter();
                if let Some(first) = iter.next() {
                    path.move_to(*first);
                    for p in iter {
                        path.line_to(*p);
                    }
                    if *closed {
                        path.close_path();
                    }
                }
                path
            }
        }
    }

    /// SVG element name used when exporting this shape.
    pub fn element_name(&self) -> &'static str {
        match self {
            ShapeGeometry::Rect { .. } => "rect",
            ShapeGeometry::Ellipse { .. } => "ellipse",
            ShapeGeometry::Line { .. } => "line",
            ShapeGeometry::Polygon { closed: true, .. } => "polygon",
            ShapeGeometry::Polygon { closed: false, .. } => "polyline",
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            ShapeGeometry::Rect {
                width,
                height,
                corner_radius,
            } => width.is_finite() && height.is_finite() && corner_radius.is_finite(),
            ShapeGeometry::Ellipse { rx, ry } => rx.is_finite() && ry.is_finite(),
            ShapeGeometry::Line { x1, y1, x2, y2 } => {
                x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()
            }
            ShapeGeometry::Polygon { points, .. } => points.iter().all(|p| p.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bounds() {
        let rect = ShapeGeometry::rect(100.0, 50.0);
        assert_eq!(rect.local_bounds(), Rect::new(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_ellipse_bounds() {
        let ellipse = ShapeGeometry::Ellipse { rx: 10.0, ry: 5.0 };
        assert_eq!(ellipse.local_bounds(), Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn test_line_bounds_normalized() {
        let line = ShapeGeometry::Line {
            x1: 10.0,
            y1: 20.0,
            x2: 0.0,
            y2: 5.0,
        };
        assert_eq!(line.local_bounds(), Rect::new(0.0, 5.0, 10.0, 20.0));
    }

    #[test]
    fn test_polygon_bounds_and_path() {
        let poly = ShapeGeometry::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(5.0, 8.0),
            ],
            closed: true,
        };
        assert_eq!(poly.local_bounds(), Rect::new(0.0, 0.0, 10.0, 8.0));
        assert_eq!(poly.element_name(), "polygon");
        assert_eq!(poly.to_path().elements().len(), 4);
    }

    #[test]
    fn test_empty_polygon() {
        let poly = ShapeGeometry::Polygon {
            points: vec![],
            closed: false,
        };
        assert_eq!(poly.local_bounds(), Rect::ZERO);
        assert!(poly.to_path().elements().is_empty());
    }
}
