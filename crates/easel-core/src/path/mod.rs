//! Path data: absolute drawing commands parsed from SVG `d` strings.

mod decompose;

pub use decompose::{Decomposition, decompose_object, decompose_path, flatten_group, split_subpaths};

use kurbo::{Arc, BezPath, Point, Rect, Shape as KurboShape, SvgArc, Vec2};
use serde::{Deserialize, Serialize};
use svgtypes::{PathParser, PathSegment};
use thiserror::Error;

/// Path errors.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Invalid path data at segment {index}: {message}")]
    Parse { index: usize, message: String },
    #[error("Non-finite coordinate in segment {0}")]
    NonFinite(usize),
}

pub type PathResult<T> = Result<T, PathError>;

/// A single absolute drawing command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    QuadTo(Point, Point),
    ArcTo {
        radii: Vec2,
        /// Rotation of the ellipse's x axis in degrees.
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    Close,
}

impl PathCommand {
    /// Where the pen ends up after this command. `Close` returns `None`;
    /// its end point is the start of the current sub-path.
    pub fn end_point(&self) -> Option<Point> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(p),
            PathCommand::CubicTo(_, _, p) | PathCommand::QuadTo(_, p) => Some(p),
            PathCommand::ArcTo { to, .. } => Some(to),
            PathCommand::Close => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => p.is_finite(),
            PathCommand::CubicTo(a, b, c) => a.is_finite() && b.is_finite() && c.is_finite(),
            PathCommand::QuadTo(a, b) => a.is_finite() && b.is_finite(),
            PathCommand::ArcTo {
                radii,
                x_rotation,
                to,
                ..
            } => radii.is_finite() && x_rotation.is_finite() && to.is_finite(),
            PathCommand::Close => true,
        }
    }

    fn write_svg(&self, out: &mut String) {
        match *self {
            PathCommand::MoveTo(p) => push_cmd(out, 'M', &[p.x, p.y]),
            PathCommand::LineTo(p) => push_cmd(out, 'L', &[p.x, p.y]),
            PathCommand::CubicTo(a, b, c) => push_cmd(out, 'C', &[a.x, a.y, b.x, b.y, c.x, c.y]),
            PathCommand::QuadTo(a, b) => push_cmd(out, 'Q', &[a.x, a.y, b.x, b.y]),
            PathCommand::ArcTo {
                radii,
                x_rotation,
                large_arc,
                sweep,
                to,
            } => push_cmd(
                out,
                'A',
                &[
                    radii.x,
                    radii.y,
                    x_rotation,
                    if large_arc { 1.0 } else { 0.0 },
                    if sweep { 1.0 } else { 0.0 },
                    to.x,
                    to.y,
                ],
            ),
            PathCommand::Close => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push('Z');
            }
        }
    }
}

fn push_cmd(out: &mut String, letter: char, values: &[f64]) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push(letter);
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format_number(*v));
    }
}

/// Shortest round-trip decimal form, without negative zero.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// An ordered list of absolute path commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    commands: Vec<PathCommand>,
}

impl PathData {
    pub fn from_commands(commands: Vec<PathCommand>) -> Self {
        Self { commands }
    }

    /// Parse an SVG path string, failing on the first malformed segment.
    pub fn parse(d: &str) -> PathResult<Self> {
        let mut builder = Absolutizer::default();
        for (index, segment) in PathParser::from(d).enumerate() {
            let segment = segment.map_err(|e| PathError::Parse {
                index,
                message: e.to_string(),
            })?;
            let command = builder.push(segment);
            if !command.is_finite() {
                return Err(PathError::NonFinite(index));
            }
            builder.commands.push(command);
        }
        Ok(Self {
            commands: builder.commands,
        })
    }

    /// Parse an SVG path string, keeping the commands before the first error.
    pub fn parse_lossy(d: &str) -> Self {
        let mut builder = Absolutizer::default();
        for segment in PathParser::from(d) {
            match segment {
                Ok(segment) => {
                    let command = builder.push(segment);
                    if !command.is_finite() {
                        log::warn!("Truncating path data at non-finite segment");
                        break;
                    }
                    builder.commands.push(command);
                }
                Err(e) => {
                    log::warn!("Truncating path data: {}", e);
                    break;
                }
            }
        }
        Self {
            commands: builder.commands,
        }
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<PathCommand> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of explicit moveto commands.
    pub fn move_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::MoveTo(_)))
            .count()
    }

    pub fn is_finite(&self) -> bool {
        self.commands.iter().all(PathCommand::is_finite)
    }

    /// Serialize back to an SVG `d` string using absolute commands.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            command.write_svg(&mut out);
        }
        out
    }

    /// Convert to a kurbo path. Arcs become cubic approximations; non-finite
    /// commands are skipped.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut current = Point::ZERO;
        let mut start = Point::ZERO;
        let mut open = false;
        for command in self.commands.iter().filter(|c| c.is_finite()) {
            if !open && !matches!(command, PathCommand::MoveTo(_) | PathCommand::Close) {
                path.move_to(current);
                start = current;
                open = true;
            }
            match *command {
                PathCommand::MoveTo(p) => {
                    path.move_to(p);
                    start = p;
                    open = true;
                }
                PathCommand::LineTo(p) => path.line_to(p),
                PathCommand::CubicTo(a, b, c) => path.curve_to(a, b, c),
                PathCommand::QuadTo(a, b) => path.quad_to(a, b),
                PathCommand::ArcTo {
                    radii,
                    x_rotation,
                    large_arc,
                    sweep,
                    to,
                } => {
                    let svg_arc = SvgArc {
                        from: current,
                        to,
                        radii,
                        x_rotation: x_rotation.to_radians(),
                        large_arc,
                        sweep,
                    };
                    match Arc::from_svg_arc(&svg_arc) {
                        Some(arc) => arc.to_cubic_beziers(0.1, |a, b, c| path.curve_to(a, b, c)),
                        None => path.line_to(to),
                    }
                }
                PathCommand::Close => {
                    if open {
                        path.close_path();
                    }
                    open = false;
                    current = start;
                    continue;
                }
            }
            if let Some(p) = command.end_point() {
                current = p;
            }
        }
        path
    }

    /// Bounding box of the rendered outline; `Rect::ZERO` when empty.
    pub fn bounds(&self) -> Rect {
        let path = self.to_bez_path();
        if path.elements().is_empty() {
            return Rect::ZERO;
        }
        path.bounding_box()
    }
}

/// Converts relative and shorthand segments into absolute commands.
#[derive(Default)]
struct Absolutizer {
    commands: Vec<PathCommand>,
    current: Point,
    subpath_start: Point,
    last_cubic_ctrl: Option<Point>,
    last_quad_ctrl: Option<Point>,
}

impl Absolutizer {
    fn resolve(&self, abs: bool, x: f64, y: f64) -> Point {
        if abs {
            Point::new(x, y)
        } else {
            Point::new(self.current.x + x, self.current.y + y)
        }
    }

    fn reflect(&self, ctrl: Option<Point>) -> Point {
        match ctrl {
            Some(c) => Point::new(2.0 * self.current.x - c.x, 2.0 * self.current.y - c.y),
            None => self.current,
        }
    }

    /// Translate one segment and advance the pen. The caller stores the result.
    fn push(&mut self, segment: PathSegment) -> PathCommand {
        let mut cubic_ctrl = None;
        let mut quad_ctrl = None;
        let command = match segment {
            PathSegment::MoveTo { abs, x, y } => {
                let p = self.resolve(abs, x, y);
                self.subpath_start = p;
                PathCommand::MoveTo(p)
            }
            PathSegment::LineTo { abs, x, y } => PathCommand::LineTo(self.resolve(abs, x, y)),
            PathSegment::HorizontalLineTo { abs, x } => {
                let x = if abs { x } else { self.current.x + x };
                PathCommand::LineTo(Point::new(x, self.current.y))
            }
            PathSegment::VerticalLineTo { abs, y } => {
                let y = if abs { y } else { self.current.y + y };
                PathCommand::LineTo(Point::new(self.current.x, y))
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = self.resolve(abs, x1, y1);
                let c2 = self.resolve(abs, x2, y2);
                cubic_ctrl = Some(c2);
                PathCommand::CubicTo(c1, c2, self.resolve(abs, x, y))
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let c1 = self.reflect(self.last_cubic_ctrl);
                let c2 = self.resolve(abs, x2, y2);
                cubic_ctrl = Some(c2);
                PathCommand::CubicTo(c1, c2, self.resolve(abs, x, y))
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let c = self.resolve(abs, x1, y1);
                quad_ctrl = Some(c);
                PathCommand::QuadTo(c, self.resolve(abs, x, y))
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let c = self.reflect(self.last_quad_ctrl);
                quad_ctrl = Some(c);
                PathCommand::QuadTo(c, self.resolve(abs, x, y))
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => PathCommand::ArcTo {
                radii: Vec2::new(rx, ry),
                x_rotation: x_axis_rotation,
                large_arc,
                sweep,
                to: self.resolve(abs, x, y),
            },
            PathSegment::ClosePath { .. } => PathCommand::Close,
        };
        self.current = command.end_point().unwrap_or(self.subpath_start);
        self.last_cubic_ctrl = cubic_ctrl;
        self.last_quad_ctrl = quad_ctrl;
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let path = PathData::parse("M10 20 L30 40 Z").unwrap();
        assert_eq!(
            path.commands(),
            &[
                PathCommand::MoveTo(Point::new(10.0, 20.0)),
                PathCommand::LineTo(Point::new(30.0, 40.0)),
                PathCommand::Close,
            ]
        );
        assert_eq!(path.to_svg(), "M10 20 L30 40 Z");
    }

    #[test]
    fn test_relative_commands_are_absolutized() {
        let path = PathData::parse("m10 10 l5 0 v5 h-5 z m20 0 l1 1").unwrap();
        assert_eq!(path.move_count(), 2);
        assert_eq!(
            path.commands()[2],
            PathCommand::LineTo(Point::new(15.0, 15.0))
        );
        // After closepath the pen returns to (10, 10).
        assert_eq!(
            path.commands()[5],
            PathCommand::MoveTo(Point::new(30.0, 10.0))
        );
    }

    #[test]
    fn test_smooth_cubic_reflects_control() {
        let path = PathData::parse("M0 0 C0 10 10 10 10 0 S20 -10 20 0").unwrap();
        assert_eq!(
            path.commands()[2],
            PathCommand::CubicTo(
                Point::new(10.0, -10.0),
                Point::new(20.0, -10.0),
                Point::new(20.0, 0.0)
            )
        );
    }

    #[test]
    fn test_parse_error_reports_segment() {
        assert!(matches!(
            PathData::parse("M0 0 L10"),
            Err(PathError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_lossy_keeps_prefix() {
        let path = PathData::parse_lossy("M0 0 L10 10 L");
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_bounds() {
        let path = PathData::parse("M10 10 L50 10 L50 30 Z").unwrap();
        assert_eq!(path.bounds(), Rect::new(10.0, 10.0, 50.0, 30.0));
        assert_eq!(PathData::default().bounds(), Rect::ZERO);
    }

    #[test]
    fn test_arc_bounds() {
        let path = PathData::parse("M0 50 A50 50 0 0 1 100 50").unwrap();
        let bounds = path.bounds();
        assert!((bounds.y0 - 0.0).abs() < 0.5);
        assert!((bounds.x1 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(100.0), "100");
    }
}
