//! Conversion of normalized SVG markup into document objects.

use super::cleanup::{parse_inline_style, parse_length, parse_viewbox, style_value};
use super::xml::XmlElement;
use super::{Compatibility, SvgIngestionResult, SvgPipeline, svg_data_url};
use crate::objects::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DrawableObject, Geometry, ImageGeometry, Paint,
    SerializableColor, ShapeGeometry, Style, TextGeometry, Transform,
};
use crate::path::PathData;
use kurbo::{Affine, Point, Rect, Vec2};
use svgtypes::{Length, PointsParser};

/// Name of the group holding an imported drawing.
pub const IMPORT_GROUP_NAME: &str = "svg-group";
/// Name of the group standing in for an SVG that could not be used.
pub const PLACEHOLDER_GROUP_NAME: &str = "svg-placeholder";

/// Elements whose content never becomes scene objects.
const SKIPPED_ELEMENTS: [&str; 15] = [
    "defs",
    "style",
    "script",
    "title",
    "desc",
    "metadata",
    "clipPath",
    "mask",
    "pattern",
    "symbol",
    "marker",
    "linearGradient",
    "radialGradient",
    "filter",
    "use",
];

/// Result of importing one SVG.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub result: SvgIngestionResult,
    /// Group sized and centered on the workspace.
    pub object: DrawableObject,
}

/// Runs the full ingestion flow and converts the accepted markup.
pub struct SvgImporter<'a> {
    pipeline: &'a mut SvgPipeline,
    fit_ratio: f64,
}

impl<'a> SvgImporter<'a> {
    pub fn new(pipeline: &'a mut SvgPipeline, fit_ratio: f64) -> Self {
        Self {
            pipeline,
            fit_ratio,
        }
    }

    /// Normalize, test, degrade if needed, and convert. Never fails.
    pub fn import(&mut self, raw: &str, workspace: Rect) -> ImportOutcome {
        let mut result = self.pipeline.normalize(raw);

        if result.compatibility != Compatibility::Error
            && !self.pipeline.test_render(&result.normalized_markup)
        {
            log::debug!("Degrading SVG after failed render test");
            let degraded = self.pipeline.degrade(&result.normalized_markup);
            if !self.pipeline.test_render(&degraded) {
                log::warn!("Degraded SVG still fails the render test; accepting best effort");
            }
            result = SvgIngestionResult {
                preview_data_url: svg_data_url(&degraded),
                normalized_markup: degraded,
                compatibility: result.compatibility.max(Compatibility::Warning),
            };
        }

        let converted = match result.compatibility {
            Compatibility::Error => None,
            _ => self
                .convert(&result.normalized_markup, workspace)
                .map(|group| group.with_name(IMPORT_GROUP_NAME)),
        };
        let object = converted.unwrap_or_else(|| {
            log::warn!("Substituting placeholder for unusable SVG");
            self.placeholder_object(workspace)
        });

        ImportOutcome { result, object }
    }

    /// Convert normalized markup into a group fitted to `workspace`.
    /// `None` when nothing drawable was found.
    pub fn convert(&self, markup: &str, workspace: Rect) -> Option<DrawableObject> {
        let root = match self.pipeline.xml().parse(markup) {
            Ok(root) => root,
            Err(e) => {
                log::warn!("Normalized SVG failed to parse: {}", e);
                return None;
            }
        };
        let default_size = self.pipeline.default_size();
        let view_box = root
            .attr("viewBox")
            .and_then(parse_viewbox)
            .map(|vb| Rect::new(vb.x, vb.y, vb.x + vb.w, vb.y + vb.h))
            .unwrap_or_else(|| Rect::new(0.0, 0.0, default_size, default_size));

        let children = convert_children(&root, &Presentation::default());
        if children.is_empty() {
            log::debug!("SVG contained no convertible elements");
            return None;
        }
        log::debug!("Converted {} top-level SVG elements", children.len());

        let mut group = DrawableObject::group(children);
        group.transform = fit_transform(&group, view_box, workspace, self.fit_ratio);
        Some(group)
    }

    /// The placeholder drawing, converted the same way as a real import.
    fn placeholder_object(&self, workspace: Rect) -> DrawableObject {
        let placeholder = self.pipeline.placeholder();
        let group = self
            .convert(&placeholder.normalized_markup, workspace)
            .unwrap_or_else(|| {
                let size = self.pipeline.default_size();
                DrawableObject::new(Geometry::Shape(ShapeGeometry::rect(size, size))).with_style(
                    Style {
                        fill: Paint::solid(SerializableColor::new(0xf0, 0xf0, 0xf0, 0xff)),
                        ..Style::outline(SerializableColor::new(0xff, 0, 0, 0xff), 8.0)
                    },
                )
            });
        group.with_name(PLACEHOLDER_GROUP_NAME)
    }
}

/// Scale the view box to `ratio` of the workspace and center it there.
fn fit_transform(group: &DrawableObject, view_box: Rect, workspace: Rect, ratio: f64) -> Transform {
    let scale = (workspace.width() * ratio / view_box.width())
        .min(workspace.height() * ratio / view_box.height());
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let offset = (group.local_bounds().center() - view_box.center()) * scale;
    let position = workspace.center() + offset;
    Transform {
        x: position.x,
        y: position.y,
        scale_x: scale,
        scale_y: scale,
        angle: 0.0,
        origin_x: 0.5,
        origin_y: 0.5,
    }
}

/// Inheritable presentation properties.
#[derive(Debug, Clone)]
struct Presentation {
    fill: Option<String>,
    stroke: Option<String>,
    stroke_width: Option<f64>,
    font_family: Option<String>,
    font_size: Option<f64>,
    font_weight: Option<String>,
    text_anchor: Option<String>,
    visible: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: None,
            font_family: None,
            font_size: None,
            font_weight: None,
            text_anchor: None,
            visible: true,
        }
    }
}

/// Inline style wins over the attribute; `inherit` means unset.
fn property<'a>(element: &'a XmlElement, inline: &'a [(String, String)], name: &str) -> Option<&'a str> {
    style_value(inline, name)
        .or_else(|| element.attr(name))
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "inherit")
}

impl Presentation {
    fn cascade(&self, element: &XmlElement, inline: &[(String, String)]) -> Self {
        let mut next = self.clone();
        let text = |name| property(element, inline, name).map(str::to_string);
        if let Some(fill) = text("fill") {
            next.fill = Some(fill);
        }
        if let Some(stroke) = text("stroke") {
            next.stroke = Some(stroke);
        }
        if let Some(width) = property(element, inline, "stroke-width").and_then(coordinate) {
            next.stroke_width = Some(width.max(0.0));
        }
        if let Some(family) = text("font-family") {
            next.font_family = Some(family);
        }
        if let Some(size) = property(element, inline, "font-size").and_then(parse_length) {
            next.font_size = Some(size);
        }
        if let Some(weight) = text("font-weight") {
            next.font_weight = Some(weight);
        }
        if let Some(anchor) = text("text-anchor") {
            next.text_anchor = Some(anchor);
        }
        match property(element, inline, "visibility") {
            Some("hidden" | "collapse") => next.visible = false,
            Some("visible") => next.visible = true,
            _ => {}
        }
        next
    }

    fn style(&self, opacity: f64) -> Style {
        Style {
            fill: self
                .fill
                .as_deref()
                .map(Paint::parse)
                .unwrap_or_else(|| Paint::solid(SerializableColor::black())),
            stroke: self.stroke.as_deref().map(Paint::parse).unwrap_or(Paint::None),
            stroke_width: self.stroke_width.unwrap_or(1.0),
            opacity,
            visible: self.visible,
        }
    }
}

fn coordinate(value: &str) -> Option<f64> {
    let length: Length = value.trim().parse().ok()?;
    length.number.is_finite().then_some(length.number)
}

fn number(element: &XmlElement, name: &str) -> Option<f64> {
    element.attr(name).and_then(coordinate)
}

fn positive(element: &XmlElement, name: &str) -> Option<f64> {
    number(element, name).filter(|v| *v > 0.0)
}

fn element_affine(element: &XmlElement) -> Affine {
    let Some(value) = element.attr("transform") else {
        return Affine::IDENTITY;
    };
    match value.parse::<svgtypes::Transform>() {
        Ok(t) => {
            let affine = Affine::new([t.a, t.b, t.c, t.d, t.e, t.f]);
            if affine.is_finite() {
                affine
            } else {
                log::warn!("Ignoring non-finite transform {:?}", value);
                Affine::IDENTITY
            }
        }
        Err(e) => {
            log::warn!("Ignoring unparseable transform {:?}: {}", value, e);
            Affine::IDENTITY
        }
    }
}

fn convert_children(parent: &XmlElement, inherited: &Presentation) -> Vec<DrawableObject> {
    parent
        .elements()
        .filter_map(|child| convert_element(child, inherited))
        .collect()
}

fn convert_element(element: &XmlElement, inherited: &Presentation) -> Option<DrawableObject> {
    let name = element.local_name();
    if SKIPPED_ELEMENTS.contains(&name) {
        log::debug!("Skipping <{}>", name);
        return None;
    }

    let inline = element
        .attr("style")
        .map(parse_inline_style)
        .unwrap_or_default();
    if property(element, &inline, "display") == Some("none") {
        return None;
    }
    let presentation = inherited.cascade(element, &inline);
    let opacity = property(element, &inline, "opacity")
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map_or(1.0, |v| v.clamp(0.0, 1.0));
    let mut style = presentation.style(opacity);

    let (geometry, offset) = match name {
        "g" | "a" | "switch" | "svg" => {
            let children = convert_children(element, &presentation);
            if children.is_empty() {
                return None;
            }
            style = Style {
                opacity,
                visible: presentation.visible,
                ..Style::default()
            };
            (Geometry::Group(children), Vec2::ZERO)
        }
        "rect" => {
            let width = positive(element, "width")?;
            let height = positive(element, "height")?;
            let radius = number(element, "rx")
                .or_else(|| number(element, "ry"))
                .unwrap_or(0.0)
                .clamp(0.0, width.min(height) / 2.0);
            let origin = Vec2::new(
                number(element, "x").unwrap_or(0.0),
                number(element, "y").unwrap_or(0.0),
            );
            let shape = ShapeGeometry::Rect {
                width,
                height,
                corner_radius: radius,
            };
            (Geometry::Shape(shape), origin)
        }
        "circle" | "ellipse" => {
            let (rx, ry) = if name == "circle" {
                let r = positive(element, "r")?;
                (r, r)
            } else {
                (positive(element, "rx")?, positive(element, "ry")?)
            };
            let cx = number(element, "cx").unwrap_or(0.0);
            let cy = number(element, "cy").unwrap_or(0.0);
            (
                Geometry::Shape(ShapeGeometry::Ellipse { rx, ry }),
                Vec2::new(cx - rx, cy - ry),
            )
        }
        "line" => {
            let shape = ShapeGeometry::Line {
                x1: number(element, "x1").unwrap_or(0.0),
                y1: number(element, "y1").unwrap_or(0.0),
                x2: number(element, "x2").unwrap_or(0.0),
                y2: number(element, "y2").unwrap_or(0.0),
            };
            (Geometry::Shape(shape), Vec2::ZERO)
        }
        "polyline" | "polygon" => {
            let points: Vec<Point> = PointsParser::from(element.attr("points")?)
                .map(|(x, y)| Point::new(x, y))
                .take_while(|p| p.is_finite())
                .collect();
            if points.len() < 2 {
                return None;
            }
            let shape = ShapeGeometry::Polygon {
                points,
                closed: name == "polygon",
            };
            (Geometry::Shape(shape), Vec2::ZERO)
        }
        "path" => {
            let data = PathData::parse_lossy(element.attr("d")?);
            if data.is_empty() {
                return None;
            }
            (Geometry::Path(data), Vec2::ZERO)
        }
        "text" => {
            let content = element
                .text_content()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if content.is_empty() {
                return None;
            }
            let text = TextGeometry {
                content,
                font_family: presentation
                    .font_family
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                font_size: presentation.font_size.unwrap_or(DEFAULT_FONT_SIZE),
                font_weight: presentation.font_weight.clone(),
                text_anchor: presentation.text_anchor.clone(),
            };
            let width = text.local_bounds().width();
            let shift = match text.text_anchor.as_deref() {
                Some("middle") => width / 2.0,
                Some("end") => width,
                _ => 0.0,
            };
            let origin = Vec2::new(
                number(element, "x").unwrap_or(0.0) - shift,
                number(element, "y").unwrap_or(0.0) - text.font_size,
            );
            (Geometry::Text(text), origin)
        }
        "image" => {
            let source = element.attr("href").or_else(|| element.attr("xlink:href"))?;
            let image = ImageGeometry::new(
                source,
                positive(element, "width")?,
                positive(element, "height")?,
            );
            let origin = Vec2::new(
                number(element, "x").unwrap_or(0.0),
                number(element, "y").unwrap_or(0.0),
            );
            (Geometry::Image(image), origin)
        }
        other => {
            log::debug!("Skipping unsupported <{}>", other);
            return None;
        }
    };

    let mut object = DrawableObject::new(geometry).with_style(style);
    if let Some(id) = element.attr("id") {
        object.name = Some(id.to_string());
    }
    let local = object.local_bounds();
    object.transform = Transform::from_affine(
        element_affine(element) * Affine::translate(offset),
        local,
        0.0,
        0.0,
    );
    object.is_finite().then_some(object)
}
