//! Serialize a document as a standalone SVG at workspace size.

use super::xml::{RoxmlPort, SVG_NS, XLINK_NS, XmlElement, XmlPort};
use crate::document::Document;
use crate::objects::{DrawableObject, Geometry, ShapeGeometry, Style};
use crate::path::format_number;
use kurbo::{Affine, Point};

/// Export `document` as SVG. The workspace becomes the view box and its
/// fill the background; invisible objects are omitted.
pub fn document_to_svg(document: &Document) -> String {
    let workspace = document.workspace_rect();
    let mut root = XmlElement::new("svg");
    root.set_attr("xmlns", SVG_NS);
    root.set_attr("xmlns:xlink", XLINK_NS);
    root.set_attr(
        "viewBox",
        [workspace.x0, workspace.y0, workspace.width(), workspace.height()]
            .map(format_number)
            .join(" "),
    );
    root.set_attr("width", format_number(workspace.width()));
    root.set_attr("height", format_number(workspace.height()));

    let mut count = 0;
    for object in document.objects().iter().filter(|o| o.is_visible()) {
        root.push_element(export_object(object));
        count += 1;
    }
    log::debug!("Exported {} objects to SVG", count);
    RoxmlPort.serialize(&root)
}

fn matrix(affine: Affine) -> String {
    let coeffs = affine.as_coeffs().map(format_number).join(" ");
    format!("matrix({coeffs})")
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", format_number(p.x), format_number(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn apply_paint(element: &mut XmlElement, style: &Style) {
    element.set_attr("fill", style.fill.to_svg_value());
    if !style.stroke.is_none() {
        element.set_attr("stroke", style.stroke.to_svg_value());
        element.set_attr("stroke-width", format_number(style.stroke_width));
    }
}

fn export_object(object: &DrawableObject) -> XmlElement {
    let mut element = match &object.geometry {
        Geometry::Group(children) => {
            let mut group = XmlElement::new("g");
            for child in children.iter().filter(|c| c.is_visible()) {
                group.push_element(export_object(child));
            }
            group
        }
        Geometry::Shape(shape) => {
            let mut el = XmlElement::new(shape.element_name());
            match shape {
                ShapeGeometry::Rect {
                    width,
                    height,
                    corner_radius,
                } => {
                    el.set_attr("width", format_number(*width));
                    el.set_attr("height", format_number(*height));
                    if *corner_radius > 0.0 {
                        el.set_attr("rx", format_number(*corner_radius));
                    }
                }
                ShapeGeometry::Ellipse { rx, ry } => {
                    el.set_attr("cx", format_number(*rx));
                    el.set_attr("cy", format_number(*ry));
                    el.set_attr("rx", format_number(*rx));
                    el.set_attr("ry", format_number(*ry));
                }
                ShapeGeometry::Line { x1, y1, x2, y2 } => {
                    el.set_attr("x1", format_number(*x1));
                    el.set_attr("y1", format_number(*y1));
                    el.set_attr("x2", format_number(*x2));
                    el.set_attr("y2", format_number(*y2));
                }
                ShapeGeometry::Polygon { points, .. } => {
                    el.set_attr("points", points_attr(points));
                }
            }
            apply_paint(&mut el, &object.style);
            el
        }
        Geometry::Path(data) => {
            let mut el = XmlElement::new("path");
            el.set_attr("d", data.to_svg());
            apply_paint(&mut el, &object.style);
            el
        }
        Geometry::Text(text) => {
            let mut el = XmlElement::new("text");
            let width = text.local_bounds().width();
            let x = match text.text_anchor.as_deref() {
                Some("middle") => width / 2.0,
                Some("end") => width,
                _ => 0.0,
            };
            el.set_attr("x", format_number(x));
            el.set_attr("y", format_number(text.font_size));
            el.set_attr("font-family", text.font_family.as_str());
            el.set_attr("font-size", format_number(text.font_size));
            if let Some(weight) = &text.font_weight {
                el.set_attr("font-weight", weight.as_str());
            }
            if let Some(anchor) = &text.text_anchor {
                el.set_attr("text-anchor", anchor.as_str());
            }
            apply_paint(&mut el, &object.style);
            el.push_text(text.content.as_str());
            el
        }
        Geometry::Image(image) => {
            let mut el = XmlElement::new("image");
            el.set_attr("width", format_number(image.width));
            el.set_attr("height", format_number(image.height));
            el.set_attr("xlink:href", image.source.as_str());
            el
        }
    };

    let affine = object.affine();
    if affine != Affine::IDENTITY {
        element.set_attr("transform", matrix(affine));
    }
    if object.style.opacity < 1.0 {
        element.set_attr("opacity", format_number(object.style.opacity));
    }
    if let Some(name) = &object.name {
        element.set_attr("id", name.as_str());
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Paint, SerializableColor, TextGeometry, Transform};
    use crate::path::PathData;
    use crate::svg::{Compatibility, SvgImporter, SvgPipeline};
    use kurbo::Rect;

    #[test]
    fn test_export_empty_document() {
        let doc = Document::new(100.0, 50.0);
        let svg = document_to_svg(&doc);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(svg.contains(r##"<rect width="100" height="50" fill="#ffffff" id="clip"/>"##));
    }

    #[test]
    fn test_export_objects() {
        let mut doc = Document::new(100.0, 100.0);
        let mut path = DrawableObject::new(Geometry::Path(PathData::parse("M0 0 L10 10").unwrap()))
            .with_transform(Transform::at(5.0, 5.0));
        path.style.stroke = Paint::solid(SerializableColor::new(255, 0, 0, 255));
        path.style.fill = Paint::None;
        doc.add(path).unwrap();
        let mut hidden = DrawableObject::new(Geometry::Text(TextGeometry::new("secret")));
        hidden.style.visible = false;
        doc.add(hidden).unwrap();
        doc.add(DrawableObject::new(Geometry::Text(TextGeometry::new("a < b")))).unwrap();

        let svg = document_to_svg(&doc);
        assert!(svg.contains(
            r##"<path d="M0 0 L10 10" fill="none" stroke="#ff0000" stroke-width="1" transform="matrix(1 0 0 1 5 5)"/>"##
        ));
        assert!(!svg.contains("secret"));
        assert!(svg.contains("a &lt; b"));
    }

    #[test]
    fn test_export_reimports_at_same_place() {
        let mut doc = Document::new(200.0, 200.0);
        doc.add(
            DrawableObject::new(Geometry::Shape(ShapeGeometry::rect(20.0, 10.0))).with_transform(
                Transform {
                    angle: 90.0,
                    ..Transform::at(50.0, 60.0)
                },
            ),
        )
        .unwrap();
        let expected = doc.content().next().unwrap().bounds();

        let mut pipeline = SvgPipeline::default();
        let outcome = SvgImporter::new(&mut pipeline, 1.0)
            .import(&document_to_svg(&doc), Rect::new(0.0, 0.0, 200.0, 200.0));
        assert_eq!(outcome.result.compatibility, Compatibility::Success);
        let group = &outcome.object;
        let rect = &group.children()[1];
        let world = group.affine().transform_rect_bbox(rect.bounds());
        assert!((world.x0 - expected.x0).abs() < 1e-6);
        assert!((world.y1 - expected.y1).abs() < 1e-6);
    }
}
