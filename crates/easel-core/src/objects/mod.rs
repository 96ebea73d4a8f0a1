//! Drawable objects that make up a document.

mod image;
mod shape;
mod style;
mod text;
mod transform;

pub use image::ImageGeometry;
pub use shape::ShapeGeometry;
pub use style::{Paint, SerializableColor, Style};
pub use text::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, TextGeometry};
pub use transform::Transform;

use crate::path::PathData;
use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for objects.
pub type ObjectId = Uuid;

/// Name given to the workspace marker.
pub const WORKSPACE_NAME: &str = "clip";

/// Coarse classification of an object's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Shape,
    Text,
    Image,
    Group,
    Path,
}

/// What an object is for within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectRole {
    #[default]
    Content,
    /// The artboard rectangle. Exactly one per document, always at the back.
    Workspace,
}

/// Kind-specific geometry of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Shape(ShapeGeometry),
    Text(TextGeometry),
    Image(ImageGeometry),
    /// Children positioned in the group's local space.
    Group(Vec<DrawableObject>),
    Path(PathData),
}

/// A node in the document's scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawableObject {
    pub(crate) id: ObjectId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: ObjectRole,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: Style,
    pub geometry: Geometry,
}

impl DrawableObject {
    pub fn new(geometry: Geometry) -> Self {
        Self::with_id(Uuid::new_v4(), geometry)
    }

    pub fn with_id(id: ObjectId, geometry: Geometry) -> Self {
        Self {
            id,
            name: None,
            role: ObjectRole::Content,
            transform: Transform::default(),
            style: Style::default(),
            geometry,
        }
    }

    /// The workspace marker: a white, unstroked rectangle at the origin.
    pub fn workspace(width: f64, height: f64) -> Self {
        let mut marker = Self::new(Geometry::Shape(ShapeGeometry::rect(width, height)));
        marker.name = Some(WORKSPACE_NAME.to_string());
        marker.role = ObjectRole::Workspace;
        marker.style.fill = Paint::Color(SerializableColor::white());
        marker
    }

    /// A group containing `children`.
    pub fn group(children: Vec<DrawableObject>) -> Self {
        Self::new(Geometry::Group(children))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Give this object (and all descendants) fresh ids.
    pub fn regenerate_ids(&mut self) {
        self.id = Uuid::new_v4();
        if let Geometry::Group(children) = &mut self.geometry {
            for child in children {
                child.regenerate_ids();
            }
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match &self.geometry {
            Geometry::Shape(_) => ObjectKind::Shape,
            Geometry::Text(_) => ObjectKind::Text,
            Geometry::Image(_) => ObjectKind::Image,
            Geometry::Group(_) => ObjectKind::Group,
            Geometry::Path(_) => ObjectKind::Path,
        }
    }

    pub fn is_workspace(&self) -> bool {
        self.role == ObjectRole::Workspace
    }

    pub fn is_visible(&self) -> bool {
        self.style.visible
    }

    pub fn as_path(&self) -> Option<&PathData> {
        match &self.geometry {
            Geometry::Path(data) => Some(data),
            _ => None,
        }
    }

    pub fn children(&self) -> &[DrawableObject] {
        match &self.geometry {
            Geometry::Group(children) => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<DrawableObject>> {
        match &mut self.geometry {
            Geometry::Group(children) => Some(children),
            _ => None,
        }
    }

    /// Bounding box of the geometry in local coordinates.
    pub fn local_bounds(&self) -> Rect {
        match &self.geometry {
            Geometry::Shape(shape) => shape.local_bounds(),
            Geometry::Text(text) => text.local_bounds(),
            Geometry::Image(image) => image.local_bounds(),
            Geometry::Path(path) => path.bounds(),
            Geometry::Group(children) => union_bounds(children.iter()).unwrap_or(Rect::ZERO),
        }
    }

    /// Local-to-parent affine.
    pub fn affine(&self) -> Affine {
        self.transform.to_affine(self.local_bounds())
    }

    /// Axis-aligned bounding box in parent coordinates.
    pub fn bounds(&self) -> Rect {
        let local = self.local_bounds();
        self.transform.to_affine(local).transform_rect_bbox(local)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.transform.translate(delta);
    }

    /// Outline in local coordinates. Groups concatenate their children's
    /// outlines; text and images use their layout box.
    pub fn to_path(&self) -> BezPath {
        match &self.geometry {
            Geometry::Shape(shape) => shape.to_path(),
            Geometry::Path(path) => path.to_bez_path(),
            Geometry::Text(_) | Geometry::Image(_) => {
                kurbo::Shape::to_path(&self.local_bounds(), 0.1)
            }
            Geometry::Group(children) => {
                let mut path = BezPath::new();
                for child in children {
                    let mut outline = child.to_path();
                    outline.apply_affine(child.affine());
                    path.extend(outline.elements().iter().copied());
                }
                path
            }
        }
    }

    /// Hit test against the parent-space bounding box.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    /// Find this object or a descendant by id.
    pub fn find(&self, id: ObjectId) -> Option<&DrawableObject> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// All ids in this subtree, including this object.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let mut ids = vec![self.id];
        for child in self.children() {
            ids.extend(child.all_ids());
        }
        ids
    }

    /// Whether every coordinate in this subtree is finite.
    pub fn is_finite(&self) -> bool {
        self.transform.is_finite()
            && self.style.stroke_width.is_finite()
            && self.style.opacity.is_finite()
            && match &self.geometry {
                Geometry::Shape(shape) => shape.is_finite(),
                Geometry::Text(text) => text.font_size.is_finite(),
                Geometry::Image(image) => image.width.is_finite() && image.height.is_finite(),
                Geometry::Path(path) => path.is_finite(),
                Geometry::Group(children) => children.iter().all(DrawableObject::is_finite),
            }
    }
}

/// Union of the parent-space bounds of `objects`.
pub fn union_bounds<'a>(objects: impl IntoIterator<Item = &'a DrawableObject>) -> Option<Rect> {
    objects
        .into_iter()
        .map(DrawableObject::bounds)
        .reduce(|acc, b| acc.union(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_at(x: f64, y: f64, w: f64, h: f64) -> DrawableObject {
        DrawableObject::new(Geometry::Shape(ShapeGeometry::rect(w, h)))
            .with_transform(Transform::at(x, y))
    }

    #[test]
    fn test_kind() {
        assert_eq!(rect_at(0.0, 0.0, 1.0, 1.0).kind(), ObjectKind::Shape);
        let path = DrawableObject::new(Geometry::Path(PathData::default()));
        assert_eq!(path.kind(), ObjectKind::Path);
        assert_eq!(DrawableObject::group(vec![]).kind(), ObjectKind::Group);
    }

    #[test]
    fn test_workspace_marker() {
        let ws = DrawableObject::workspace(900.0, 1200.0);
        assert!(ws.is_workspace());
        assert_eq!(ws.name.as_deref(), Some(WORKSPACE_NAME));
        assert_eq!(ws.bounds(), Rect::new(0.0, 0.0, 900.0, 1200.0));
    }

    #[test]
    fn test_bounds_follow_transform() {
        let obj = rect_at(10.0, 20.0, 30.0, 40.0);
        assert_eq!(obj.bounds(), Rect::new(10.0, 20.0, 40.0, 60.0));
    }

    #[test]
    fn test_group_bounds_union_children() {
        let group = DrawableObject::group(vec![
            rect_at(0.0, 0.0, 10.0, 10.0),
            rect_at(20.0, 5.0, 10.0, 10.0),
        ])
        .with_transform(Transform::at(100.0, 100.0));
        assert_eq!(group.local_bounds(), Rect::new(0.0, 0.0, 30.0, 15.0));
        assert_eq!(group.bounds(), Rect::new(100.0, 100.0, 130.0, 115.0));
    }

    #[test]
    fn test_nested_group_bounds_are_linear() {
        let mut object = rect_at(0.0, 0.0, 10.0, 10.0);
        for _ in 0..200 {
            object = DrawableObject::group(vec![object]).with_transform(Transform::at(1.0, 0.0));
        }
        let started = std::time::Instant::now();
        let bounds = object.bounds();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(bounds, Rect::new(1.0, 0.0, 11.0, 10.0));
    }

    #[test]
    fn test_find_nested() {
        let inner = rect_at(0.0, 0.0, 1.0, 1.0);
        let inner_id = inner.id();
        let group = DrawableObject::group(vec![DrawableObject::group(vec![inner])]);
        assert!(group.find(inner_id).is_some());
        assert_eq!(group.all_ids().len(), 3);
    }

    #[test]
    fn test_regenerate_ids() {
        let mut group = DrawableObject::group(vec![rect_at(0.0, 0.0, 1.0, 1.0)]);
        let before = group.all_ids();
        group.regenerate_ids();
        let after = group.all_ids();
        assert!(before.iter().all(|id| !after.contains(id)));
    }

    #[test]
    fn test_hit_test() {
        let obj = rect_at(10.0, 10.0, 10.0, 10.0);
        assert!(obj.hit_test(Point::new(15.0, 15.0), 0.0));
        assert!(obj.hit_test(Point::new(8.0, 15.0), 3.0));
        assert!(!obj.hit_test(Point::new(0.0, 0.0), 3.0));
    }

    #[test]
    fn test_serde_is_self_describing() {
        let obj = rect_at(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&obj).unwrap();
        let back: DrawableObject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obj);
        assert_eq!(back.kind(), ObjectKind::Shape);
    }
}
