//! The document: a workspace marker plus an ordered list of objects.

use crate::objects::{DrawableObject, Geometry, ObjectId, Paint, ShapeGeometry, union_bounds};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use std::collections::HashSet;
use uuid::Uuid;

pub const DEFAULT_WORKSPACE_WIDTH: f64 = 900.0;
pub const DEFAULT_WORKSPACE_HEIGHT: f64 = 1200.0;

/// Document errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Object not found: {0}")]
    NotFound(ObjectId),
    #[error("The workspace marker cannot be removed or replaced")]
    WorkspaceLocked,
    #[error("Document contains {0} workspace markers")]
    DuplicateWorkspace(usize),
    #[error("Object {0} contains non-finite coordinates")]
    NonFinite(ObjectId),
    #[error("Object id {0} is already in use")]
    DuplicateId(ObjectId),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// A design document.
///
/// Objects are stored back to front. Index 0 always holds the workspace
/// marker; content objects follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: String,
    /// Document name.
    #[serde(default)]
    pub name: String,
    pub workspace_width: f64,
    pub workspace_height: f64,
    objects: Vec<DrawableObject>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DEFAULT_WORKSPACE_WIDTH, DEFAULT_WORKSPACE_HEIGHT)
    }
}

impl Document {
    /// Create an empty document with a workspace of the given size.
    pub fn new(workspace_width: f64, workspace_height: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            workspace_width,
            workspace_height,
            objects: vec![DrawableObject::workspace(workspace_width, workspace_height)],
        }
    }

    pub fn workspace(&self) -> &DrawableObject {
        &self.objects[0]
    }

    /// Workspace rectangle in world coordinates.
    pub fn workspace_rect(&self) -> Rect {
        self.workspace().bounds()
    }

    /// All objects back to front, including the workspace marker.
    pub fn objects(&self) -> &[DrawableObject] {
        &self.objects
    }

    /// Content objects back to front.
    pub fn content(&self) -> impl DoubleEndedIterator<Item = &DrawableObject> {
        self.objects.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.objects.len() - 1
    }

    /// True when there is no content besides the workspace.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DrawableObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    /// Find a top-level object or any group descendant.
    pub fn find(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.iter().find_map(|o| o.find(id))
    }

    /// Z-position of a top-level object.
    pub fn position(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    /// Add an object on top of everything else.
    pub fn add(&mut self, object: DrawableObject) -> DocumentResult<ObjectId> {
        self.insert(self.objects.len(), object)
    }

    /// Insert an object at a z-position. Positions below the workspace are
    /// clamped to just above it.
    pub fn insert(&mut self, index: usize, object: DrawableObject) -> DocumentResult<ObjectId> {
        if object.is_workspace() {
            return Err(DocumentError::DuplicateWorkspace(2));
        }
        if !object.is_finite() {
            return Err(DocumentError::NonFinite(object.id()));
        }
        self.check_unique_ids(None, std::slice::from_ref(&object))?;
        let id = object.id();
        let index = index.clamp(1, self.objects.len());
        self.objects.insert(index, object);
        Ok(id)
    }

    pub fn remove(&mut self, id: ObjectId) -> DocumentResult<DrawableObject> {
        let index = self.position(id).ok_or(DocumentError::NotFound(id))?;
        if index == 0 {
            return Err(DocumentError::WorkspaceLocked);
        }
        Ok(self.objects.remove(index))
    }

    /// Replace one object with several, inserted at its z-position in order.
    pub fn replace(
        &mut self,
        id: ObjectId,
        replacements: Vec<DrawableObject>,
    ) -> DocumentResult<Vec<ObjectId>> {
        let index = self.position(id).ok_or(DocumentError::NotFound(id))?;
        if index == 0 {
            return Err(DocumentError::WorkspaceLocked);
        }
        if let Some(bad) = replacements.iter().find(|o| o.is_workspace()) {
            log::warn!("Refusing to insert workspace marker {}", bad.id());
            return Err(DocumentError::DuplicateWorkspace(2));
        }
        if let Some(bad) = replacements.iter().find(|o| !o.is_finite()) {
            return Err(DocumentError::NonFinite(bad.id()));
        }
        self.check_unique_ids(Some(index), &replacements)?;
        let ids = replacements.iter().map(DrawableObject::id).collect();
        self.objects.splice(index..=index, replacements);
        Ok(ids)
    }

    /// Reject `incoming` if any id in its subtrees repeats, or is already
    /// used by an object other than the one at `replacing`.
    fn check_unique_ids(
        &self,
        replacing: Option<usize>,
        incoming: &[DrawableObject],
    ) -> DocumentResult<()> {
        let mut seen: HashSet<ObjectId> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .flat_map(|(_, o)| o.all_ids())
            .collect();
        match incoming
            .iter()
            .flat_map(DrawableObject::all_ids)
            .find(|id| !seen.insert(*id))
        {
            Some(id) => Err(DocumentError::DuplicateId(id)),
            None => Ok(()),
        }
    }

    /// Remove all content, keeping the workspace.
    pub fn clear(&mut self) {
        self.objects.truncate(1);
    }

    pub fn bring_to_front(&mut self, id: ObjectId) {
        if let Some(index) = self.position(id).filter(|i| *i > 0) {
            let object = self.objects.remove(index);
            self.objects.push(object);
        }
    }

    pub fn send_to_back(&mut self, id: ObjectId) {
        if let Some(index) = self.position(id).filter(|i| *i > 1) {
            let object = self.objects.remove(index);
            self.objects.insert(1, object);
        }
    }

    /// Move one step forward. Returns true if the object moved.
    pub fn bring_forward(&mut self, id: ObjectId) -> bool {
        match self.position(id) {
            Some(index) if index > 0 && index + 1 < self.objects.len() => {
                self.objects.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Move one step backward, never below the workspace.
    pub fn send_backward(&mut self, id: ObjectId) -> bool {
        match self.position(id) {
            Some(index) if index > 1 => {
                self.objects.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Union of the bounds of all content objects.
    pub fn bounds(&self) -> Option<Rect> {
        union_bounds(self.content())
    }

    /// Visible content objects under `point`, front to back.
    pub fn objects_at_point(&self, point: Point, tolerance: f64) -> Vec<ObjectId> {
        self.content()
            .rev()
            .filter(|o| o.is_visible() && o.hit_test(point, tolerance))
            .map(DrawableObject::id)
            .collect()
    }

    /// Visible content objects whose bounds intersect `rect`.
    pub fn objects_in_rect(&self, rect: Rect) -> Vec<ObjectId> {
        self.content()
            .filter(|o| o.is_visible() && rect.intersect(o.bounds()).area() > 0.0)
            .map(DrawableObject::id)
            .collect()
    }

    /// Change the workspace size, keeping the marker in sync.
    pub fn resize_workspace(&mut self, width: f64, height: f64) {
        self.workspace_width = width;
        self.workspace_height = height;
        self.objects[0].geometry = Geometry::Shape(ShapeGeometry::rect(width, height));
    }

    /// Change the workspace background.
    pub fn set_workspace_fill(&mut self, fill: Paint) {
        self.objects[0].style.fill = fill;
    }

    /// Split out one top-level object for mutation alongside read access to
    /// every other object.
    pub fn split_target_mut(
        &mut self,
        id: ObjectId,
    ) -> Option<(&mut DrawableObject, impl Iterator<Item = &DrawableObject>)> {
        let index = self.position(id)?;
        let (before, rest) = self.objects.split_at_mut(index);
        let (target, after) = rest.split_first_mut()?;
        Some((target, before.iter().chain(after.iter())))
    }

    pub fn to_json(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Standalone SVG at workspace size.
    pub fn to_svg(&self) -> String {
        crate::svg::document_to_svg(self)
    }

    /// Load a document, repairing a missing or misplaced workspace marker.
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        let mut document: Document = serde_json::from_str(json)?;
        document.repair_workspace()?;
        Ok(document)
    }

    fn repair_workspace(&mut self) -> DocumentResult<()> {
        let markers: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_workspace())
            .map(|(i, _)| i)
            .collect();
        match markers.as_slice() {
            [] => {
                log::warn!("Document {} has no workspace marker; recreating it", self.id);
                self.objects.insert(
                    0,
                    DrawableObject::workspace(self.workspace_width, self.workspace_height),
                );
            }
            [0] => {}
            [index] => {
                log::warn!("Moving workspace marker of document {} to the back", self.id);
                let marker = self.objects.remove(*index);
                self.objects.insert(0, marker);
            }
            many => return Err(DocumentError::DuplicateWorkspace(many.len())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Transform;

    fn rect_at(x: f64, y: f64) -> DrawableObject {
        DrawableObject::new(Geometry::Shape(ShapeGeometry::rect(10.0, 10.0)))
            .with_transform(Transform::at(x, y))
    }

    #[test]
    fn test_new_document_has_workspace() {
        let doc = Document::new(900.0, 1200.0);
        assert!(doc.is_empty());
        assert!(doc.workspace().is_workspace());
        assert_eq!(doc.workspace_rect(), Rect::new(0.0, 0.0, 900.0, 1200.0));
    }

    #[test]
    fn test_add_and_remove() {
        let mut doc = Document::default();
        let id = doc.add(rect_at(0.0, 0.0)).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.get(id).is_some());
        doc.remove(id).unwrap();
        assert!(doc.is_empty());
        assert!(matches!(doc.remove(id), Err(DocumentError::NotFound(_))));
    }

    #[test]
    fn test_workspace_cannot_be_removed() {
        let mut doc = Document::default();
        let ws = doc.workspace().id();
        assert!(matches!(doc.remove(ws), Err(DocumentError::WorkspaceLocked)));
    }

    #[test]
    fn test_insert_never_goes_below_workspace() {
        let mut doc = Document::default();
        let id = doc.insert(0, rect_at(0.0, 0.0)).unwrap();
        assert_eq!(doc.position(id), Some(1));
        assert!(doc.objects()[0].is_workspace());
    }

    #[test]
    fn test_replace_keeps_z_position() {
        let mut doc = Document::default();
        let a = doc.add(rect_at(0.0, 0.0)).unwrap();
        let b = doc.add(rect_at(1.0, 0.0)).unwrap();
        let c = doc.add(rect_at(2.0, 0.0)).unwrap();
        let ids = doc.replace(b, vec![rect_at(3.0, 0.0), rect_at(4.0, 0.0)]).unwrap();
        let order: Vec<ObjectId> = doc.content().map(DrawableObject::id).collect();
        assert_eq!(order, vec![a, ids[0], ids[1], c]);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut doc = Document::default();
        let object = rect_at(0.0, 0.0);
        let id = doc.add(object.clone()).unwrap();
        assert!(matches!(doc.add(object.clone()), Err(DocumentError::DuplicateId(d)) if d == id));

        let nested = DrawableObject::group(vec![object.clone()]);
        assert!(matches!(doc.add(nested), Err(DocumentError::DuplicateId(_))));
        assert_eq!(doc.len(), 1);

        let other = doc.add(rect_at(5.0, 5.0)).unwrap();
        let twins = vec![rect_at(1.0, 1.0), rect_at(2.0, 2.0)];
        let mut clash = twins.clone();
        clash[1] = clash[0].clone();
        assert!(matches!(doc.replace(other, clash), Err(DocumentError::DuplicateId(_))));
        assert!(doc.get(other).is_some());
    }

    #[test]
    fn test_replace_may_reuse_ids_of_the_replaced_object() {
        let mut doc = Document::default();
        let child = rect_at(0.0, 0.0);
        let child_id = child.id();
        let group = doc.add(DrawableObject::group(vec![child.clone()])).unwrap();
        assert_eq!(doc.replace(group, vec![child]).unwrap(), vec![child_id]);
    }

    #[test]
    fn test_z_order() {
        let mut doc = Document::default();
        let a = doc.add(rect_at(0.0, 0.0)).unwrap();
        let b = doc.add(rect_at(0.0, 0.0)).unwrap();
        doc.bring_to_front(a);
        assert_eq!(doc.position(a), Some(2));
        doc.send_to_back(a);
        assert_eq!(doc.position(a), Some(1));
        assert!(!doc.send_backward(a));
        assert!(doc.send_backward(b));
        assert_eq!(doc.position(b), Some(1));
        assert!(doc.objects()[0].is_workspace());
    }

    #[test]
    fn test_objects_at_point_front_to_back() {
        let mut doc = Document::default();
        let a = doc.add(rect_at(0.0, 0.0)).unwrap();
        let b = doc.add(rect_at(5.0, 5.0)).unwrap();
        assert_eq!(doc.objects_at_point(Point::new(7.0, 7.0), 0.0), vec![b, a]);
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let mut doc = Document::default();
        doc.add(rect_at(1.5, 2.25)).unwrap();
        let json = doc.to_json().unwrap();
        let back = Document::from_json(&json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn test_load_repairs_missing_workspace() {
        let json = r#"{"id":"d","workspace_width":100.0,"workspace_height":50.0,"objects":[]}"#;
        let doc = Document::from_json(json).unwrap();
        assert!(doc.workspace().is_workspace());
        assert_eq!(doc.workspace_rect(), Rect::new(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_load_moves_misplaced_workspace() {
        let mut doc = Document::default();
        doc.add(rect_at(0.0, 0.0)).unwrap();
        doc.objects.swap(0, 1);
        let json = serde_json::to_string(&doc).unwrap();
        let loaded = Document::from_json(&json).unwrap();
        assert!(loaded.objects()[0].is_workspace());
    }

    #[test]
    fn test_load_rejects_duplicate_workspace() {
        let mut doc = Document::default();
        doc.objects.push(DrawableObject::workspace(1.0, 1.0));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            Document::from_json(&json),
            Err(DocumentError::DuplicateWorkspace(2))
        ));
    }

    #[test]
    fn test_split_target_mut() {
        let mut doc = Document::default();
        let a = doc.add(rect_at(0.0, 0.0)).unwrap();
        doc.add(rect_at(20.0, 0.0)).unwrap();
        let (target, others) = doc.split_target_mut(a).unwrap();
        assert_eq!(target.id(), a);
        assert_eq!(others.count(), 2);
    }

    #[test]
    fn test_non_finite_objects_are_rejected() {
        let mut doc = Document::default();
        let bad = rect_at(f64::NAN, 0.0);
        assert!(matches!(doc.add(bad), Err(DocumentError::NonFinite(_))));
    }
}
