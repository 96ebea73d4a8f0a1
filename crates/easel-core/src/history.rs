//! Snapshot-based undo/redo history.

use crate::document::{Document, DocumentResult};
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the persistence hook receives on every commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistPayload {
    pub serialized_document: String,
    pub width: f64,
    pub height: f64,
}

/// Receives the latest document state after each commit.
pub trait PersistenceHook {
    fn persist(&mut self, payload: &PersistPayload);
}

impl<F: FnMut(&PersistPayload)> PersistenceHook for F {
    fn persist(&mut self, payload: &PersistPayload) {
        self(payload)
    }
}

/// One recorded state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub index: usize,
    /// The serialized [`Document`].
    pub document_state: String,
    /// Viewport affine coefficients at commit time.
    pub viewport: Option<[f64; 6]>,
}

/// Linear history of document snapshots with a cursor.
///
/// Committing while the cursor is not at the tip discards the redo branch.
/// Restoring a snapshot sets a replay guard so that commits triggered by the
/// restore itself are not recorded.
#[derive(Default)]
pub struct HistoryManager {
    snapshots: Vec<Snapshot>,
    current_index: usize,
    replaying: bool,
    hook: Option<Box<dyn PersistenceHook>>,
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("snapshots", &self.snapshots.len())
            .field("current_index", &self.current_index)
            .field("replaying", &self.replaying)
            .finish_non_exhaustive()
    }
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_persistence_hook(&mut self, hook: impl PersistenceHook + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_persistence_hook(&mut self) {
        self.hook = None;
    }

    /// Reset history so that the given state is index 0.
    pub fn initialize(&mut self, document: &Document, viewport: &Viewport) -> DocumentResult<()> {
        let document_state = document.to_json()?;
        self.persist(document, &document_state);
        self.snapshots.clear();
        self.snapshots.push(Snapshot {
            index: 0,
            document_state,
            viewport: Some(viewport.to_coeffs()),
        });
        self.current_index = 0;
        Ok(())
    }

    /// Record the current state.
    ///
    /// With `skip_record`, or while replaying, nothing is appended but the
    /// persistence hook still runs.
    pub fn commit(
        &mut self,
        document: &Document,
        viewport: &Viewport,
        skip_record: bool,
    ) -> DocumentResult<Snapshot> {
        let document_state = document.to_json()?;
        let mut snapshot = Snapshot {
            index: self.current_index,
            document_state,
            viewport: Some(viewport.to_coeffs()),
        };

        if !skip_record && !self.replaying {
            if !self.snapshots.is_empty() {
                let dropped = self.snapshots.len() - (self.current_index + 1);
                if dropped > 0 {
                    log::debug!("Discarding {} redo snapshots", dropped);
                }
                self.snapshots.truncate(self.current_index + 1);
            }
            snapshot.index = self.snapshots.len();
            self.snapshots.push(snapshot.clone());
            self.current_index = snapshot.index;
        }

        self.persist(document, &snapshot.document_state);
        Ok(snapshot)
    }

    fn persist(&mut self, document: &Document, serialized: &str) {
        if let Some(hook) = self.hook.as_mut() {
            hook.persist(&PersistPayload {
                serialized_document: serialized.to_string(),
                width: document.workspace_width,
                height: document.workspace_height,
            });
        }
    }

    /// Step back one snapshot. Returns false at the start of history or if
    /// the snapshot cannot be restored.
    pub fn undo(&mut self, document: &mut Document, viewport: &mut Viewport) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.restore(self.current_index - 1, document, viewport)
    }

    /// Step forward one snapshot. Returns false at the tip.
    pub fn redo(&mut self, document: &mut Document, viewport: &mut Viewport) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.restore(self.current_index + 1, document, viewport)
    }

    fn restore(&mut self, target: usize, document: &mut Document, viewport: &mut Viewport) -> bool {
        self.replaying = true;
        let snapshot = &self.snapshots[target];
        let restored = match Document::from_json(&snapshot.document_state) {
            Ok(restored) => {
                *document = restored;
                if let Some(coeffs) = snapshot.viewport {
                    viewport.set_coeffs(coeffs);
                }
                self.current_index = target;
                true
            }
            Err(e) => {
                log::error!("Failed to restore snapshot {}: {}", target, e);
                false
            }
        };
        self.replaying = false;
        restored
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0 && !self.snapshots.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.current_index + 1 < self.snapshots.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{DrawableObject, Geometry, ShapeGeometry, Transform};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn add_rect(doc: &mut Document, x: f64) {
        doc.add(
            DrawableObject::new(Geometry::Shape(ShapeGeometry::rect(10.0, 10.0)))
                .with_transform(Transform::at(x, 0.0)),
        )
        .unwrap();
    }

    fn setup() -> (HistoryManager, Document, Viewport) {
        let doc = Document::default();
        let viewport = Viewport::default();
        let mut history = HistoryManager::new();
        history.initialize(&doc, &viewport).unwrap();
        (history, doc, viewport)
    }

    #[test]
    fn test_initialize() {
        let (history, _, _) = setup();
        assert_eq!(history.len(), 1);
        assert_eq!(history.current_index(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo() {
        let (mut history, mut doc, mut viewport) = setup();
        add_rect(&mut doc, 0.0);
        history.commit(&doc, &viewport, false).unwrap();
        assert_eq!(doc.len(), 1);

        assert!(history.undo(&mut doc, &mut viewport));
        assert_eq!(doc.len(), 0);
        assert!(!history.undo(&mut doc, &mut viewport));

        assert!(history.redo(&mut doc, &mut viewport));
        assert_eq!(doc.len(), 1);
        assert!(!history.redo(&mut doc, &mut viewport));
    }

    #[test]
    fn test_commit_after_undo_truncates() {
        let (mut history, mut doc, mut viewport) = setup();
        for x in [0.0, 10.0, 20.0] {
            add_rect(&mut doc, x);
            history.commit(&doc, &viewport, false).unwrap();
        }
        assert_eq!(history.len(), 4);
        history.undo(&mut doc, &mut viewport);
        history.undo(&mut doc, &mut viewport);
        add_rect(&mut doc, 99.0);
        let snapshot = history.commit(&doc, &viewport, false).unwrap();
        assert_eq!(snapshot.index, 2);
        assert_eq!(history.len(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_skip_record_still_persists() {
        let (mut history, mut doc, viewport) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        history.set_persistence_hook(move |p: &PersistPayload| sink.borrow_mut().push(p.clone()));
        add_rect(&mut doc, 0.0);
        history.commit(&doc, &viewport, true).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].width, doc.workspace_width);
        assert_eq!(seen.borrow()[0].serialized_document, doc.to_json().unwrap());
    }

    #[test]
    fn test_viewport_is_restored() {
        let (mut history, mut doc, mut viewport) = setup();
        viewport.zoom = 2.0;
        add_rect(&mut doc, 0.0);
        history.commit(&doc, &viewport, false).unwrap();
        assert!(history.undo(&mut doc, &mut viewport));
        assert_eq!(viewport.zoom, 1.0);
        assert!(history.redo(&mut doc, &mut viewport));
        assert_eq!(viewport.zoom, 2.0);
    }

    #[test]
    fn test_corrupt_snapshot_leaves_state_untouched() {
        let (mut history, mut doc, mut viewport) = setup();
        add_rect(&mut doc, 0.0);
        history.commit(&doc, &viewport, false).unwrap();
        history.snapshots[0].document_state = "{not json".to_string();
        let before = doc.clone();
        assert!(!history.undo(&mut doc, &mut viewport));
        assert_eq!(doc, before);
        assert_eq!(history.current_index(), 1);
        assert!(!history.is_replaying());
    }
}
