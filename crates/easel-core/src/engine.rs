//! The editing context: owns the document, history, snapping, viewport and
//! SVG pipeline, and exposes the command surface.
//!
//! Every command runs to completion and reports a [`CommandOutcome`]; errors
//! from the components are logged and turned into `success: false`.

use crate::config::EngineConfig;
use crate::document::{Document, DocumentResult};
use crate::history::{HistoryManager, PersistenceHook};
use crate::objects::{DrawableObject, ObjectId, Paint, Transform};
use crate::path::{Decomposition, decompose_object};
use crate::snap::{Guideline, SnapEngine};
use crate::svg::{SvgImporter, SvgIngestionResult, SvgPipeline};
use crate::viewport::Viewport;
use kurbo::{Size, Vec2};
use std::collections::HashSet;

/// What a command did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub success: bool,
    /// Objects created, removed or restored, depending on the command.
    pub count: usize,
    /// Selection after the command.
    pub selection: Vec<ObjectId>,
}

/// Offset applied to each successive paste.
pub const PASTE_OFFSET: f64 = 10.0;

/// An in-progress drag or scale.
#[derive(Debug, Clone, Copy)]
struct ActiveTransform {
    id: ObjectId,
    start: Transform,
}

#[derive(Debug)]
pub struct EngineContext {
    config: EngineConfig,
    document: Document,
    history: HistoryManager,
    snap: SnapEngine,
    viewport: Viewport,
    pipeline: SvgPipeline,
    selection: Vec<ObjectId>,
    active_transform: Option<ActiveTransform>,
    clipboard: Vec<DrawableObject>,
    fit_area: Option<Size>,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineContext {
    /// A context with an empty document recorded as history index 0.
    pub fn new(config: EngineConfig) -> Self {
        let mut snap = SnapEngine::new(config.snap_threshold);
        snap.set_enabled(config.snap_enabled);
        let mut context = Self {
            document: Document::new(config.workspace_width, config.workspace_height),
            history: HistoryManager::new(),
            snap,
            viewport: Viewport::new(),
            pipeline: SvgPipeline::new(&config),
            selection: Vec::new(),
            active_transform: None,
            clipboard: Vec::new(),
            fit_area: None,
            config,
        };
        context.reset_history();
        context
    }

    /// Replace the SVG pipeline, e.g. to inject a render surface or clock.
    pub fn with_pipeline(mut self, pipeline: SvgPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    fn reset_history(&mut self) {
        if let Err(e) = self.history.initialize(&self.document, &self.viewport) {
            log::error!("Failed to record initial document state: {}", e);
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct document access. Changes are recorded at the next [`Self::commit`].
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn snap(&self) -> &SnapEngine {
        &self.snap
    }

    pub fn snap_mut(&mut self) -> &mut SnapEngine {
        &mut self.snap
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn pipeline(&self) -> &SvgPipeline {
        &self.pipeline
    }

    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    pub fn set_persistence_hook(&mut self, hook: impl PersistenceHook + 'static) {
        self.history.set_persistence_hook(hook);
    }

    /// Swap in a loaded document and restart history from it.
    pub fn load_document(&mut self, document: Document) {
        log::info!(
            "Loaded document {} ({} objects)",
            document.id,
            document.len()
        );
        self.document = document;
        self.selection.clear();
        self.active_transform = None;
        self.snap.release();
        self.reset_history();
    }

    pub fn load_json(&mut self, json: &str) -> DocumentResult<()> {
        let document = Document::from_json(json)?;
        self.load_document(document);
        Ok(())
    }

    /// Auto-zoom so the workspace fills the configured share of `area`.
    pub fn fit_viewport(&mut self, area: Size) {
        self.fit_area = Some(area);
        self.viewport.fit_workspace(
            self.document.workspace_rect(),
            area,
            self.config.viewport_zoom_ratio,
        );
    }

    pub fn export_svg(&self) -> String {
        self.document.to_svg()
    }

    fn outcome(&self, success: bool, count: usize) -> CommandOutcome {
        CommandOutcome {
            success,
            count,
            selection: self.selection.clone(),
        }
    }

    fn record(&mut self) -> bool {
        match self.history.commit(&self.document, &self.viewport, false) {
            Ok(snapshot) => {
                log::debug!("Committed snapshot {}", snapshot.index);
                true
            }
            Err(e) => {
                log::error!("Commit failed: {}", e);
                false
            }
        }
    }

    /// Record the current state as a new history entry.
    pub fn commit(&mut self) -> CommandOutcome {
        let success = self.record();
        self.outcome(success, usize::from(success))
    }

    /// Add an object on top, select it and commit.
    pub fn add_object(&mut self, object: DrawableObject) -> CommandOutcome {
        match self.document.add(object) {
            Ok(id) => {
                self.selection = vec![id];
                let success = self.record();
                self.outcome(success, 1)
            }
            Err(e) => {
                log::warn!("Rejected object: {}", e);
                self.outcome(false, 0)
            }
        }
    }

    /// Select top-level objects. Unknown ids and the workspace are dropped.
    pub fn select(&mut self, ids: &[ObjectId]) -> CommandOutcome {
        let mut seen = HashSet::new();
        let mut dropped = 0;
        self.selection.clear();
        for &id in ids {
            if self.document.position(id).is_none_or(|index| index == 0) {
                dropped += 1;
            } else if seen.insert(id) {
                self.selection.push(id);
            }
        }
        self.outcome(dropped == 0, self.selection.len())
    }

    /// Remove every selected object and commit.
    pub fn delete_selected(&mut self) -> CommandOutcome {
        let mut removed = 0;
        for id in std::mem::take(&mut self.selection) {
            match self.document.remove(id) {
                Ok(_) => removed += 1,
                Err(e) => log::warn!("Cannot delete {}: {}", id, e),
            }
        }
        if removed == 0 {
            return self.outcome(false, 0);
        }
        let success = self.record();
        self.outcome(success, removed)
    }

    /// Copy the selected objects, back to front, replacing the clipboard.
    pub fn copy_selected(&mut self) -> CommandOutcome {
        self.clipboard = self
            .document
            .content()
            .filter(|o| self.selection.contains(&o.id()))
            .cloned()
            .collect();
        log::debug!("Copied {} objects", self.clipboard.len());
        self.outcome(!self.clipboard.is_empty(), self.clipboard.len())
    }

    /// Insert fresh copies of the clipboard on top, offset from the last
    /// paste, select them and commit.
    pub fn paste(&mut self) -> CommandOutcome {
        if self.clipboard.is_empty() {
            return self.outcome(false, 0);
        }
        let offset = Vec2::new(PASTE_OFFSET, PASTE_OFFSET);
        let mut pasted = Vec::with_capacity(self.clipboard.len());
        for stored in &mut self.clipboard {
            stored.translate(offset);
            let mut copy = stored.clone();
            copy.regenerate_ids();
            match self.document.add(copy) {
                Ok(id) => pasted.push(id),
                Err(e) => log::warn!("Cannot paste {}: {}", stored.id(), e),
            }
        }
        if pasted.is_empty() {
            return self.outcome(false, 0);
        }
        let count = pasted.len();
        self.selection = pasted;
        let success = self.record();
        self.outcome(success, count)
    }

    /// Change the workspace background and commit.
    pub fn set_workspace_fill(&mut self, fill: Paint) -> CommandOutcome {
        self.document.set_workspace_fill(fill);
        let success = self.record();
        self.outcome(success, usize::from(success))
    }

    /// Resize the workspace, re-fit the viewport to the last fitted area and
    /// commit. Non-positive or non-finite sizes are rejected.
    pub fn resize_workspace(&mut self, width: f64, height: f64) -> CommandOutcome {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            log::warn!("Rejecting workspace size {}x{}", width, height);
            return self.outcome(false, 0);
        }
        self.document.resize_workspace(width, height);
        if let Some(area) = self.fit_area {
            self.fit_viewport(area);
        }
        let success = self.record();
        self.outcome(success, usize::from(success))
    }

    /// Split selected compound paths into sub-paths and dissolve selected
    /// groups. The new objects take the originals' z-positions and become
    /// the selection.
    ///
    /// When nothing could be split the document and history are untouched and
    /// the outcome is `success: false, count: 0`.
    pub fn decompose_selected(&mut self) -> CommandOutcome {
        let mut produced = Vec::new();
        let mut kept = Vec::new();
        for id in self.selection.clone() {
            let decomposition = match self.document.get(id) {
                Some(object) => decompose_object(object),
                None => continue,
            };
            match decomposition {
                Decomposition::Split(parts) => match self.document.replace(id, parts) {
                    Ok(ids) => produced.extend(ids),
                    Err(e) => {
                        log::warn!("Cannot decompose {}: {}", id, e);
                        kept.push(id);
                    }
                },
                Decomposition::Unchanged | Decomposition::NotAPath => kept.push(id),
            }
        }

        if produced.is_empty() {
            log::debug!("Nothing to decompose");
            return self.outcome(false, 0);
        }
        let count = produced.len();
        kept.extend(produced);
        self.selection = kept;
        let success = self.record();
        self.outcome(success, count)
    }

    pub fn undo(&mut self) -> CommandOutcome {
        let success = self.history.undo(&mut self.document, &mut self.viewport);
        self.after_replay(success)
    }

    pub fn redo(&mut self) -> CommandOutcome {
        let success = self.history.redo(&mut self.document, &mut self.viewport);
        self.after_replay(success)
    }

    fn after_replay(&mut self, success: bool) -> CommandOutcome {
        if success {
            self.active_transform = None;
            self.snap.release();
            let document = &self.document;
            self.selection.retain(|id| document.position(*id).is_some());
        }
        self.outcome(success, usize::from(success))
    }

    /// Ingest raw SVG, add the resulting group (or placeholder), select it
    /// and commit.
    pub fn import_svg(&mut self, raw: &str) -> (CommandOutcome, SvgIngestionResult) {
        let workspace = self.document.workspace_rect();
        let outcome = SvgImporter::new(&mut self.pipeline, self.config.import_fit_ratio)
            .import(raw, workspace);
        log::info!(
            "Imported SVG as {:?} ({} children)",
            outcome.result.compatibility,
            outcome.object.children().len()
        );
        let command = self.add_object(outcome.object);
        (command, outcome.result)
    }

    /// Start dragging or scaling a top-level object.
    pub fn begin_transform(&mut self, id: ObjectId) -> CommandOutcome {
        match self.document.position(id) {
            Some(index) if index > 0 => {
                let start = self.document.objects()[index].transform;
                self.active_transform = Some(ActiveTransform { id, start });
                self.selection = vec![id];
                self.outcome(true, 1)
            }
            _ => {
                log::warn!("Cannot transform {}", id);
                self.outcome(false, 0)
            }
        }
    }

    /// Apply one frame of an interactive transform and snap it.
    ///
    /// Nothing is committed. Non-finite transforms are ignored.
    pub fn update_transform(&mut self, transform: Transform) -> Vec<Guideline> {
        let Some(active) = self.active_transform else {
            return Vec::new();
        };
        if !transform.is_finite() {
            log::warn!("Ignoring non-finite transform for {}", active.id);
            return Vec::new();
        }
        let Some((target, others)) = self.document.split_target_mut(active.id) else {
            self.active_transform = None;
            return Vec::new();
        };
        target.transform = transform;
        self.snap.adjust(target, others).guidelines
    }

    /// Finish the interactive transform: clear guidelines and commit if the
    /// object moved.
    pub fn end_transform(&mut self) -> CommandOutcome {
        self.snap.release();
        let Some(active) = self.active_transform.take() else {
            return self.outcome(false, 0);
        };
        let changed = self
            .document
            .get(active.id)
            .is_some_and(|o| o.transform != active.start);
        if !changed {
            return self.outcome(true, 0);
        }
        let success = self.record();
        self.outcome(success, 1)
    }

    /// Abort the interactive transform and put the object back.
    pub fn cancel_transform(&mut self) {
        self.snap.release();
        if let Some(active) = self.active_transform.take() {
            if let Some(object) = self.document.get_mut(active.id) {
                object.transform = active.start;
            }
        }
    }

    pub fn is_transforming(&self) -> bool {
        self.active_transform.is_some()
    }
}
