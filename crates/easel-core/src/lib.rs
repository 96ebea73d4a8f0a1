//! Easel Core Library
//!
//! Document editing engine for the Easel canvas editor: a scene graph with
//! snapshot undo/redo, alignment snapping, SVG ingestion and compound path
//! decomposition, driven through [`EngineContext`].

pub mod config;
pub mod document;
pub mod engine;
pub mod history;
pub mod objects;
pub mod path;
pub mod snap;
pub mod storage;
pub mod svg;
pub mod viewport;

pub use config::{ConfigError, EngineConfig};
pub use document::{Document, DocumentError, DocumentResult};
pub use engine::{CommandOutcome, EngineContext};
pub use history::{HistoryManager, PersistPayload, PersistenceHook, Snapshot};
pub use objects::{DrawableObject, Geometry, ObjectId, ObjectKind, Paint, Style, Transform};
pub use path::{Decomposition, PathCommand, PathData, PathError};
pub use snap::{GuideAxis, Guideline, SnapEngine, SnapOutcome};
pub use svg::{Compatibility, SvgImporter, SvgIngestionResult, SvgPipeline};
pub use viewport::Viewport;
