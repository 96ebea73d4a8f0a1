//! SVG ingestion: normalize untrusted markup, test that it renders, degrade
//! it when it does not, and convert it into document objects.

mod cleanup;
mod export;
mod import;
mod render;
mod xml;

pub use export::document_to_svg;
pub use import::{IMPORT_GROUP_NAME, ImportOutcome, PLACEHOLDER_GROUP_NAME, SvgImporter};
pub use render::{Clock, ManualClock, RenderPoll, RenderSurface, SystemClock, UsvgSurface, run_with_deadline};
pub use xml::{MAX_ELEMENT_DEPTH, RoxmlPort, SVG_NS, XLINK_NS, XmlElement, XmlNode, XmlPort, element_depth};

use crate::config::EngineConfig;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use thiserror::Error;

/// SVG errors. These never escape [`SvgPipeline::normalize`]; they describe
/// why a pass was abandoned.
#[derive(Debug, Error)]
pub enum SvgError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("Root element is <{0}>, not <svg>")]
    NotSvg(String),
    #[error("Input is empty or contains NUL bytes")]
    Unusable,
    #[error("Elements nest {0} deep, more than {max} allowed", max = xml::MAX_ELEMENT_DEPTH)]
    TooDeep(usize),
}

pub type SvgResult<T> = Result<T, SvgError>;

/// How much repair the markup needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Compatibility {
    /// Parsed as-is; only the minimal pass was applied.
    Success,
    /// Needed aggressive repair, or failed the render test.
    Warning,
    /// Unrecoverable; the placeholder was substituted.
    Error,
}

/// Outcome of normalizing one input. Always fully populated.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgIngestionResult {
    pub normalized_markup: String,
    /// `data:image/svg+xml;base64,...` of the normalized markup.
    pub preview_data_url: String,
    pub compatibility: Compatibility,
}

/// Base64 SVG data URL.
pub fn svg_data_url(markup: &str) -> String {
    format!("data:image/svg+xml;base64,{}", BASE64.encode(markup.as_bytes()))
}

/// Markup shown in place of an SVG that could not be recovered.
fn placeholder_source(size: f64) -> String {
    let half = crate::path::format_number(size / 2.0);
    let size = crate::path::format_number(size);
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {size} {size}" width="{size}" height="{size}"><rect width="{size}" height="{size}" fill="#f0f0f0" stroke="#ff0000" stroke-width="8"/><text x="{half}" y="{half}" font-family="Arial" font-size="48" fill="#ff0000" text-anchor="middle">Invalid SVG</text></svg>"##
    )
}

/// The ingestion pipeline with injected XML and render ports.
pub struct SvgPipeline {
    xml: Box<dyn XmlPort>,
    surface: Box<dyn RenderSurface>,
    clock: Box<dyn Clock>,
    timeout: Duration,
    default_size: f64,
}

impl Default for SvgPipeline {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl std::fmt::Debug for SvgPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgPipeline")
            .field("timeout", &self.timeout)
            .field("default_size", &self.default_size)
            .finish_non_exhaustive()
    }
}

impl SvgPipeline {
    /// Pipeline with the `roxmltree` port, a `usvg` surface and the system clock.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            xml: Box::new(RoxmlPort),
            surface: Box::new(UsvgSurface::new()),
            clock: Box::new(SystemClock::default()),
            timeout: config.render_timeout(),
            default_size: config.default_svg_size,
        }
    }

    pub fn with_xml_port(mut self, xml: impl XmlPort + 'static) -> Self {
        self.xml = Box::new(xml);
        self
    }

    pub fn with_surface(mut self, surface: impl RenderSurface + 'static) -> Self {
        self.surface = Box::new(surface);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn xml(&self) -> &dyn XmlPort {
        self.xml.as_ref()
    }

    pub fn default_size(&self) -> f64 {
        self.default_size
    }

    /// Normalize untrusted markup. Never fails: the worst case is the
    /// placeholder with [`Compatibility::Error`].
    pub fn normalize(&self, raw: &str) -> SvgIngestionResult {
        if raw.trim().is_empty() || raw.contains('\0') {
            log::warn!("Rejecting SVG input: {}", SvgError::Unusable);
            return self.placeholder();
        }
        let depth = element_depth(raw);
        if depth > MAX_ELEMENT_DEPTH {
            log::warn!("Rejecting SVG input: {}", SvgError::TooDeep(depth));
            return self.placeholder();
        }

        match self.minimal_pass(raw) {
            Ok(markup) => return self.result(markup, Compatibility::Success),
            Err(e) => log::debug!("Minimal pass failed: {}", e),
        }

        match self.minimal_pass(&aggressive_repair(raw)) {
            Ok(markup) => {
                log::warn!("SVG needed aggressive repair");
                self.result(markup, Compatibility::Warning)
            }
            Err(e) => {
                log::warn!("SVG could not be repaired: {}", e);
                self.placeholder()
            }
        }
    }

    /// Parse, apply structural repairs and serialize.
    fn minimal_pass(&self, markup: &str) -> SvgResult<String> {
        let mut root = self.xml.parse(markup)?;
        if root.local_name() != "svg" {
            return Err(SvgError::NotSvg(root.name));
        }
        cleanup::clean_tree(&mut root, self.default_size);
        Ok(self.xml.serialize(&root))
    }

    fn result(&self, normalized_markup: String, compatibility: Compatibility) -> SvgIngestionResult {
        SvgIngestionResult {
            preview_data_url: svg_data_url(&normalized_markup),
            normalized_markup,
            compatibility,
        }
    }

    /// The placeholder, itself normalized so it is stable under re-normalization.
    pub fn placeholder(&self) -> SvgIngestionResult {
        let source = placeholder_source(self.default_size);
        let markup = self.minimal_pass(&source).unwrap_or(source);
        self.result(markup, Compatibility::Error)
    }

    /// Whether the markup renders at least one primitive before the deadline.
    pub fn test_render(&mut self, markup: &str) -> bool {
        run_with_deadline(self.surface.as_mut(), self.clock.as_ref(), self.timeout, markup)
    }

    /// Strip definitions, stylesheets, classes and imports, then re-run the
    /// minimal pass.
    pub fn degrade(&self, markup: &str) -> String {
        let stripped = match self.xml.parse(markup) {
            Ok(mut root) => {
                cleanup::strip_for_degrade(&mut root);
                self.xml.serialize(&root)
            }
            Err(_) => cleanup::strip_for_degrade_text(markup),
        };
        self.normalize(&stripped).normalized_markup
    }
}

/// Textual repairs for markup that does not parse.
fn aggressive_repair(raw: &str) -> String {
    let text = cleanup::extract_svg_fragment(raw);
    let text = cleanup::strip_external_imports(text);
    let text = cleanup::escape_stray_ampersands(&text);
    cleanup::ensure_namespace_text(&text)
}
