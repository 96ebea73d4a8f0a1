//! Alignment snapping between object bounds, with guidelines.

use crate::objects::{DrawableObject, ObjectId};
use kurbo::{Rect, Vec2};

/// Default snap distance in world units.
pub const DEFAULT_SNAP_THRESHOLD: f64 = 5.0;

/// Orientation of a guideline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideAxis {
    /// A vertical line at an x coordinate (left/right/center-x alignment).
    Vertical,
    /// A horizontal line at a y coordinate (top/bottom/center-y alignment).
    Horizontal,
}

/// Which features of the two spans were aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignKind {
    StartToStart,
    EndToEnd,
    StartToEnd,
    EndToStart,
    CenterToCenter,
}

impl AlignKind {
    /// Comparison order; earlier kinds win ties.
    pub const ALL: [AlignKind; 5] = [
        AlignKind::StartToStart,
        AlignKind::EndToEnd,
        AlignKind::StartToEnd,
        AlignKind::EndToStart,
        AlignKind::CenterToCenter,
    ];
}

/// A visual alignment hint. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guideline {
    pub axis: GuideAxis,
    /// World coordinate of the line on the perpendicular axis.
    pub coordinate: f64,
    pub kind: AlignKind,
    /// `(target, other)` ids of the aligned pair.
    pub source_pair: (ObjectId, ObjectId),
}

/// Result of one snap adjustment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapOutcome {
    /// Correction applied to the target's position.
    pub delta: Vec2,
    pub guidelines: Vec<Guideline>,
}

impl SnapOutcome {
    pub fn is_snapped(&self) -> bool {
        !self.guidelines.is_empty()
    }
}

/// Extent of a rectangle along one axis.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: f64,
    end: f64,
}

impl Span {
    fn horizontal(rect: Rect) -> Self {
        Self {
            start: rect.x0,
            end: rect.x1,
        }
    }

    fn vertical(rect: Rect) -> Self {
        Self {
            start: rect.y0,
            end: rect.y1,
        }
    }

    fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// `(target feature, other feature)` for an alignment kind.
    fn features(&self, other: &Span, kind: AlignKind) -> (f64, f64) {
        match kind {
            AlignKind::StartToStart => (self.start, other.start),
            AlignKind::EndToEnd => (self.end, other.end),
            AlignKind::StartToEnd => (self.start, other.end),
            AlignKind::EndToStart => (self.end, other.start),
            AlignKind::CenterToCenter => (self.center(), other.center()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    correction: f64,
    coordinate: f64,
    kind: AlignKind,
    other: ObjectId,
}

/// Best alignment on one axis: strictly under `threshold`, minimum distance,
/// first encountered on ties.
fn best_candidate(
    target: Span,
    others: &[(ObjectId, Span)],
    threshold: f64,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for (other_id, other) in others {
        for kind in AlignKind::ALL {
            let (mine, theirs) = target.features(other, kind);
            let correction = theirs - mine;
            if correction.abs() >= threshold {
                continue;
            }
            if best.is_none_or(|b| correction.abs() < b.correction.abs()) {
                best = Some(Candidate {
                    correction,
                    coordinate: theirs,
                    kind,
                    other: *other_id,
                });
            }
        }
    }
    best
}

/// Snaps a manipulated object's bounds to other objects' bounds.
#[derive(Debug, Clone)]
pub struct SnapEngine {
    threshold: f64,
    enabled: bool,
    guidelines: Vec<Guideline>,
}

impl Default for SnapEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_THRESHOLD)
    }
}

impl SnapEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            enabled: true,
            guidelines: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.guidelines.clear();
        }
    }

    /// Guidelines from the most recent adjustment.
    pub fn guidelines(&self) -> &[Guideline] {
        &self.guidelines
    }

    /// Snap `target` against `others`, moving it by the correction.
    ///
    /// Invisible objects and the target itself are skipped. The x and y axes
    /// are resolved independently.
    pub fn adjust<'a>(
        &mut self,
        target: &mut DrawableObject,
        others: impl IntoIterator<Item = &'a DrawableObject>,
    ) -> SnapOutcome {
        self.guidelines.clear();
        if !self.enabled {
            return SnapOutcome::default();
        }

        let target_id = target.id();
        let bounds = target.bounds();
        let other_bounds: Vec<(ObjectId, Rect)> = others
            .into_iter()
            .filter(|o| o.id() != target_id && o.is_visible())
            .map(|o| (o.id(), o.bounds()))
            .collect();

        let xs: Vec<(ObjectId, Span)> = other_bounds
            .iter()
            .map(|(id, r)| (*id, Span::horizontal(*r)))
            .collect();
        let ys: Vec<(ObjectId, Span)> = other_bounds
            .iter()
            .map(|(id, r)| (*id, Span::vertical(*r)))
            .collect();

        let mut outcome = SnapOutcome::default();
        if let Some(c) = best_candidate(Span::horizontal(bounds), &xs, self.threshold) {
            outcome.delta.x = c.correction;
            outcome.guidelines.push(Guideline {
                axis: GuideAxis::Vertical,
                coordinate: c.coordinate,
                kind: c.kind,
                source_pair: (target_id, c.other),
            });
        }
        if let Some(c) = best_candidate(Span::vertical(bounds), &ys, self.threshold) {
            outcome.delta.y = c.correction;
            outcome.guidelines.push(Guideline {
                axis: GuideAxis::Horizontal,
                coordinate: c.coordinate,
                kind: c.kind,
                source_pair: (target_id, c.other),
            });
        }

        if outcome.is_snapped() {
            target.translate(outcome.delta);
            log::debug!(
                "Snapped {} by ({:.2}, {:.2})",
                target_id,
                outcome.delta.x,
                outcome.delta.y
            );
        }
        self.guidelines = outcome.guidelines.clone();
        outcome
    }

    /// Clear guidelines (pointer released).
    pub fn release(&mut self) {
        self.guidelines.clear();
    }
}
