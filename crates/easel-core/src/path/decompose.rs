//! Splitting compound paths and dissolving groups.

use super::{PathCommand, PathData};
use crate::objects::{DrawableObject, Geometry, Transform};
use kurbo::Point;

/// Result of decomposing one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Decomposition {
    /// The object is neither a path nor a group.
    NotAPath,
    /// Nothing to split; the document should be left as it was.
    Unchanged,
    /// Replacement objects, in drawing order.
    Split(Vec<DrawableObject>),
}

impl Decomposition {
    /// Number of objects produced.
    pub fn count(&self) -> usize {
        match self {
            Decomposition::Split(parts) => parts.len(),
            _ => 0,
        }
    }
}

/// Split a command list into sub-paths.
///
/// A moveto starts a new sub-path; a closepath ends the current one. A drawing
/// command with no open sub-path gets an implicit moveto at the pen position.
/// Sub-paths containing non-finite coordinates are dropped, as are sub-paths
/// that never draw anything.
pub fn split_subpaths(commands: &[PathCommand]) -> Vec<Vec<PathCommand>> {
    let mut parts = Vec::new();
    let mut buffer: Vec<PathCommand> = Vec::new();
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;

    for &command in commands {
        match command {
            PathCommand::MoveTo(p) => {
                flush(&mut buffer, &mut parts);
                buffer.push(command);
                current = p;
                start = p;
            }
            PathCommand::Close => {
                if buffer.is_empty() {
                    continue;
                }
                buffer.push(command);
                flush(&mut buffer, &mut parts);
                current = start;
            }
            _ => {
                if buffer.is_empty() {
                    buffer.push(PathCommand::MoveTo(current));
                    start = current;
                }
                buffer.push(command);
                if let Some(p) = command.end_point() {
                    current = p;
                }
            }
        }
    }
    flush(&mut buffer, &mut parts);
    parts
}

fn flush(buffer: &mut Vec<PathCommand>, parts: &mut Vec<Vec<PathCommand>>) {
    if buffer.is_empty() {
        return;
    }
    let commands = std::mem::take(buffer);
    if !commands.iter().all(PathCommand::is_finite) {
        log::warn!("Dropping sub-path with non-finite coordinates");
        return;
    }
    if commands.iter().all(|c| matches!(c, PathCommand::MoveTo(_))) {
        log::debug!("Dropping empty sub-path");
        return;
    }
    parts.push(commands);
}

/// Split a compound path object into one object per sub-path.
///
/// Each piece inherits the source's style and name, and its transform is
/// rebased so it stays exactly where it was drawn.
pub fn decompose_path(object: &DrawableObject) -> Decomposition {
    let Geometry::Path(data) = &object.geometry else {
        return Decomposition::NotAPath;
    };
    if data.move_count() < 2 {
        return Decomposition::Unchanged;
    }
    let parts = split_subpaths(data.commands());
    if parts.is_empty() {
        log::warn!("Path {} produced no drawable sub-paths", object.id());
        return Decomposition::Unchanged;
    }

    let old_local = object.local_bounds();
    let pieces = parts
        .into_iter()
        .map(|commands| {
            let mut piece = DrawableObject::new(Geometry::Path(PathData::from_commands(commands)));
            piece.name = object.name.clone();
            piece.style = object.style.clone();
            piece.transform = object.transform.rebase(old_local, piece.local_bounds());
            piece
        })
        .collect::<Vec<_>>();
    log::debug!("Split path {} into {} pieces", object.id(), pieces.len());
    Decomposition::Split(pieces)
}

/// Dissolve a group, moving its transform into each child.
pub fn flatten_group(object: &DrawableObject) -> Decomposition {
    let Geometry::Group(children) = &object.geometry else {
        return Decomposition::NotAPath;
    };
    if children.is_empty() {
        return Decomposition::Unchanged;
    }
    let group_affine = object.affine();
    let flattened = children
        .iter()
        .map(|child| {
            let mut child = child.clone();
            let local = child.local_bounds();
            child.transform = Transform::from_affine(
                group_affine * child.affine(),
                local,
                child.transform.origin_x,
                child.transform.origin_y,
            );
            child.style.opacity *= object.style.opacity;
            child.style.visible &= object.style.visible;
            child
        })
        .collect();
    Decomposition::Split(flattened)
}

/// Decompose whatever can be decomposed: compound paths split, groups flatten.
pub fn decompose_object(object: &DrawableObject) -> Decomposition {
    match &object.geometry {
        Geometry::Path(_) => decompose_path(object),
        Geometry::Group(_) => flatten_group(object),
        _ => Decomposition::NotAPath,
    }
}
