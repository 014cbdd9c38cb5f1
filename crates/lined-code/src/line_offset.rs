//! Translation between tree points and line-relative character offsets.
//!
//! A line offset is a `(line, offset)` pair with `offset` in `0..=line length`. Selection
//! reasoning happens in line offsets because runs are destroyed and recreated on every rebuild.

use crate::document::{Document, NodeId, NodeKind};
use crate::selection::{Point, PointKind};
use crate::text::{char_len, char_prefix, is_tab_or_space, split_at_char};

/// A run plus an offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOffset {
    /// The run.
    pub run: NodeId,
    /// Character offset inside the run.
    pub offset: usize,
}

/// Line-relative offset of `point`, or `None` if the point is not inside a code line.
///
/// A point on an empty line is always 0. An element point on a non-empty line counts the text
/// of the children before it.
pub fn line_offset(doc: &Document, point: &Point) -> Option<usize> {
    match doc.kind(point.node)? {
        NodeKind::CodeLine => {
            let children = doc.children(point.node);
            if children.is_empty() {
                return Some(0);
            }
            let upto = match point.kind {
                PointKind::Element => point.offset,
                PointKind::Text => 0,
            };
            Some(
                children
                    .iter()
                    .take(upto)
                    .map(|&child| doc.text_len(child))
                    .sum(),
            )
        }
        NodeKind::CodeRun => {
            let line = doc.line_of(point.node)?;
            let before: usize = doc
                .children(line)
                .iter()
                .take_while(|&&child| child != point.node)
                .map(|&child| doc.text_len(child))
                .sum();
            Some(before + point.offset.min(doc.text_len(point.node)))
        }
        _ => None,
    }
}

/// The first run whose cumulative length reaches `offset`, with the remainder inside it.
///
/// Returns `None` for an empty line or an offset past the end of the line.
pub fn child_from_line_offset(doc: &Document, line: NodeId, offset: usize) -> Option<RunOffset> {
    let mut consumed = 0;
    for &run in doc.children(line) {
        let len = doc.text_len(run);
        if consumed + len >= offset {
            return Some(RunOffset {
                run,
                offset: offset - consumed,
            });
        }
        consumed += len;
    }
    None
}

/// A point addressing `offset` on `line`.
///
/// An empty line yields an element point on the line itself. An offset past the end of a
/// non-empty line is clamped to the end of its last run.
pub fn point_for_line_offset(doc: &Document, line: NodeId, offset: usize) -> Point {
    if let Some(found) = child_from_line_offset(doc, line, offset) {
        return Point::text(found.run, found.offset);
    }
    match doc.last_child(line) {
        Some(run) => Point::text(run, doc.text_len(run)),
        None => Point::element(line, 0),
    }
}

/// Collapse the document selection to `offset` on `line`.
pub fn select_line_offset(doc: &mut Document, line: NodeId, offset: usize) {
    let point = point_for_line_offset(doc, line, offset);
    doc.select_caret(point);
}

/// Index of the first character that is not a tab or space.
///
/// The scan covers the text up to `upto` (the whole line when `None`). If that prefix is all
/// whitespace its length is returned.
pub fn first_character_index(doc: &Document, line: NodeId, upto: Option<usize>) -> usize {
    let text = doc.text_content(line);
    let scanned = match upto {
        Some(upto) => char_prefix(&text, upto),
        None => text.as_str(),
    };
    scanned
        .chars()
        .position(|c| !is_tab_or_space(c))
        .unwrap_or_else(|| char_len(scanned))
}

/// Leading tab/space run of a line.
pub fn leading_whitespace(doc: &Document, line: NodeId) -> String {
    doc.text_content(line)
        .chars()
        .take_while(|&c| is_tab_or_space(c))
        .collect()
}

/// Line text split at a line offset.
pub fn split_line_text(doc: &Document, line: NodeId, offset: usize) -> (String, String) {
    let text = doc.text_content(line);
    let (before, after) = split_at_char(&text, offset);
    (before.to_string(), after.to_string())
}

/// 1-based position of a line among its block's lines.
pub fn line_number(doc: &Document, line: NodeId) -> Option<usize> {
    doc.index_in_parent(line).map(|index| index + 1)
}

/// A point expressed as a line offset, independent of run identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePoint {
    /// The line.
    pub line: NodeId,
    /// Offset in `0..=line length`.
    pub offset: usize,
}

impl LinePoint {
    /// Resolve a tree point, or `None` if it is not inside a code line.
    pub fn from_point(doc: &Document, point: &Point) -> Option<Self> {
        Some(Self {
            line: doc.line_of(point.node)?,
            offset: line_offset(doc, point)?,
        })
    }

    /// Tree point for this line offset (see [`point_for_line_offset`]).
    pub fn to_point(self, doc: &Document) -> Point {
        point_for_line_offset(doc, self.line, self.offset)
    }
}

/// The document selection captured as line offsets, so it survives a rebuild of its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedSelection {
    /// Anchor, if it was inside a code line.
    pub anchor: Option<LinePoint>,
    /// Focus, if it was inside a code line.
    pub focus: Option<LinePoint>,
}

impl SavedSelection {
    /// Capture the current selection. `None` without a selection.
    pub fn capture(doc: &Document) -> Option<Self> {
        let selection = doc.selection()?;
        Some(Self {
            anchor: LinePoint::from_point(doc, &selection.anchor),
            focus: LinePoint::from_point(doc, &selection.focus),
        })
    }

    /// Re-point every captured endpoint whose line is still alive.
    pub fn restore(&self, doc: &mut Document) {
        let Some(mut selection) = doc.selection().copied() else {
            return;
        };
        if let Some(anchor) = self.anchor.filter(|p| doc.is(p.line, NodeKind::CodeLine)) {
            selection.anchor = anchor.to_point(doc);
        }
        if let Some(focus) = self.focus.filter(|p| doc.is(p.line, NodeKind::CodeLine)) {
            selection.focus = focus.to_point(doc);
        }
        doc.set_selection(selection);
    }
}
