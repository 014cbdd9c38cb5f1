//! Selection points and ranges.

use crate::document::{Document, NodeId};
use crate::line_offset::line_offset;
use std::cmp::Ordering;

/// What a point's offset counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// Offset is a character offset into a text node or run.
    Text,
    /// Offset is a child index of an element (a line, paragraph or block).
    Element,
}

/// A selection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    /// Node the offset refers to.
    pub node: NodeId,
    /// Character offset (text) or child index (element).
    pub offset: usize,
    /// How `offset` is interpreted.
    pub kind: PointKind,
}

impl Point {
    /// Text point.
    pub fn text(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            offset,
            kind: PointKind::Text,
        }
    }

    /// Element point.
    pub fn element(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            offset,
            kind: PointKind::Element,
        }
    }

    /// Re-point this endpoint in place.
    pub fn set(&mut self, node: NodeId, offset: usize, kind: PointKind) {
        self.node = node;
        self.offset = offset;
        self.kind = kind;
    }
}

/// An anchor/focus selection. The anchor is where the selection started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeSelection {
    /// Fixed end.
    pub anchor: Point,
    /// Moving end.
    pub focus: Point,
}

impl RangeSelection {
    /// Selection from `anchor` to `focus`.
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    /// Collapsed selection at `point`.
    pub fn caret(point: Point) -> Self {
        Self::new(point, point)
    }

    /// Returns `true` if anchor and focus name the same position.
    ///
    /// Points on one code line compare by line offset, so the end of one run and the start of
    /// the next are the same caret.
    pub fn is_collapsed(&self, doc: &Document) -> bool {
        if self.anchor == self.focus {
            return true;
        }
        let same_line = doc
            .line_of(self.anchor.node)
            .is_some_and(|line| doc.line_of(self.focus.node) == Some(line));
        same_line && line_offset(doc, &self.anchor) == line_offset(doc, &self.focus)
    }

    /// Returns `true` if the focus comes before the anchor in document order.
    pub fn is_backward(&self, doc: &Document) -> bool {
        doc.compare_points(&self.focus, &self.anchor) == Ordering::Less
    }

    /// `(top, bottom)` endpoints in document order.
    pub fn ordered(&self, doc: &Document) -> (Point, Point) {
        if self.is_backward(doc) {
            (self.focus, self.anchor)
        } else {
            (self.anchor, self.focus)
        }
    }
}
