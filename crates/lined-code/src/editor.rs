//! Structural edits on code blocks.
//!
//! Every operation resolves the current selection into [`SelectedLines`] once and works from
//! that context. An operation that cannot resolve it (selection outside a block, lines in two
//! blocks) leaves the tree alone and reports `false`/`None`.

use crate::document::{Document, NodeId, NodeKind};
use crate::error::{CodeError, CodeResult};
use crate::line_offset::{
    LinePoint, first_character_index, leading_whitespace, line_offset, select_line_offset,
    split_line_text,
};
use crate::markup::{MarkupNode, import_markup};
use crate::reconcile::{
    create_code_lines, on_run_text_changed, raw_text, replace_line_code, update_every_line,
};
use crate::selection::{Point, PointKind, RangeSelection};
use crate::settings::CodeBlockOptions;
use crate::snapshot::{SerializedNode, nodes_from_json};
use crate::text::{char_len, char_prefix, insert_at_char, is_tab_or_space, remove_char};
use lined_code_lang::code_language;
use tracing::{debug, warn};

/// The selection resolved against one code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedLines {
    /// Block holding every selected line.
    pub block: NodeId,
    /// First endpoint in document order.
    pub top_point: Point,
    /// Last endpoint in document order.
    pub bottom_point: Point,
    /// Line holding `top_point`.
    pub top_line: NodeId,
    /// Line holding `bottom_point`.
    pub bottom_line: NodeId,
    /// Lines from `top_line` to `bottom_line`, inclusive.
    pub line_range: Vec<NodeId>,
    /// Line offset of `top_point`.
    pub top_offset: usize,
    /// Line offset of `bottom_point`.
    pub bottom_offset: usize,
    /// Text of `top_line` before `top_point`.
    pub text_before: String,
    /// Text of `bottom_line` after `bottom_point`.
    pub text_after: String,
    /// Anchor and focus sit at the same line offset.
    pub collapsed: bool,
    /// Focus precedes anchor.
    pub backward: bool,
}

impl SelectedLines {
    /// Resolve the document selection, or `None` if it is not inside a single code block.
    pub fn resolve(doc: &Document) -> Option<Self> {
        let selection = doc.selection()?;
        let (top_point, bottom_point) = selection.ordered(doc);
        let top_line = doc.line_of(top_point.node)?;
        let bottom_line = doc.line_of(bottom_point.node)?;
        let block = doc.block_of_line(top_line)?;
        if doc.block_of_line(bottom_line) != Some(block) {
            return None;
        }
        let lines = doc.children(block);
        let top_index = lines.iter().position(|&l| l == top_line)?;
        let bottom_index = lines.iter().position(|&l| l == bottom_line)?;
        let top_offset = line_offset(doc, &top_point)?;
        let bottom_offset = line_offset(doc, &bottom_point)?;
        Some(Self {
            block,
            top_point,
            bottom_point,
            top_line,
            bottom_line,
            line_range: lines[top_index..=bottom_index].to_vec(),
            top_offset,
            bottom_offset,
            text_before: split_line_text(doc, top_line, top_offset).0,
            text_after: split_line_text(doc, bottom_line, bottom_offset).1,
            collapsed: selection.is_collapsed(doc),
            backward: selection.is_backward(doc),
        })
    }

    fn top(&self) -> LinePoint {
        LinePoint {
            line: self.top_line,
            offset: self.top_offset,
        }
    }

    fn bottom(&self) -> LinePoint {
        LinePoint {
            line: self.bottom_line,
            offset: self.bottom_offset,
        }
    }

    fn is_locked(&self, doc: &Document) -> bool {
        doc.settings(self.block)
            .map(|settings| settings.is_block_locked)
            .unwrap_or(true)
    }
}

/// Indent or outdent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DentDirection {
    /// Prepend one tab.
    Indent,
    /// Remove one leading tab or space.
    Outdent,
}

/// Vertical direction of a line move or border navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the start of the block.
    Up,
    /// Towards the end of the block.
    Down,
}

/// Home/End target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTo {
    /// First non-whitespace character (or the caret, inside leading whitespace).
    Start,
    /// End of the line.
    End,
}

/// Clipboard content, richest format first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    /// Serialized node JSON (see [`crate::snapshot::SerializedNodes`]).
    pub nodes: Option<String>,
    /// Host-parsed markup.
    pub markup: Option<Vec<MarkupNode>>,
    /// Plain text.
    pub plain: Option<String>,
}

impl ClipboardPayload {
    /// Payload holding only plain text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            ..Self::default()
        }
    }
}

/// The code block the selection anchor sits in.
pub fn selected_block(doc: &Document) -> Option<NodeId> {
    let anchor = doc.selection()?.anchor;
    doc.enclosing_code_block(anchor.node)
}

fn select_range(doc: &mut Document, top: Point, bottom: Point, backward: bool) {
    let selection = if backward {
        RangeSelection::new(bottom, top)
    } else {
        RangeSelection::new(top, bottom)
    };
    doc.set_selection(selection);
}

fn select_line_points(doc: &mut Document, top: LinePoint, bottom: LinePoint, backward: bool) {
    let top = top.to_point(doc);
    let bottom = bottom.to_point(doc);
    select_range(doc, top, bottom, backward);
}

// ---- indent / outdent ----

fn dented_offset(direction: DentDirection, old_len: usize, new_len: usize, offset: usize) -> usize {
    match direction {
        DentDirection::Indent if new_len > old_len => offset + 1,
        DentDirection::Outdent if new_len < old_len && offset > 0 => offset - 1,
        _ => offset,
    }
}

/// Indent or outdent every selected line and shift the selection with the text.
///
/// Outdenting a line without leading whitespace leaves it (and the caret) untouched. A
/// backward range whose top sits at offset 0 keeps its top at offset 0.
pub fn handle_dents(doc: &mut Document, direction: DentDirection) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    if sel.is_locked(doc) {
        debug!("{direction:?} rejected: block {} is locked", sel.block);
        return Ok(false);
    }

    let mut top_lens = (0, 0);
    let mut bottom_lens = (0, 0);
    for &line in &sel.line_range {
        let text = doc.text_content(line);
        let dented = match direction {
            DentDirection::Indent => format!("\t{text}"),
            DentDirection::Outdent => match text.chars().next() {
                Some(c) if is_tab_or_space(c) => text[c.len_utf8()..].to_string(),
                _ => text.clone(),
            },
        };
        let lens = (char_len(&text), char_len(&dented));
        if dented != text {
            replace_line_code(doc, line, &dented)?;
        }
        if line == sel.top_line {
            top_lens = lens;
        }
        if line == sel.bottom_line {
            bottom_lens = lens;
        }
    }

    let mut top_offset = dented_offset(direction, top_lens.0, top_lens.1, sel.top_offset);
    let bottom_offset = dented_offset(direction, bottom_lens.0, bottom_lens.1, sel.bottom_offset);
    if !sel.collapsed && sel.backward && sel.top_offset == 0 {
        top_offset = 0;
    }

    let top = LinePoint {
        line: sel.top_line,
        offset: top_offset,
    };
    if sel.collapsed {
        select_line_offset(doc, top.line, top.offset);
    } else {
        let bottom = LinePoint {
            line: sel.bottom_line,
            offset: bottom_offset,
        };
        select_line_points(doc, top, bottom, sel.backward);
    }
    debug!(
        "{direction:?} {} lines in block {}",
        sel.line_range.len(),
        sel.block
    );
    Ok(true)
}

// ---- line transposition ----

/// Swap the selected line range with its neighbour in `direction`.
///
/// Returns `None` when the selection is not inside a block, otherwise whether the lines moved
/// (`Some(false)` at the edge of the block).
pub fn handle_shifting_lines(doc: &mut Document, direction: Direction) -> CodeResult<Option<bool>> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(None);
    };
    let displaced = match direction {
        Direction::Up => doc.prev_sibling(sel.top_line),
        Direction::Down => doc.next_sibling(sel.bottom_line),
    };
    let Some(displaced) = displaced else {
        debug!("move {direction:?} rejected: no room in block {}", sel.block);
        return Ok(Some(false));
    };

    match direction {
        Direction::Up => doc.insert_after(sel.bottom_line, displaced)?,
        Direction::Down => doc.insert_before(sel.top_line, displaced)?,
    }

    if sel.collapsed {
        select_line_offset(doc, sel.top_line, sel.top_offset);
    } else {
        select_line_points(doc, sel.top(), sel.bottom(), sel.backward);
    }
    debug!(
        "moved {} lines {direction:?} in block {}",
        sel.line_range.len(),
        sel.block
    );
    Ok(Some(true))
}

// ---- caret movement ----

/// Leave the block through its top or bottom edge into a fresh paragraph.
///
/// Applies only to a collapsed caret at the very start (up) or end (down) of an unlocked block
/// that has no sibling on that side.
pub fn handle_borders(doc: &mut Document, direction: Direction) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    if !sel.collapsed || sel.is_locked(doc) {
        return Ok(false);
    }
    let at_border = match direction {
        Direction::Up => {
            sel.top_offset == 0
                && doc.first_child(sel.block) == Some(sel.top_line)
                && doc.prev_sibling(sel.block).is_none()
        }
        Direction::Down => {
            sel.bottom_offset == doc.text_len(sel.bottom_line)
                && doc.last_child(sel.block) == Some(sel.bottom_line)
                && doc.next_sibling(sel.block).is_none()
        }
    };
    if !at_border {
        return Ok(false);
    }
    let paragraph = doc.create_paragraph();
    match direction {
        Direction::Up => doc.insert_before(sel.block, paragraph)?,
        Direction::Down => doc.insert_after(sel.block, paragraph)?,
    }
    doc.select_caret(Point::element(paragraph, 0));
    debug!("left block {} {direction:?}", sel.block);
    Ok(true)
}

/// Move the caret to the start or end of the focused line.
pub fn handle_move_to(doc: &mut Document, target: MoveTo) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    let focus = if sel.backward { sel.top() } else { sel.bottom() };
    let offset = match target {
        MoveTo::Start => first_character_index(doc, focus.line, Some(focus.offset)),
        MoveTo::End => doc.text_len(focus.line),
    };
    select_line_offset(doc, focus.line, offset);
    Ok(true)
}

// ---- enter ----

/// Returns `true` if Enter should leave the block instead of adding a line: the block is
/// unlocked and the caret sits on an empty last line that follows another empty line.
pub fn exit_on_return(doc: &Document) -> bool {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return false;
    };
    let Some(anchor) = doc.selection().and_then(|s| doc.line_of(s.anchor.node)) else {
        return false;
    };
    !sel.is_locked(doc)
        && doc.last_child(sel.block) == Some(anchor)
        && doc.text_len(anchor) == 0
        && doc
            .prev_sibling(anchor)
            .is_some_and(|prev| doc.text_len(prev) == 0)
}

/// Drop the two trailing blank lines (keeping at least one line) and continue in a new
/// paragraph after the block.
pub fn exit_block(doc: &mut Document) -> CodeResult<bool> {
    if !exit_on_return(doc) {
        return Ok(false);
    }
    let Some(block) = selected_block(doc) else {
        return Ok(false);
    };
    let Some(last) = doc.last_child(block) else {
        return Ok(false);
    };
    if let Some(prev) = doc.prev_sibling(last) {
        doc.remove(prev)?;
    }
    if doc.child_count(block) > 1 {
        doc.remove(last)?;
    }
    let paragraph = doc.create_paragraph();
    doc.insert_after(block, paragraph)?;
    doc.select_caret(Point::element(paragraph, 0));
    debug!("exited block {block} on return");
    Ok(true)
}

/// Replace a non-collapsed selection with `text_before + text_after` on the top line.
fn collapse_selection(doc: &mut Document, sel: &SelectedLines) -> CodeResult<()> {
    let joined = format!("{}{}", sel.text_before, sel.text_after);
    replace_line_code(doc, sel.top_line, &joined)?;
    for &line in sel.line_range.iter().skip(1) {
        doc.remove(line)?;
    }
    select_line_offset(doc, sel.top_line, char_len(&sel.text_before));
    Ok(())
}

fn resolve_collapsed(doc: &mut Document) -> CodeResult<Option<SelectedLines>> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(None);
    };
    if sel.collapsed {
        return Ok(Some(sel));
    }
    collapse_selection(doc, &sel)?;
    Ok(SelectedLines::resolve(doc))
}

/// Handle Enter inside a block: exit on a double blank line, otherwise split the line.
///
/// The new line starts with the leading whitespace before the caret (nothing in a locked
/// block) and the caret lands after it.
pub fn split_line(doc: &mut Document) -> CodeResult<bool> {
    if exit_block(doc)? {
        return Ok(true);
    }
    let Some(sel) = resolve_collapsed(doc)? else {
        return Ok(false);
    };
    let whitespace = if sel.is_locked(doc) {
        String::new()
    } else {
        let leading = leading_whitespace(doc, sel.top_line);
        char_prefix(&leading, sel.top_offset).to_string()
    };

    replace_line_code(doc, sel.top_line, &sel.text_before)?;
    let block = sel.block;
    let new_line = create_code_lines(doc, block, &format!("{whitespace}{}", sel.text_after))?;
    let Some(&new_line) = new_line.first() else {
        return Err(CodeError::Setup("line split produced no line"));
    };
    doc.insert_after(sel.top_line, new_line)?;
    select_line_offset(doc, new_line, char_len(&whitespace));
    debug!(
        "split line in block {block}, carried {} whitespace chars",
        char_len(&whitespace)
    );
    Ok(true)
}

// ---- paste ----

fn lines_if_code_block(nodes: Vec<SerializedNode>) -> Vec<SerializedNode> {
    match nodes.first() {
        Some(SerializedNode::CodeBlock(block)) => block.lines.clone(),
        _ => nodes,
    }
}

fn payload_fragments(doc: &mut Document, payload: &ClipboardPayload) -> CodeResult<Option<Vec<String>>> {
    if let Some(json) = &payload.nodes {
        match nodes_from_json(json) {
            Ok(nodes) => {
                let nodes = lines_if_code_block(nodes);
                return Ok(Some(nodes.iter().map(SerializedNode::text_content).collect()));
            }
            Err(e) => warn!("Failed to parse clipboard nodes, trying the next format: {e}"),
        }
    }
    if let Some(markup) = &payload.markup {
        let imported = import_markup(doc, markup)?;
        let sources = match imported.first() {
            Some(&first) if doc.is(first, NodeKind::CodeBlock) => doc.children(first).to_vec(),
            _ => imported.clone(),
        };
        let fragments = sources.iter().map(|&n| doc.text_content(n)).collect();
        for node in imported {
            doc.remove(node)?;
        }
        return Ok(Some(fragments));
    }
    Ok(payload.plain.clone().map(|text| vec![text]))
}

/// Paste into a block: the selected line range is replaced by the lines of
/// `text_before + pasted + text_after` and the caret lands before `text_after`.
///
/// Returns `false` when the selection is outside a block or the payload is empty.
pub fn insert_clipboard_data(doc: &mut Document, payload: &ClipboardPayload) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    let Some(fragments) = payload_fragments(doc, payload)? else {
        debug!("paste rejected: empty clipboard");
        return Ok(false);
    };
    let text = raw_text(&fragments, &sel.text_before, &sel.text_after);
    let lines = create_code_lines(doc, sel.block, &text)?;
    let start = doc
        .index_in_parent(sel.top_line)
        .ok_or(CodeError::UnknownNode(sel.top_line))?;
    doc.splice(sel.block, start, sel.line_range.len(), &lines)?;

    if let Some(&last) = lines.last() {
        let offset = doc.text_len(last).saturating_sub(char_len(&sel.text_after));
        select_line_offset(doc, last, offset);
    }
    debug!("pasted {} lines into block {}", lines.len(), sel.block);
    Ok(true)
}

// ---- flattening ----

#[derive(Debug, Clone, Copy)]
struct CapturedPoint {
    line_index: usize,
    offset: usize,
}

fn capture_in_block(doc: &Document, block: NodeId, point: &Point) -> Option<CapturedPoint> {
    let line = doc.line_of(point.node)?;
    if doc.block_of_line(line) != Some(block) {
        return None;
    }
    Some(CapturedPoint {
        line_index: doc.index_in_parent(line)?,
        offset: line_offset(doc, point)?,
    })
}

fn paragraph_point(doc: &Document, paragraph: NodeId, offset: usize) -> Point {
    match doc.first_child(paragraph) {
        Some(text) => Point::text(text, offset.min(doc.text_len(text))),
        None => Point::element(paragraph, 0),
    }
}

/// Replace a block with one plain paragraph per line. Returns the paragraphs.
///
/// With `update_selection`, selection endpoints inside the block move to the same line index
/// and offset in the new paragraphs.
pub fn convert_to_plain_text(
    doc: &mut Document,
    block: NodeId,
    update_selection: bool,
) -> CodeResult<Vec<NodeId>> {
    doc.settings(block)?;
    let parent = doc
        .parent(block)
        .ok_or(CodeError::Setup("code block is not attached"))?;
    let index = doc
        .index_in_parent(block)
        .ok_or(CodeError::UnknownNode(block))?;

    let captured = match doc.selection().copied().filter(|_| update_selection) {
        Some(selection) => Some((
            selection,
            capture_in_block(doc, block, &selection.anchor),
            capture_in_block(doc, block, &selection.focus),
        )),
        None => None,
    };

    let texts: Vec<String> = doc
        .children(block)
        .iter()
        .map(|&line| doc.text_content(line))
        .collect();
    let mut paragraphs = Vec::with_capacity(texts.len());
    for text in texts {
        let paragraph = doc.create_paragraph();
        if !text.is_empty() {
            let node = doc.create_text(text);
            doc.append(paragraph, node)?;
        }
        paragraphs.push(paragraph);
    }
    doc.splice(parent, index, 1, &paragraphs)?;

    if let Some((mut selection, anchor, focus)) = captured {
        let remap = |doc: &Document, captured: Option<CapturedPoint>, point: &mut Point| {
            if let Some(c) = captured
                && let Some(&paragraph) = paragraphs.get(c.line_index)
            {
                *point = paragraph_point(doc, paragraph, c.offset);
            }
        };
        remap(doc, anchor, &mut selection.anchor);
        remap(doc, focus, &mut selection.focus);
        doc.set_selection(selection);
    }
    debug!("flattened block {block} into {} paragraphs", paragraphs.len());
    Ok(paragraphs)
}

/// Backspace at the very start of an unlocked block flattens it to plain text.
pub fn collapse_at_start(doc: &mut Document) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    if !sel.collapsed
        || sel.top_offset != 0
        || doc.first_child(sel.block) != Some(sel.top_line)
        || sel.is_locked(doc)
    {
        return Ok(false);
    }
    convert_to_plain_text(doc, sel.block, true)?;
    Ok(true)
}

/// Code blocks among the top-level nodes touched by the selection.
pub fn code_blocks_in_selection(doc: &Document) -> Vec<NodeId> {
    top_level_range(doc)
        .into_iter()
        .filter(|&node| doc.is(node, NodeKind::CodeBlock))
        .collect()
}

fn top_level_range(doc: &Document) -> Vec<NodeId> {
    let Some(selection) = doc.selection() else {
        return Vec::new();
    };
    let (top, bottom) = selection.ordered(doc);
    let (Some(first), Some(last)) = (
        doc.top_level_ancestor(top.node),
        doc.top_level_ancestor(bottom.node),
    ) else {
        return Vec::new();
    };
    let siblings = doc.children(doc.root());
    match (
        siblings.iter().position(|&n| n == first),
        siblings.iter().position(|&n| n == last),
    ) {
        (Some(a), Some(b)) if a <= b => siblings[a..=b].to_vec(),
        _ => Vec::new(),
    }
}

// ---- typing ----

/// Type `text` at the caret. A non-collapsed selection is replaced first; text containing a
/// newline is pasted as plain text.
pub fn insert_text(doc: &mut Document, text: &str) -> CodeResult<bool> {
    if text.contains('\n') {
        return insert_clipboard_data(doc, &ClipboardPayload::plain(text));
    }
    let Some(sel) = resolve_collapsed(doc)? else {
        return Ok(false);
    };
    if text.is_empty() {
        return Ok(true);
    }
    let point = LinePoint {
        line: sel.top_line,
        offset: sel.top_offset,
    }
    .to_point(doc);
    let (run, offset) = match point.kind {
        PointKind::Text => {
            let mut updated = doc.text_content(point.node);
            insert_at_char(&mut updated, point.offset, text);
            doc.set_text(point.node, updated)?;
            (point.node, point.offset)
        }
        PointKind::Element => {
            let run = doc.create_code_run(text, None);
            doc.append(sel.top_line, run)?;
            (run, 0)
        }
    };
    doc.select_caret(Point::text(run, offset + char_len(text)));
    on_run_text_changed(doc, run)?;
    Ok(true)
}

/// Delete the selection, or the character before the caret. At the start of a line the line
/// merges into the previous one; at the start of the block the block is flattened.
pub fn delete_backward(doc: &mut Document) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    if !sel.collapsed {
        collapse_selection(doc, &sel)?;
        return Ok(true);
    }
    if sel.top_offset == 0 {
        let Some(prev) = doc.prev_sibling(sel.top_line) else {
            return collapse_at_start(doc);
        };
        let prev_len = doc.text_len(prev);
        let merged = format!("{}{}", doc.text_content(prev), doc.text_content(sel.top_line));
        replace_line_code(doc, prev, &merged)?;
        doc.remove(sel.top_line)?;
        select_line_offset(doc, prev, prev_len);
        return Ok(true);
    }
    let point = LinePoint {
        line: sel.top_line,
        offset: sel.top_offset,
    }
    .to_point(doc);
    if point.kind != PointKind::Text || point.offset == 0 {
        return Ok(false);
    }
    let mut updated = doc.text_content(point.node);
    remove_char(&mut updated, point.offset - 1);
    doc.set_text(point.node, updated)?;
    doc.select_caret(Point::text(point.node, point.offset - 1));
    on_run_text_changed(doc, point.node)?;
    Ok(true)
}

// ---- turning content into code ----

fn plain_offset(doc: &Document, top_level: NodeId, point: &Point) -> usize {
    if point.node == top_level {
        return match point.kind {
            PointKind::Element => doc
                .children(top_level)
                .iter()
                .take(point.offset)
                .map(|&c| doc.text_len(c))
                .sum(),
            PointKind::Text => point.offset,
        };
    }
    let Some(parent) = doc.parent(point.node) else {
        return 0;
    };
    let before: usize = doc
        .children(parent)
        .iter()
        .take_while(|&&c| c != point.node)
        .map(|&c| doc.text_len(c))
        .sum();
    before + point.offset
}

/// Turn the top-level nodes touched by the selection into one code block.
///
/// Paragraphs become one line each. Selected code blocks are merged: their lines before the
/// selection top and after the selection bottom are kept around the new lines, and the old
/// blocks are discarded. The selection keeps its line-relative offsets, moved onto the first
/// and last lines of the unified block. Returns the new block, or `None` without a usable
/// selection.
pub fn insert_code_block_at_selection(
    doc: &mut Document,
    language: Option<&str>,
) -> CodeResult<Option<NodeId>> {
    let Some(selection) = doc.selection().copied() else {
        return Ok(None);
    };
    let nodes = top_level_range(doc);
    let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
        return Ok(None);
    };
    let (top, bottom) = selection.ordered(doc);
    let backward = selection.is_backward(doc);

    let top_line = doc.line_of(top.node).filter(|&l| doc.block_of_line(l) == Some(first));
    let bottom_line = doc.line_of(bottom.node).filter(|&l| doc.block_of_line(l) == Some(last));
    let top_offset = match top_line {
        Some(_) => line_offset(doc, &top).unwrap_or(0),
        None => plain_offset(doc, first, &top),
    };
    let bottom_offset = match bottom_line {
        Some(_) => line_offset(doc, &bottom).unwrap_or(0),
        None => plain_offset(doc, last, &bottom),
    };

    let mut top_lines_to_merge = Vec::new();
    let mut bottom_lines_to_merge = Vec::new();
    let mut fragments = Vec::new();
    for &node in &nodes {
        if !doc.is(node, NodeKind::CodeBlock) {
            fragments.push(doc.text_content(node));
            continue;
        }
        let lines = doc.children(node).to_vec();
        let start = match top_line.filter(|_| node == first) {
            Some(line) => lines.iter().position(|&l| l == line).unwrap_or(0),
            None => 0,
        };
        let end = match bottom_line.filter(|_| node == last) {
            Some(line) => lines
                .iter()
                .position(|&l| l == line)
                .unwrap_or(lines.len().saturating_sub(1)),
            None => lines.len().saturating_sub(1),
        };
        for (i, &line) in lines.iter().enumerate() {
            if i < start {
                top_lines_to_merge.push(line);
            } else if i > end {
                bottom_lines_to_merge.push(line);
            } else {
                fragments.push(doc.text_content(line));
            }
        }
    }

    let language = language.map(str::to_string).or_else(|| {
        doc.settings(first)
            .ok()
            .map(|settings| settings.language.clone())
    });
    let options = CodeBlockOptions {
        initial_language: language,
        ..CodeBlockOptions::default()
    };
    let block = doc.create_code_block(&options);
    let new_lines = create_code_lines(doc, block, &raw_text(&fragments, "", ""))?;
    doc.clear_children(block)?;
    for &line in top_lines_to_merge
        .iter()
        .chain(&new_lines)
        .chain(&bottom_lines_to_merge)
    {
        doc.append(block, line)?;
    }
    doc.insert_before(first, block)?;
    for node in nodes {
        doc.remove(node)?;
    }
    if !top_lines_to_merge.is_empty() || !bottom_lines_to_merge.is_empty() {
        update_every_line(doc, block)?;
    }

    let unified = doc.children(block);
    if let (Some(&first_line), Some(&last_line)) = (unified.first(), unified.last()) {
        let top = LinePoint {
            line: first_line,
            offset: top_offset.min(doc.text_len(first_line)),
        };
        let bottom = LinePoint {
            line: last_line,
            offset: bottom_offset.min(doc.text_len(last_line)),
        };
        select_line_points(doc, top, bottom, backward);
    }
    debug!(
        "converted {} lines into block {block}, kept {} above and {} below",
        new_lines.len(),
        top_lines_to_merge.len(),
        bottom_lines_to_merge.len()
    );
    Ok(Some(block))
}

// ---- line classes ----

fn class_names(classes: &str) -> impl Iterator<Item = &str> {
    classes.split_whitespace()
}

/// Add whitespace-separated classes to every selected line. Returns whether any was new.
pub fn add_discrete_line_classes(doc: &mut Document, classes: &str) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    let mut added = false;
    for &line in &sel.line_range {
        if let Some(line) = doc.code_line_mut(line) {
            for class in class_names(classes) {
                added |= line.discrete_classes.insert(class.to_string());
            }
        }
    }
    Ok(added)
}

/// Remove whitespace-separated classes from every selected line. Returns whether any was set.
pub fn remove_discrete_line_classes(doc: &mut Document, classes: &str) -> CodeResult<bool> {
    let Some(sel) = SelectedLines::resolve(doc) else {
        return Ok(false);
    };
    let mut removed = false;
    for &line in &sel.line_range {
        if let Some(line) = doc.code_line_mut(line) {
            for class in class_names(classes) {
                removed |= line.discrete_classes.remove(class);
            }
        }
    }
    Ok(removed)
}

// ---- settings ----

/// Change a block's language and rebuild every line. Returns whether the language changed.
pub fn set_language(doc: &mut Document, block: NodeId, language: &str) -> CodeResult<bool> {
    let language = code_language(Some(language));
    let settings = doc.settings_mut(block)?;
    if settings.language == language {
        return Ok(false);
    }
    settings.language = language.to_string();
    update_every_line(doc, block)?;
    debug!("block {block} language set to {language}");
    Ok(true)
}

/// Flip tab activation. Returns the new value.
pub fn toggle_tabs(doc: &mut Document, block: NodeId) -> CodeResult<bool> {
    let settings = doc.settings_mut(block)?;
    settings.activate_tabs = !settings.activate_tabs;
    Ok(settings.activate_tabs)
}

/// Flip the lock. Returns the new value.
pub fn toggle_block_lock(doc: &mut Document, block: NodeId) -> CodeResult<bool> {
    let settings = doc.settings_mut(block)?;
    settings.is_block_locked = !settings.is_block_locked;
    Ok(settings.is_block_locked)
}

/// Flip line-number visibility. Returns the new value.
pub fn toggle_line_numbers(doc: &mut Document, block: NodeId) -> CodeResult<bool> {
    let settings = doc.settings_mut(block)?;
    settings.line_numbers = !settings.line_numbers;
    Ok(settings.line_numbers)
}

/// Store a new theme name.
pub fn change_theme_name(doc: &mut Document, block: NodeId, name: &str) -> CodeResult<()> {
    doc.settings_mut(block)?.theme_name = name.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::code_block_from_text;
    use pretty_assertions::assert_eq;

    fn setup(text: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let block = code_block_from_text(&mut doc, &CodeBlockOptions::default(), text).unwrap();
        doc.append(doc.root(), block).unwrap();
        (doc, block)
    }

    fn line(doc: &Document, block: NodeId, index: usize) -> NodeId {
        doc.children(block)[index]
    }

    fn caret_at(doc: &mut Document, block: NodeId, index: usize, offset: usize) {
        let l = line(doc, block, index);
        select_line_offset(doc, l, offset);
    }

    fn lines(doc: &Document, block: NodeId) -> Vec<String> {
        doc.children(block)
            .iter()
            .map(|&l| doc.text_content(l))
            .collect()
    }

    fn caret(doc: &Document) -> LinePoint {
        let selection = doc.selection().unwrap();
        LinePoint::from_point(doc, &selection.anchor).unwrap()
    }

    #[test]
    fn test_resolve_outside_block_is_none() {
        let mut doc = Document::new();
        let p = doc.create_paragraph();
        doc.append(doc.root(), p).unwrap();
        doc.select_caret(Point::element(p, 0));

        assert!(SelectedLines::resolve(&doc).is_none());
        assert!(!handle_dents(&mut doc, DentDirection::Indent).unwrap());
    }

    #[test]
    fn test_outdent_without_whitespace_is_noop() {
        let (mut doc, block) = setup("ab");
        caret_at(&mut doc, block, 0, 1);

        assert!(handle_dents(&mut doc, DentDirection::Outdent).unwrap());
        assert_eq!(lines(&doc, block), vec!["ab"]);
        assert_eq!(caret(&doc).offset, 1);
    }

    #[test]
    fn test_outdent_removes_one_space() {
        let (mut doc, block) = setup("  ab");
        caret_at(&mut doc, block, 0, 3);

        handle_dents(&mut doc, DentDirection::Outdent).unwrap();
        assert_eq!(lines(&doc, block), vec![" ab"]);
        assert_eq!(caret(&doc).offset, 2);
    }

    #[test]
    fn test_backward_range_keeps_top_at_zero() {
        let (mut doc, block) = setup("ab\ncd");
        let top = LinePoint {
            line: line(&doc, block, 0),
            offset: 0,
        };
        let bottom = LinePoint {
            line: line(&doc, block, 1),
            offset: 1,
        };
        select_line_points(&mut doc, top, bottom, true);

        handle_dents(&mut doc, DentDirection::Indent).unwrap();

        let selection = *doc.selection().unwrap();
        assert!(selection.is_backward(&doc));
        assert_eq!(LinePoint::from_point(&doc, &selection.focus).unwrap().offset, 0);
        assert_eq!(LinePoint::from_point(&doc, &selection.anchor).unwrap().offset, 2);
    }

    #[test]
    fn test_locked_block_rejects_indent_and_exit() {
        let (mut doc, block) = setup("a\n\n");
        toggle_block_lock(&mut doc, block).unwrap();
        caret_at(&mut doc, block, 2, 0);

        assert!(!handle_dents(&mut doc, DentDirection::Indent).unwrap());
        assert!(!exit_on_return(&doc));
    }

    #[test]
    fn test_move_up_at_top_is_rejected() {
        let (mut doc, block) = setup("a\nb");
        caret_at(&mut doc, block, 0, 0);

        assert_eq!(handle_shifting_lines(&mut doc, Direction::Up).unwrap(), Some(false));
        assert_eq!(lines(&doc, block), vec!["a", "b"]);
    }

    #[test]
    fn test_move_to_start_skips_indent() {
        let (mut doc, block) = setup("\t\tfoo");
        caret_at(&mut doc, block, 0, 4);

        handle_move_to(&mut doc, MoveTo::Start).unwrap();
        assert_eq!(caret(&doc).offset, 2);

        caret_at(&mut doc, block, 0, 1);
        handle_move_to(&mut doc, MoveTo::Start).unwrap();
        assert_eq!(caret(&doc).offset, 1);

        handle_move_to(&mut doc, MoveTo::End).unwrap();
        assert_eq!(caret(&doc).offset, 5);
    }

    #[test]
    fn test_split_carries_indent() {
        let (mut doc, block) = setup("  foo(bar)");
        caret_at(&mut doc, block, 0, 6);

        assert!(split_line(&mut doc).unwrap());

        assert_eq!(lines(&doc, block), vec!["  foo(", "  bar)"]);
        let at = caret(&doc);
        assert_eq!(at.line, line(&doc, block, 1));
        assert_eq!(at.offset, 2);
    }

    #[test]
    fn test_split_at_line_start_carries_nothing() {
        let (mut doc, block) = setup("foo");
        caret_at(&mut doc, block, 0, 0);

        split_line(&mut doc).unwrap();

        assert_eq!(lines(&doc, block), vec!["", "foo"]);
        assert_eq!(caret(&doc).offset, 0);
    }

    #[test]
    fn test_exit_block_drops_blank_lines() {
        let (mut doc, block) = setup("foo\n\n");
        caret_at(&mut doc, block, 2, 0);

        assert!(split_line(&mut doc).unwrap());

        assert_eq!(lines(&doc, block), vec!["foo"]);
        let paragraph = doc.next_sibling(block).unwrap();
        assert!(doc.is(paragraph, NodeKind::Paragraph));
        assert_eq!(doc.selection().unwrap().anchor, Point::element(paragraph, 0));
    }

    #[test]
    fn test_border_navigation_inserts_paragraph() {
        let (mut doc, block) = setup("a\nb");
        caret_at(&mut doc, block, 1, 1);

        assert!(handle_borders(&mut doc, Direction::Down).unwrap());
        assert!(doc.is(doc.next_sibling(block).unwrap(), NodeKind::Paragraph));

        caret_at(&mut doc, block, 0, 1);
        assert!(!handle_borders(&mut doc, Direction::Up).unwrap());
    }

    #[test]
    fn test_paste_mid_line_keeps_surrounding_text() {
        let (mut doc, block) = setup("abcd");
        caret_at(&mut doc, block, 0, 2);

        insert_clipboard_data(&mut doc, &ClipboardPayload::plain("1\n2")).unwrap();

        assert_eq!(lines(&doc, block), vec!["ab1", "2cd"]);
        assert_eq!(caret(&doc).offset, 1);
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let (mut doc, block) = setup("abcd");
        caret_at(&mut doc, block, 0, 2);

        assert!(!insert_clipboard_data(&mut doc, &ClipboardPayload::default()).unwrap());
        assert_eq!(lines(&doc, block), vec!["abcd"]);
    }

    #[test]
    fn test_typing_and_backspace() {
        let (mut doc, block) = setup("");
        caret_at(&mut doc, block, 0, 0);

        insert_text(&mut doc, "let x").unwrap();
        assert_eq!(lines(&doc, block), vec!["let x"]);
        assert_eq!(caret(&doc).offset, 5);

        delete_backward(&mut doc).unwrap();
        delete_backward(&mut doc).unwrap();
        assert_eq!(lines(&doc, block), vec!["let"]);
        assert_eq!(caret(&doc).offset, 3);
    }

    #[test]
    fn test_typing_at_run_boundary_selection() {
        let (mut doc, block) = setup("abcd");
        let l = line(&doc, block, 0);
        doc.clear_children(l).unwrap();
        let left = doc.create_code_run("ab", None);
        let right = doc.create_code_run("cd", None);
        doc.append(l, left).unwrap();
        doc.append(l, right).unwrap();
        doc.set_selection(RangeSelection::new(Point::text(left, 2), Point::text(right, 0)));

        assert!(SelectedLines::resolve(&doc).unwrap().collapsed);
        insert_text(&mut doc, "X").unwrap();

        assert_eq!(lines(&doc, block), vec!["abXcd"]);
        assert_eq!(caret(&doc).offset, 3);
    }

    #[test]
    fn test_backspace_merges_lines() {
        let (mut doc, block) = setup("ab\ncd");
        caret_at(&mut doc, block, 1, 0);

        delete_backward(&mut doc).unwrap();

        assert_eq!(lines(&doc, block), vec!["abcd"]);
        assert_eq!(caret(&doc).offset, 2);
    }

    #[test]
    fn test_backspace_at_block_start_flattens() {
        let (mut doc, block) = setup("ab\ncd");
        caret_at(&mut doc, block, 0, 0);

        assert!(delete_backward(&mut doc).unwrap());
        assert!(!doc.contains(block));
        assert_eq!(doc.text_content(doc.root()), "ab\n\ncd");
    }

    #[test]
    fn test_discrete_classes() {
        let (mut doc, block) = setup("a\nb");
        let top = LinePoint {
            line: line(&doc, block, 0),
            offset: 0,
        };
        let bottom = LinePoint {
            line: line(&doc, block, 1),
            offset: 1,
        };
        select_line_points(&mut doc, top, bottom, false);

        assert!(add_discrete_line_classes(&mut doc, "hl  err").unwrap());
        assert!(!add_discrete_line_classes(&mut doc, "hl").unwrap());
        let classes = &doc.code_line(bottom.line).unwrap().discrete_classes;
        assert_eq!(classes.iter().collect::<Vec<_>>(), vec!["err", "hl"]);

        assert!(remove_discrete_line_classes(&mut doc, "err").unwrap());
        assert!(!remove_discrete_line_classes(&mut doc, "err").unwrap());
    }

    #[test]
    fn test_settings_ops() {
        let (mut doc, block) = setup("x");

        assert!(set_language(&mut doc, block, "rust").unwrap());
        assert!(!set_language(&mut doc, block, "rust").unwrap());
        assert!(toggle_tabs(&mut doc, block).unwrap());
        assert!(!toggle_line_numbers(&mut doc, block).unwrap());
        change_theme_name(&mut doc, block, "dark").unwrap();
        assert_eq!(doc.settings(block).unwrap().theme_name, "dark");
    }
}
