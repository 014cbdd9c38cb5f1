//! The host document: an arena of nodes addressed by stable ids.
//!
//! Nodes live in a vector of generation-tagged entries. Removing a node frees its entry and every
//! entry of its subtree onto a free list; the next node created takes a freed entry with a bumped
//! generation, so a stale id resolves to nothing. Parent links are plain ids, and every mutation
//! bumps [`Document::version`].
//!
//! The tree shape the rest of the crate relies on:
//!
//! ```text
//! Root
//! ├── Paragraph ── Text*
//! └── CodeBlock ── CodeLine+ ── CodeRun*
//! ```

use crate::error::{CodeError, CodeResult};
use crate::selection::{Point, PointKind, RangeSelection};
use crate::settings::{BlockSettings, CodeBlockOptions};
use crate::text::char_len;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Stable id of a node in a [`Document`].
///
/// The arena index may be reused after the node is removed; the generation tells the old id
/// from the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Arena index of the node.
    pub fn index(self) -> usize {
        self.index
    }

    /// How many times the arena entry was reused before this id was handed out.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// Plain text leaf of a paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextNode {
    /// Text content.
    pub text: String,
}

/// A code block: owns lines and carries the resolved settings.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// Steady-state settings every other component reads.
    pub settings: BlockSettings,
}

/// One logical source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeLine {
    /// Ad-hoc per-line decoration classes.
    pub discrete_classes: BTreeSet<String>,
}

/// A highlight run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeRun {
    /// Run text (never contains a newline).
    pub text: String,
    /// Highlight classification (`None` = unhighlighted).
    pub highlight_type: Option<String>,
}

/// Payload of a node.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Root,
    /// Plain paragraph.
    Paragraph,
    /// Plain text.
    Text(TextNode),
    /// Code block.
    CodeBlock(CodeBlock),
    /// Code line.
    CodeLine(CodeLine),
    /// Highlight run.
    CodeRun(CodeRun),
}

/// Discriminant of [`NodeData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root.
    Root,
    /// Plain paragraph.
    Paragraph,
    /// Plain text.
    Text,
    /// Code block.
    CodeBlock,
    /// Code line.
    CodeLine,
    /// Highlight run.
    CodeRun,
}

impl NodeData {
    /// Discriminant of this payload.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root => NodeKind::Root,
            NodeData::Paragraph => NodeKind::Paragraph,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::CodeBlock(_) => NodeKind::CodeBlock,
            NodeData::CodeLine(_) => NodeKind::CodeLine,
            NodeData::CodeRun(_) => NodeKind::CodeRun,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    slot: Option<Slot>,
}

/// The document tree plus the active selection and editor-wide block defaults.
#[derive(Debug, Clone)]
pub struct Document {
    entries: Vec<Entry>,
    free: Vec<usize>,
    root: NodeId,
    selection: Option<RangeSelection>,
    defaults: CodeBlockOptions,
    version: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with default block options.
    pub fn new() -> Self {
        Self::with_defaults(CodeBlockOptions::default())
    }

    /// Create an empty document whose blocks resolve against `defaults`.
    pub fn with_defaults(defaults: CodeBlockOptions) -> Self {
        Self {
            entries: vec![Entry {
                generation: 0,
                slot: Some(Slot {
                    data: NodeData::Root,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            selection: None,
            defaults,
            version: 0,
        }
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Editor-wide block defaults.
    pub fn defaults(&self) -> &CodeBlockOptions {
        &self.defaults
    }

    /// Replace the editor-wide block defaults (affects blocks created afterwards).
    pub fn set_defaults(&mut self, defaults: CodeBlockOptions) {
        self.defaults = defaults;
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Number of arena entries, live or free.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    fn live(&self, id: NodeId) -> Option<&Slot> {
        self.entries
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_ref())
    }

    fn live_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.entries
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_mut())
    }

    fn slot(&self, id: NodeId) -> CodeResult<&Slot> {
        self.live(id).ok_or(CodeError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> CodeResult<&mut Slot> {
        self.live_mut(id).ok_or(CodeError::UnknownNode(id))
    }

    fn free_entry(&mut self, id: NodeId) -> Option<Slot> {
        let entry = self
            .entries
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)?;
        let slot = entry.slot.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(slot)
    }

    // ---- queries ----

    /// Returns `true` if `id` resolves to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    /// Payload of a node.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slot(id).ok().map(|slot| &slot.data)
    }

    /// Mutable payload of a node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.touch();
        self.slot_mut(id).ok().map(|slot| &mut slot.data)
    }

    /// Kind of a node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(NodeData::kind)
    }

    /// Returns `true` if `id` is a live node of `kind`.
    pub fn is(&self, id: NodeId, kind: NodeKind) -> bool {
        self.kind(id) == Some(kind)
    }

    /// Parent of a node (`None` for the root and detached nodes).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).ok().and_then(|slot| slot.parent)
    }

    /// Children of a node (empty for unknown ids).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// First child.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Last child.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Position of a node among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Previous sibling.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Next sibling.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// The ancestor of `id` that is a direct child of the root (or `id` itself).
    pub fn top_level_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    // ---- typed access ----

    /// Block payload.
    pub fn code_block(&self, id: NodeId) -> Option<&CodeBlock> {
        match self.get(id)? {
            NodeData::CodeBlock(block) => Some(block),
            _ => None,
        }
    }

    /// Mutable block payload.
    pub fn code_block_mut(&mut self, id: NodeId) -> Option<&mut CodeBlock> {
        match self.get_mut(id)? {
            NodeData::CodeBlock(block) => Some(block),
            _ => None,
        }
    }

    /// Line payload.
    pub fn code_line(&self, id: NodeId) -> Option<&CodeLine> {
        match self.get(id)? {
            NodeData::CodeLine(line) => Some(line),
            _ => None,
        }
    }

    /// Mutable line payload.
    pub fn code_line_mut(&mut self, id: NodeId) -> Option<&mut CodeLine> {
        match self.get_mut(id)? {
            NodeData::CodeLine(line) => Some(line),
            _ => None,
        }
    }

    /// Run payload.
    pub fn code_run(&self, id: NodeId) -> Option<&CodeRun> {
        match self.get(id)? {
            NodeData::CodeRun(run) => Some(run),
            _ => None,
        }
    }

    /// Settings of a block.
    pub fn settings(&self, block: NodeId) -> CodeResult<&BlockSettings> {
        match &self.slot(block)?.data {
            NodeData::CodeBlock(code) => Ok(&code.settings),
            _ => Err(CodeError::NotACodeBlock(block)),
        }
    }

    /// Mutable settings of a block.
    pub fn settings_mut(&mut self, block: NodeId) -> CodeResult<&mut BlockSettings> {
        self.touch();
        match &mut self.slot_mut(block)?.data {
            NodeData::CodeBlock(code) => Ok(&mut code.settings),
            _ => Err(CodeError::NotACodeBlock(block)),
        }
    }

    /// The block a line belongs to.
    pub fn block_of_line(&self, line: NodeId) -> Option<NodeId> {
        self.parent(line)
            .filter(|&parent| self.is(parent, NodeKind::CodeBlock))
    }

    /// The line a point node refers to: the line itself, or the parent line of a run.
    pub fn line_of(&self, node: NodeId) -> Option<NodeId> {
        match self.kind(node)? {
            NodeKind::CodeLine => Some(node),
            NodeKind::CodeRun => self
                .parent(node)
                .filter(|&parent| self.is(parent, NodeKind::CodeLine)),
            _ => None,
        }
    }

    /// The code block enclosing `node` (the node itself, its parent or grandparent).
    pub fn enclosing_code_block(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        for _ in 0..3 {
            let id = current?;
            if self.is(id, NodeKind::CodeBlock) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    // ---- creation ----

    /// Create a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        self.touch();
        let slot = Slot {
            data,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop()
            && let Some(entry) = self.entries.get_mut(index)
        {
            entry.slot = Some(slot);
            return NodeId {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len();
        self.entries.push(Entry {
            generation: 0,
            slot: Some(slot),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Create a detached, empty paragraph.
    pub fn create_paragraph(&mut self) -> NodeId {
        self.create(NodeData::Paragraph)
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create(NodeData::Text(TextNode { text: text.into() }))
    }

    /// Create a detached code block holding one empty line.
    ///
    /// This is the finalize-configuration hook: `options` are merged over the document
    /// defaults exactly once, here.
    pub fn create_code_block(&mut self, options: &CodeBlockOptions) -> NodeId {
        let settings = BlockSettings::resolve(options, &self.defaults);
        self.create_code_block_with_settings(settings)
    }

    /// Create a detached code block holding one empty line, with already resolved settings.
    pub fn create_code_block_with_settings(&mut self, settings: BlockSettings) -> NodeId {
        let block = self.create(NodeData::CodeBlock(CodeBlock { settings }));
        let line = self.create_code_line();
        self.link(block, usize::MAX, line);
        block
    }

    /// Create a detached, empty code line.
    pub fn create_code_line(&mut self) -> NodeId {
        self.create(NodeData::CodeLine(CodeLine::default()))
    }

    /// Create a detached highlight run.
    pub fn create_code_run(&mut self, text: impl Into<String>, highlight_type: Option<&str>) -> NodeId {
        self.create(NodeData::CodeRun(CodeRun {
            text: text.into(),
            highlight_type: highlight_type.map(str::to_string),
        }))
    }

    // ---- structure ----

    fn unlink(&mut self, id: NodeId) {
        let parent = self.live_mut(id).and_then(|slot| slot.parent.take());
        if let Some(parent) = parent
            && let Some(slot) = self.live_mut(parent)
        {
            slot.children.retain(|&child| child != id);
        }
    }

    fn link(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(slot) = self.live_mut(parent) {
            let index = index.min(slot.children.len());
            slot.children.insert(index, child);
        }
        if let Some(slot) = self.live_mut(child) {
            slot.parent = Some(parent);
        }
    }

    /// Insert `child` (detaching it first) at `index` among `parent`'s children.
    /// The index is clamped to the child count.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> CodeResult<()> {
        self.slot(parent)?;
        self.slot(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(CodeError::Setup("cannot insert a node into its own subtree"));
        }
        self.touch();
        self.unlink(child);
        self.link(parent, index, child);
        Ok(())
    }

    /// Append `child` (detaching it first) to `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> CodeResult<()> {
        self.insert_at(parent, usize::MAX, child)
    }

    /// Insert `node` right before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) -> CodeResult<()> {
        let parent = self
            .parent(sibling)
            .ok_or(CodeError::Setup("sibling is not attached"))?;
        self.detach(node)?;
        let index = self
            .index_in_parent(sibling)
            .ok_or(CodeError::UnknownNode(sibling))?;
        self.insert_at(parent, index, node)
    }

    /// Insert `node` right after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) -> CodeResult<()> {
        let parent = self
            .parent(sibling)
            .ok_or(CodeError::Setup("sibling is not attached"))?;
        self.detach(node)?;
        let index = self
            .index_in_parent(sibling)
            .ok_or(CodeError::UnknownNode(sibling))?;
        self.insert_at(parent, index + 1, node)
    }

    /// Detach a node (and its subtree) from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) -> CodeResult<()> {
        self.slot(id)?;
        self.touch();
        self.unlink(id);
        Ok(())
    }

    /// Detach and free a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> CodeResult<()> {
        if id == self.root {
            return Err(CodeError::Setup("the root cannot be removed"));
        }
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(slot) = self.free_entry(node) {
                stack.extend(slot.children);
            }
        }
        Ok(())
    }

    /// Put `new` where `old` is, then free `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> CodeResult<()> {
        self.insert_before(old, new)?;
        self.remove(old)
    }

    /// Free `delete_count` children of `parent` starting at `start`, then insert `nodes` there.
    pub fn splice(
        &mut self,
        parent: NodeId,
        start: usize,
        delete_count: usize,
        nodes: &[NodeId],
    ) -> CodeResult<()> {
        let doomed: Vec<NodeId> = self
            .children(parent)
            .iter()
            .skip(start)
            .take(delete_count)
            .copied()
            .collect();
        for node in doomed {
            self.remove(node)?;
        }
        for (i, &node) in nodes.iter().enumerate() {
            self.insert_at(parent, start + i, node)?;
        }
        Ok(())
    }

    /// Free every child of a node.
    pub fn clear_children(&mut self, id: NodeId) -> CodeResult<()> {
        let count = self.child_count(id);
        self.splice(id, 0, count, &[])
    }

    // ---- text ----

    /// Text content of a node.
    ///
    /// Lines and paragraphs concatenate their children, a block joins its lines with `\n`, and
    /// the root separates its blocks with a blank line.
    pub fn text_content(&self, id: NodeId) -> String {
        let Ok(slot) = self.slot(id) else {
            return String::new();
        };
        match &slot.data {
            NodeData::Text(text) => text.text.clone(),
            NodeData::CodeRun(run) => run.text.clone(),
            NodeData::Paragraph | NodeData::CodeLine(_) => slot
                .children
                .iter()
                .map(|&child| self.text_content(child))
                .collect(),
            NodeData::CodeBlock(_) => self.joined_text(&slot.children, "\n"),
            NodeData::Root => self.joined_text(&slot.children, "\n\n"),
        }
    }

    fn joined_text(&self, children: &[NodeId], separator: &str) -> String {
        children
            .iter()
            .map(|&child| self.text_content(child))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Length of [`Document::text_content`] in chars.
    pub fn text_len(&self, id: NodeId) -> usize {
        let Ok(slot) = self.slot(id) else {
            return 0;
        };
        let sum = || slot.children.iter().map(|&c| self.text_len(c)).sum::<usize>();
        let gaps = slot.children.len().saturating_sub(1);
        match &slot.data {
            NodeData::Text(text) => char_len(&text.text),
            NodeData::CodeRun(run) => char_len(&run.text),
            NodeData::Paragraph | NodeData::CodeLine(_) => sum(),
            NodeData::CodeBlock(_) => sum() + gaps,
            NodeData::Root => sum() + gaps * 2,
        }
    }

    /// Set the text of a text node or run.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> CodeResult<()> {
        self.touch();
        match &mut self.slot_mut(id)?.data {
            NodeData::Text(node) => node.text = text.into(),
            NodeData::CodeRun(run) => run.text = text.into(),
            _ => return Err(CodeError::Setup("only text nodes and runs carry text")),
        }
        Ok(())
    }

    // ---- selection ----

    /// Active selection.
    pub fn selection(&self) -> Option<&RangeSelection> {
        self.selection.as_ref()
    }

    /// Replace the active selection.
    pub fn set_selection(&mut self, selection: RangeSelection) {
        self.selection = Some(selection);
    }

    /// Collapse the selection to `point`.
    pub fn select_caret(&mut self, point: Point) {
        self.selection = Some(RangeSelection::caret(point));
    }

    fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(index) = self.index_in_parent(current) {
            path.push(index);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Document order of two points.
    ///
    /// An element point at child `k` sorts before any text point inside child `k`.
    pub fn compare_points(&self, a: &Point, b: &Point) -> Ordering {
        let key = |point: &Point| {
            let mut key = self.path(point.node);
            key.push(point.offset);
            if point.kind == PointKind::Text {
                key.push(0);
            }
            key
        };
        key(a).cmp(&key(b))
    }
}
