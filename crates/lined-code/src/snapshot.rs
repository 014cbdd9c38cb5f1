//! JSON snapshots of blocks, lines and runs.
//!
//! Nodes are tagged by `type`. Lists nest as plain nodes so unexpected entries (a run directly
//! in a block, say) still import instead of failing the whole snapshot.

use crate::document::{Document, NodeData, NodeId};
use crate::error::{CodeError, CodeResult};
use crate::reconcile::{
    append_text, create_code_lines, is_line_current, remove_empty_runs, update_line_code,
};
use crate::settings::CodeBlockOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// Version written into every code node snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// A serialized code block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedCodeBlock {
    /// Block options (`tokenizer` is always `null`).
    pub options: CodeBlockOptions,
    /// Schema version.
    #[serde(default = "snapshot_version")]
    pub version: u32,
    /// Lines.
    pub lines: Vec<SerializedNode>,
}

/// A serialized code line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializedCodeLine {
    /// Space-separated discrete classes.
    pub discrete_classes: String,
    /// Runs.
    pub runs: Vec<SerializedNode>,
    /// Schema version.
    #[serde(default = "snapshot_version")]
    pub version: u32,
}

/// A serialized highlight run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializedCodeRun {
    /// Run text.
    pub text: String,
    /// Highlight type.
    pub highlight_type: Option<String>,
    /// Schema version.
    #[serde(default = "snapshot_version")]
    pub version: u32,
}

/// A serialized paragraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedParagraph {
    /// Children.
    pub children: Vec<SerializedNode>,
}

/// A serialized text node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedText {
    /// Text.
    pub text: String,
}

/// Any serialized node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SerializedNode {
    /// `"code-block"`
    CodeBlock(SerializedCodeBlock),
    /// `"code-line"`
    CodeLine(SerializedCodeLine),
    /// `"code-run"`
    CodeRun(SerializedCodeRun),
    /// `"paragraph"`
    Paragraph(SerializedParagraph),
    /// `"text"`
    Text(SerializedText),
}

/// A list of serialized nodes (a document body or clipboard content).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedNodes {
    /// Nodes in order.
    pub nodes: Vec<SerializedNode>,
}

impl SerializedNode {
    /// Plain text of the node: block lines joined by `\n`, everything else concatenated.
    pub fn text_content(&self) -> String {
        match self {
            SerializedNode::CodeBlock(block) => block
                .lines
                .iter()
                .map(SerializedNode::text_content)
                .collect::<Vec<_>>()
                .join("\n"),
            SerializedNode::CodeLine(line) => {
                line.runs.iter().map(SerializedNode::text_content).collect()
            }
            SerializedNode::CodeRun(run) => run.text.clone(),
            SerializedNode::Paragraph(paragraph) => paragraph
                .children
                .iter()
                .map(SerializedNode::text_content)
                .collect(),
            SerializedNode::Text(text) => text.text.clone(),
        }
    }
}

/// Serialize a node and its subtree.
pub fn export_node(doc: &Document, id: NodeId) -> CodeResult<SerializedNode> {
    let data = doc.get(id).ok_or(CodeError::UnknownNode(id))?;
    let children = |doc: &Document| -> CodeResult<Vec<SerializedNode>> {
        doc.children(id)
            .iter()
            .map(|&child| export_node(doc, child))
            .collect()
    };
    Ok(match data {
        NodeData::Root => return Err(CodeError::Setup("export the root with export_document")),
        NodeData::Paragraph => SerializedNode::Paragraph(SerializedParagraph {
            children: children(doc)?,
        }),
        NodeData::Text(text) => SerializedNode::Text(SerializedText {
            text: text.text.clone(),
        }),
        NodeData::CodeBlock(block) => SerializedNode::CodeBlock(SerializedCodeBlock {
            options: block.settings.to_options(),
            version: SNAPSHOT_VERSION,
            lines: children(doc)?,
        }),
        NodeData::CodeLine(line) => SerializedNode::CodeLine(SerializedCodeLine {
            discrete_classes: line
                .discrete_classes
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            runs: children(doc)?,
            version: SNAPSHOT_VERSION,
        }),
        NodeData::CodeRun(run) => SerializedNode::CodeRun(SerializedCodeRun {
            text: run.text.clone(),
            highlight_type: run.highlight_type.clone(),
            version: SNAPSHOT_VERSION,
        }),
    })
}

fn discrete_classes(line: &SerializedCodeLine) -> BTreeSet<String> {
    line.discrete_classes
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn import_line(doc: &mut Document, line: &SerializedCodeLine) -> CodeResult<NodeId> {
    let id = doc.create_code_line();
    if let Some(data) = doc.code_line_mut(id) {
        data.discrete_classes = discrete_classes(line);
    }
    for run in &line.runs {
        let child = match run {
            SerializedNode::CodeRun(run) => {
                doc.create_code_run(run.text.clone(), run.highlight_type.as_deref())
            }
            other => doc.create_code_run(other.text_content(), None),
        };
        doc.append(id, child)?;
    }
    Ok(id)
}

/// Rehydrate a detached node from its snapshot.
///
/// Block options are merged with the document defaults again (the tokenizer comes back from
/// there), empty runs are dropped and a block always ends up with at least one line. Imported
/// block lines are retokenized when their runs disagree with the block's tokenizer, and a line
/// whose runs carry newlines is split into several lines (its classes stay on the first).
/// Detached lines and runs holding a newline are rejected.
pub fn import_node(doc: &mut Document, node: &SerializedNode) -> CodeResult<NodeId> {
    match node {
        SerializedNode::CodeBlock(block) => {
            let id = doc.create_code_block(&block.options);
            doc.clear_children(id)?;
            for node in &block.lines {
                match node {
                    SerializedNode::CodeLine(line) => {
                        let text = node.text_content();
                        if !text.contains('\n') {
                            let line = import_line(doc, line)?;
                            doc.append(id, line)?;
                            continue;
                        }
                        let lines = create_code_lines(doc, id, &text)?;
                        if let Some(data) = lines.first().and_then(|&first| doc.code_line_mut(first)) {
                            data.discrete_classes = discrete_classes(line);
                        }
                        for line in lines {
                            doc.append(id, line)?;
                        }
                    }
                    other => append_text(doc, id, &other.text_content())?,
                }
            }
            remove_empty_runs(doc, id)?;
            if doc.child_count(id) == 0 {
                let line = doc.create_code_line();
                doc.append(id, line)?;
            }
            let mut rebuilt = 0;
            for line in doc.children(id).to_vec() {
                if !is_line_current(doc, line)? && update_line_code(doc, line)? {
                    rebuilt += 1;
                }
            }
            trace!("imported block {id}, retokenized {rebuilt} lines");
            Ok(id)
        }
        SerializedNode::CodeLine(line) => {
            if node.text_content().contains('\n') {
                return Err(CodeError::Setup("a code line cannot hold a newline"));
            }
            let id = import_line(doc, line)?;
            remove_empty_runs(doc, id)?;
            Ok(id)
        }
        SerializedNode::CodeRun(run) => {
            if run.text.contains('\n') {
                return Err(CodeError::Setup("a code run cannot hold a newline"));
            }
            Ok(doc.create_code_run(run.text.clone(), run.highlight_type.as_deref()))
        }
        SerializedNode::Paragraph(paragraph) => {
            let id = doc.create_paragraph();
            for child in &paragraph.children {
                let child = match child {
                    SerializedNode::Text(text) => doc.create_text(text.text.clone()),
                    other => doc.create_text(other.text_content()),
                };
                doc.append(id, child)?;
            }
            Ok(id)
        }
        SerializedNode::Text(text) => Ok(doc.create_text(text.text.clone())),
    }
}

/// Serialize nodes as clipboard JSON.
pub fn nodes_to_json(doc: &Document, ids: &[NodeId]) -> CodeResult<String> {
    let nodes = ids
        .iter()
        .map(|&id| export_node(doc, id))
        .collect::<CodeResult<Vec<_>>>()?;
    Ok(serde_json::to_string(&SerializedNodes { nodes })?)
}

/// Parse clipboard JSON.
pub fn nodes_from_json(json: &str) -> CodeResult<Vec<SerializedNode>> {
    let nodes: SerializedNodes = serde_json::from_str(json)?;
    Ok(nodes.nodes)
}

/// Serialize every top-level node of a document.
pub fn export_document(doc: &Document) -> CodeResult<String> {
    let top_level = doc.children(doc.root()).to_vec();
    let nodes = top_level
        .iter()
        .map(|&id| export_node(doc, id))
        .collect::<CodeResult<Vec<_>>>()?;
    Ok(serde_json::to_string_pretty(&SerializedNodes { nodes })?)
}

/// Build a document from [`export_document`] output. Blocks resolve against `defaults`.
pub fn import_document(json: &str, defaults: CodeBlockOptions) -> CodeResult<Document> {
    let mut doc = Document::with_defaults(defaults);
    let root = doc.root();
    for node in nodes_from_json(json)? {
        let id = match node {
            SerializedNode::CodeLine(_) | SerializedNode::CodeRun(_) => {
                let block = doc.create_code_block(&CodeBlockOptions::default());
                append_text(&mut doc, block, &node.text_content())?;
                block
            }
            SerializedNode::Text(text) => {
                let paragraph = doc.create_paragraph();
                let text = doc.create_text(text.text);
                doc.append(paragraph, text)?;
                paragraph
            }
            node => import_node(&mut doc, &node)?,
        };
        doc.append(root, id)?;
    }
    Ok(doc)
}
