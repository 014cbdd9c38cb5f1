//! Keeping line runs in sync with line text.
//!
//! A line is *current* when its runs are exactly what the block's tokenizer produces for the
//! line's text. Rebuilding is a full replace of the line's runs; lines are short, so no diff
//! is attempted.

use crate::document::{Document, NodeId, NodeKind};
use crate::error::{CodeError, CodeResult};
use crate::line_offset::SavedSelection;
use crate::settings::{BlockSettings, CodeBlockOptions};
use crate::text::split_lines_preserve_trailing;
use lined_code_highlight::{NormalizedToken, normalize_tokens};
use tracing::trace;

/// Tokenize and normalize one line of text with a block's tokenizer and language.
pub fn normalized_tokens(settings: &BlockSettings, text: &str) -> Vec<NormalizedToken> {
    normalize_tokens(&settings.tokenizer.tokenize(text, &settings.language))
}

/// Settings of the block owning `line`.
pub fn line_settings(doc: &Document, line: NodeId) -> CodeResult<&BlockSettings> {
    let block = doc
        .block_of_line(line)
        .ok_or(CodeError::Setup("code line is not attached to a code block"))?;
    doc.settings(block)
}

/// Create detached runs for `text` as highlighted by `block`.
pub fn highlight_nodes(doc: &mut Document, block: NodeId, text: &str) -> CodeResult<Vec<NodeId>> {
    let tokens = normalized_tokens(doc.settings(block)?, text);
    Ok(tokens
        .into_iter()
        .map(|token| doc.create_code_run(token.content, token.highlight_type.as_deref()))
        .collect())
}

/// Returns `true` if the line's runs match a fresh tokenization of its text.
pub fn is_line_current(doc: &Document, line: NodeId) -> CodeResult<bool> {
    let text = doc.text_content(line);
    let expected = normalized_tokens(line_settings(doc, line)?, &text);
    let runs = doc.children(line);
    if runs.len() != expected.len() {
        return Ok(false);
    }
    Ok(runs.iter().zip(&expected).all(|(&run, token)| {
        doc.code_run(run).is_some_and(|run| {
            run.text == token.content && run.highlight_type == token.highlight_type
        })
    }))
}

/// Replace the runs of `line` with freshly highlighted runs for `text`.
pub fn replace_line_code(doc: &mut Document, line: NodeId, text: &str) -> CodeResult<()> {
    let block = doc
        .block_of_line(line)
        .ok_or(CodeError::Setup("code line is not attached to a code block"))?;
    let runs = highlight_nodes(doc, block, text)?;
    doc.clear_children(line)?;
    for run in runs {
        doc.append(line, run)?;
    }
    trace!("rebuilt line {line} into {} runs", doc.child_count(line));
    Ok(())
}

/// Rebuild the runs of a non-empty line. Returns whether a rebuild happened.
///
/// An empty line is always current: it keeps no runs (stray empty runs are dropped) and
/// nothing is rebuilt.
pub fn update_line_code(doc: &mut Document, line: NodeId) -> CodeResult<bool> {
    let text = doc.text_content(line);
    if text.is_empty() {
        if doc.child_count(line) > 0 {
            doc.clear_children(line)?;
        }
        return Ok(false);
    }
    replace_line_code(doc, line, &text)?;
    Ok(true)
}

/// Create detached lines (with runs) for a possibly multi-line text.
pub fn create_code_lines(doc: &mut Document, block: NodeId, text: &str) -> CodeResult<Vec<NodeId>> {
    let mut lines = Vec::new();
    for line_text in split_lines_preserve_trailing(text) {
        let line = doc.create_code_line();
        for run in highlight_nodes(doc, block, &line_text)? {
            doc.append(line, run)?;
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Rebuild every line of a block, keeping the selection. Returns how many lines were rebuilt.
pub fn update_every_line(doc: &mut Document, block: NodeId) -> CodeResult<usize> {
    doc.settings(block)?;
    let saved = SavedSelection::capture(doc);
    let mut rebuilt = 0;
    for line in doc.children(block).to_vec() {
        if update_line_code(doc, line)? {
            rebuilt += 1;
        }
    }
    if let Some(saved) = saved {
        saved.restore(doc);
    }
    Ok(rebuilt)
}

/// Join raw text fragments into one text.
///
/// A fragment that does not contain a newline is followed by an inserted `\n` unless it is the
/// last one; `leading` and `trailing` wrap the result.
pub fn raw_text<S: AsRef<str>>(fragments: &[S], leading: &str, trailing: &str) -> String {
    let mut out = String::from(leading);
    for (i, fragment) in fragments.iter().enumerate() {
        let fragment = fragment.as_ref();
        out.push_str(fragment);
        if !fragment.contains('\n') && i + 1 < fragments.len() {
            out.push('\n');
        }
    }
    out.push_str(trailing);
    out
}

/// Append detached lines to a block.
///
/// When the block only holds its initial empty line, the first appended line's content moves
/// into that line instead of leaving a blank line on top.
pub fn append_lines(doc: &mut Document, block: NodeId, lines: &[NodeId]) -> CodeResult<()> {
    doc.settings(block)?;
    let mut rest = lines;
    let only_line = match doc.children(block) {
        [only] if doc.text_len(*only) == 0 => Some(*only),
        _ => None,
    };
    if let (Some(start), Some((&first, tail))) = (only_line, lines.split_first()) {
        doc.clear_children(start)?;
        for run in doc.children(first).to_vec() {
            doc.append(start, run)?;
        }
        let classes = doc
            .code_line(first)
            .map(|line| line.discrete_classes.clone())
            .unwrap_or_default();
        if let Some(line) = doc.code_line_mut(start) {
            line.discrete_classes.extend(classes);
        }
        doc.remove(first)?;
        rest = tail;
    }
    for &line in rest {
        doc.append(block, line)?;
    }
    Ok(())
}

/// Split `text` into highlighted lines and append them to a block.
pub fn append_text(doc: &mut Document, block: NodeId, text: &str) -> CodeResult<()> {
    let lines = create_code_lines(doc, block, text)?;
    append_lines(doc, block, &lines)
}

/// Typing-time contract: after a run's text changed, rebuild its line if stale and put the
/// selection back on the offsets it had before the rebuild. Returns whether a rebuild happened.
pub fn on_run_text_changed(doc: &mut Document, run: NodeId) -> CodeResult<bool> {
    let line = doc
        .line_of(run)
        .ok_or(CodeError::Setup("run is not attached to a code line"))?;
    if is_line_current(doc, line)? {
        return Ok(false);
    }
    let saved = SavedSelection::capture(doc);
    let rebuilt = update_line_code(doc, line)?;
    if let Some(saved) = saved {
        let anchor_lost = doc
            .selection()
            .is_some_and(|selection| !doc.is(selection.anchor.node, NodeKind::CodeRun));
        if anchor_lost || !doc.is(run, NodeKind::CodeRun) {
            saved.restore(doc);
        }
    }
    Ok(rebuilt)
}

/// Remove every run with empty text under `node` (a block or a line). Returns how many went.
pub fn remove_empty_runs(doc: &mut Document, node: NodeId) -> CodeResult<usize> {
    let lines = match doc.kind(node) {
        Some(NodeKind::CodeBlock) => doc.children(node).to_vec(),
        Some(NodeKind::CodeLine) => vec![node],
        _ => return Ok(0),
    };
    let mut removed = 0;
    for line in lines {
        for run in doc.children(line).to_vec() {
            if doc.code_run(run).is_some_and(|r| r.text.is_empty()) {
                doc.remove(run)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Build a detached code block holding `text`.
pub fn code_block_from_text(
    doc: &mut Document,
    options: &CodeBlockOptions,
    text: &str,
) -> CodeResult<NodeId> {
    let block = doc.create_code_block(options);
    append_text(doc, block, text)?;
    Ok(block)
}
