#![warn(missing_docs)]
//! Lined Code - headless, line-structured code blocks for rich-text document trees
//!
//! # Overview
//!
//! `lined-code` models a syntax-highlighted code block inside a larger document as a small
//! tree (block → lines → highlight runs) and keeps that tree, and the user's selection,
//! consistent across text edits and multi-line structural edits. It does not render anything:
//! hosts read [`view`] descriptions or [`markup::export_html`] output.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Commands (CommandExecutor)                 │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Structural edits (editor)                  │  ← indent, move, paste, flatten
//! ├─────────────────────────────────────────────┤
//! │  Snapshot / Markup / View                   │  ← Serialization & rendering data
//! ├─────────────────────────────────────────────┤
//! │  Reconcile (staleness + line rebuild)       │  ← Tokens → runs
//! ├─────────────────────────────────────────────┤
//! │  Line offsets                               │  ← Point ⇄ (line, offset)
//! ├─────────────────────────────────────────────┤
//! │  Document arena + selection + settings      │  ← Host tree
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Tokenizers and the token normalizer live in `lined-code-highlight`; the language table
//! lives in `lined-code-lang`.
//!
//! # Quick Start
//!
//! ```rust
//! use lined_code::{CodeBlockOptions, Document};
//! use lined_code::line_offset::{line_offset, select_line_offset};
//! use lined_code::reconcile::code_block_from_text;
//!
//! let mut doc = Document::new();
//! let block = code_block_from_text(
//!     &mut doc,
//!     &CodeBlockOptions::with_language("rust"),
//!     "fn main() {\n    println!(\"hi\");\n}",
//! )
//! .unwrap();
//! doc.append(doc.root(), block).unwrap();
//!
//! let second = doc.children(block)[1];
//! select_line_offset(&mut doc, second, 4);
//! let caret = doc.selection().unwrap().anchor;
//! assert_eq!(line_offset(&doc, &caret), Some(4));
//! ```
//!
//! # Module Description
//!
//! - [`document`] - node arena, tree primitives and the active selection
//! - [`selection`] - points and range selections
//! - [`settings`] - block options, defaults merge and resolved block settings
//! - [`line_offset`] - point ⇄ line offset mapping
//! - [`reconcile`] - staleness detection and line rebuilding
//! - [`editor`] - structural edits
//! - [`snapshot`] - JSON snapshots
//! - [`markup`] - markup import and HTML export
//! - [`view`] - view callbacks
//! - [`commands`] - command dispatch

pub mod commands;
pub mod document;
pub mod editor;
pub mod error;
pub mod line_offset;
pub mod markup;
pub mod reconcile;
pub mod selection;
pub mod settings;
pub mod snapshot;
mod text;
pub mod view;

pub use commands::{
    BlockCommand, CaretCommand, Command, CommandExecutor, CommandResult, EditCommand,
};
pub use document::{CodeBlock, CodeLine, CodeRun, Document, NodeData, NodeId, NodeKind, TextNode};
pub use editor::{ClipboardPayload, DentDirection, Direction, MoveTo, SelectedLines};
pub use error::{CodeError, CodeResult};
pub use line_offset::{LinePoint, RunOffset, SavedSelection};
pub use markup::MarkupNode;
pub use selection::{Point, PointKind, RangeSelection};
pub use settings::{BlockSettings, CodeBlockOptions, CodeThemeOptions, ClassPairOptions};
pub use snapshot::{SerializedNode, SerializedNodes};
pub use view::ElementView;

pub use lined_code_highlight::{NormalizedToken, Token, Tokenizer};
pub use lined_code_lang::{DEFAULT_CODE_LANGUAGE, KNOWN_LANGUAGES};
