//! Command Interface Layer
//!
//! Key, clipboard and toolbar events arrive as [`Command`]s and run against the document one
//! at a time. Each command either acts or answers [`CommandResult::NotHandled`], which tells
//! the host to fall through to its next handler (default caret movement, plain-paragraph
//! editing, ...).
//!
//! # Example
//!
//! ```rust
//! use lined_code::{CommandExecutor, Command, EditCommand, CommandResult, Document};
//! use lined_code::reconcile::code_block_from_text;
//! use lined_code::line_offset::select_line_offset;
//! use lined_code::CodeBlockOptions;
//!
//! let mut doc = Document::new();
//! let block = code_block_from_text(&mut doc, &CodeBlockOptions::default(), "ab\ncd").unwrap();
//! doc.append(doc.root(), block).unwrap();
//! let first = doc.first_child(block).unwrap();
//! select_line_offset(&mut doc, first, 1);
//!
//! let mut executor = CommandExecutor::new(doc);
//! let result = executor.execute(Command::Edit(EditCommand::Indent)).unwrap();
//!
//! assert_eq!(result, CommandResult::Handled);
//! assert_eq!(executor.document().text_content(block), "\tab\ncd");
//! ```

use crate::document::{Document, NodeId};
use crate::editor::{
    ClipboardPayload, DentDirection, Direction, MoveTo, add_discrete_line_classes,
    change_theme_name, code_blocks_in_selection, convert_to_plain_text, delete_backward,
    handle_borders, handle_dents, handle_move_to, handle_shifting_lines,
    insert_clipboard_data, insert_code_block_at_selection, insert_text,
    remove_discrete_line_classes, selected_block, set_language, split_line, toggle_block_lock,
    toggle_line_numbers, toggle_tabs,
};
use crate::error::CodeResult;
use tracing::debug;

/// Edits that change line content or structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    /// Indent the selected lines.
    Indent,
    /// Outdent the selected lines.
    Outdent,
    /// Tab key (Shift+Tab with `shift`). Only handled when the block activates tabs.
    KeyTab {
        /// Shift held.
        shift: bool,
    },
    /// Alt+Up.
    MoveLinesUp,
    /// Alt+Down.
    MoveLinesDown,
    /// Enter.
    Enter,
    /// Backspace.
    Backspace,
    /// Typed text.
    InsertText(String),
    /// Paste inside a block.
    Paste(ClipboardPayload),
    /// Add whitespace-separated classes to the selected lines.
    AddDiscreteLineClasses(String),
    /// Remove whitespace-separated classes from the selected lines.
    RemoveDiscreteLineClasses(String),
}

/// Caret movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretCommand {
    /// Arrow up (leaves the block at its top edge).
    ArrowUp,
    /// Arrow down (leaves the block at its bottom edge).
    ArrowDown,
    /// Home.
    LineStart,
    /// End.
    LineEnd,
}

/// Block-level settings and conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockCommand {
    /// Flip tab activation.
    ToggleTabs,
    /// Flip the lock.
    ToggleBlockLock,
    /// Flip line-number visibility.
    ToggleLineNumbers,
    /// Store a theme name.
    ChangeThemeName(String),
    /// Change the language.
    SetLanguage(String),
    /// Flatten every selected block into paragraphs.
    ToPlainText {
        /// Carry the selection over to the paragraphs.
        update_selection: bool,
    },
    /// Turn the selected content into one code block.
    InsertCodeBlock {
        /// Language of the new block (the first selected block's language otherwise).
        language: Option<String>,
    },
}

/// Any command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Edit commands
    Edit(EditCommand),
    /// Caret commands
    Caret(CaretCommand),
    /// Block commands
    Block(BlockCommand),
}

/// Command execution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The command acted (or deliberately swallowed the event).
    Handled,
    /// Not applicable here; the host should try its next handler.
    NotHandled,
    /// A toggle ran; carries the new value.
    Toggled(bool),
    /// Carries whether anything changed.
    Changed(bool),
    /// Blocks were flattened into these paragraphs.
    Converted(Vec<NodeId>),
    /// A code block was created.
    Inserted(NodeId),
}

impl CommandResult {
    fn handled_if(acted: bool) -> Self {
        if acted {
            CommandResult::Handled
        } else {
            CommandResult::NotHandled
        }
    }
}

/// Runs commands against a document and keeps a history.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    /// Document
    document: Document,
    /// Command history
    command_history: Vec<Command>,
}

impl CommandExecutor {
    /// Create an executor over `document`.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            command_history: Vec::new(),
        }
    }

    /// Create an executor over an empty document.
    pub fn empty() -> Self {
        Self::new(Document::new())
    }

    /// Execute command
    pub fn execute(&mut self, command: Command) -> CodeResult<CommandResult> {
        self.command_history.push(command.clone());

        let result = match command {
            Command::Edit(edit_cmd) => self.execute_edit(edit_cmd),
            Command::Caret(caret_cmd) => self.execute_caret(caret_cmd),
            Command::Block(block_cmd) => self.execute_block(block_cmd),
        }?;
        debug!(
            "command {:?} -> {result:?}",
            self.command_history.last()
        );
        Ok(result)
    }

    /// Batch execute commands
    pub fn execute_batch(&mut self, commands: Vec<Command>) -> CodeResult<Vec<CommandResult>> {
        let mut results = Vec::new();

        for command in commands {
            let result = self.execute(command)?;
            results.push(result);
        }

        Ok(results)
    }

    /// Get command history
    pub fn get_command_history(&self) -> &[Command] {
        &self.command_history
    }

    /// Document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable document (for host-side edits and selection changes).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Consume the executor, returning the document.
    pub fn into_document(self) -> Document {
        self.document
    }

    fn execute_edit(&mut self, command: EditCommand) -> CodeResult<CommandResult> {
        let doc = &mut self.document;
        let acted = match command {
            EditCommand::Indent => handle_dents(doc, DentDirection::Indent)?,
            EditCommand::Outdent => handle_dents(doc, DentDirection::Outdent)?,
            EditCommand::KeyTab { shift } => {
                let tabs = selected_block(doc)
                    .and_then(|block| doc.settings(block).ok())
                    .is_some_and(|settings| settings.activate_tabs);
                let direction = if shift {
                    DentDirection::Outdent
                } else {
                    DentDirection::Indent
                };
                tabs && handle_dents(doc, direction)?
            }
            EditCommand::MoveLinesUp => handle_shifting_lines(doc, Direction::Up)?.is_some(),
            EditCommand::MoveLinesDown => handle_shifting_lines(doc, Direction::Down)?.is_some(),
            EditCommand::Enter => split_line(doc)?,
            EditCommand::Backspace => delete_backward(doc)?,
            EditCommand::InsertText(text) => insert_text(doc, &text)?,
            EditCommand::Paste(payload) => insert_clipboard_data(doc, &payload)?,
            EditCommand::AddDiscreteLineClasses(classes) => {
                if selected_block(doc).is_none() {
                    return Ok(CommandResult::NotHandled);
                }
                return Ok(CommandResult::Changed(add_discrete_line_classes(doc, &classes)?));
            }
            EditCommand::RemoveDiscreteLineClasses(classes) => {
                if selected_block(doc).is_none() {
                    return Ok(CommandResult::NotHandled);
                }
                return Ok(CommandResult::Changed(remove_discrete_line_classes(
                    doc, &classes,
                )?));
            }
        };
        Ok(CommandResult::handled_if(acted))
    }

    fn execute_caret(&mut self, command: CaretCommand) -> CodeResult<CommandResult> {
        let doc = &mut self.document;
        let acted = match command {
            CaretCommand::ArrowUp => handle_borders(doc, Direction::Up)?,
            CaretCommand::ArrowDown => handle_borders(doc, Direction::Down)?,
            CaretCommand::LineStart => handle_move_to(doc, MoveTo::Start)?,
            CaretCommand::LineEnd => handle_move_to(doc, MoveTo::End)?,
        };
        Ok(CommandResult::handled_if(acted))
    }

    fn execute_block(&mut self, command: BlockCommand) -> CodeResult<CommandResult> {
        let doc = &mut self.document;
        match command {
            BlockCommand::ToPlainText { update_selection } => {
                let blocks = code_blocks_in_selection(doc);
                if blocks.is_empty() {
                    return Ok(CommandResult::NotHandled);
                }
                let mut paragraphs = Vec::new();
                for block in blocks {
                    paragraphs.extend(convert_to_plain_text(doc, block, update_selection)?);
                }
                return Ok(CommandResult::Converted(paragraphs));
            }
            BlockCommand::InsertCodeBlock { language } => {
                return Ok(
                    match insert_code_block_at_selection(doc, language.as_deref())? {
                        Some(block) => CommandResult::Inserted(block),
                        None => CommandResult::NotHandled,
                    },
                );
            }
            _ => {}
        }

        let Some(block) = selected_block(doc) else {
            return Ok(CommandResult::NotHandled);
        };
        Ok(match command {
            BlockCommand::ToggleTabs => CommandResult::Toggled(toggle_tabs(doc, block)?),
            BlockCommand::ToggleBlockLock => {
                CommandResult::Toggled(toggle_block_lock(doc, block)?)
            }
            BlockCommand::ToggleLineNumbers => {
                CommandResult::Toggled(toggle_line_numbers(doc, block)?)
            }
            BlockCommand::ChangeThemeName(name) => {
                change_theme_name(doc, block, &name)?;
                CommandResult::Handled
            }
            BlockCommand::SetLanguage(language) => {
                CommandResult::Changed(set_language(doc, block, &language)?)
            }
            BlockCommand::ToPlainText { .. } | BlockCommand::InsertCodeBlock { .. } => {
                CommandResult::NotHandled
            }
        })
    }
}
