//! Error type shared by every module.

use crate::document::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced by `lined-code` operations.
///
/// Selection mismatches and content edge cases are not errors: they surface as `Ok(false)`,
/// `Ok(None)` or [`CommandResult::NotHandled`](crate::CommandResult::NotHandled).
pub enum CodeError {
    #[error("setup error: {0}")]
    /// The tree is wired up in a way the operation cannot work with (development-time misuse).
    Setup(&'static str),

    #[error("unknown node {0}")]
    /// The id does not resolve to a live node.
    UnknownNode(NodeId),

    #[error("node {0} is not a code block")]
    /// The id resolves to a node of another kind.
    NotACodeBlock(NodeId),

    #[error("snapshot error: {0}")]
    /// JSON snapshot (or options) parsing/serialization failed.
    Snapshot(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    /// Filesystem I/O failed.
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type CodeResult<T> = Result<T, CodeError>;
