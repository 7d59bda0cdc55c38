use thiserror::Error;

/// Everything that can go wrong while executing a tool call.
///
/// None of these escape the dispatcher: each variant renders through
/// `Display` into the text of a failed `ToolResult`, so the model sees
/// the reason and can retry with corrected input.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Path resolves outside the sandbox root, or cannot be
    /// canonicalized at all.
    #[error("Access denied: `{0}` resolves outside the sandbox root")]
    AccessDenied(String),

    /// Command matched a denylist rule.
    #[error("Command blocked: {0}")]
    CommandBlocked(String),

    /// The `edit` search text occurred zero or multiple times.
    #[error("Edit rejected: expected exactly one occurrence of the search text, found {0}")]
    AmbiguousEdit(usize),

    /// Subprocess exceeded the configured wall-clock timeout.
    #[error("Command timed out after {0}s")]
    Timeout(u64),

    /// The requested file or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model requested a tool name outside the descriptor table.
    #[error("Unknown tool: `{0}`")]
    UnknownTool(String),

    /// A required argument is missing or has the wrong type.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}
