//! Tool surface exposed to the model.
//!
//! A fixed descriptor table declares the four callable tools; the
//! dispatcher routes each [`ToolCallRequest`] through the sandbox
//! checks to the matching executor. Schema and handler live together
//! here — nothing is derived reflectively.

pub mod error;
mod fs;
mod shell;

use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use crate::llm::{ToolCallRequest, ToolDefinition};
use crate::sandbox::{CommandFilter, PathGuard};

pub use error::ToolError;

/// Outcome of one tool call, always textual so it can be folded back
/// into the conversation.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub text: String,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
        }
    }
}

/// Routes model-issued tool calls to the sandboxed executors.
///
/// `dispatch` never fails: every error kind becomes a failed
/// [`ToolResult`] whose text tells the model what went wrong.
pub struct ToolDispatcher {
    guard: PathGuard,
    command_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(guard: PathGuard, command_timeout: Duration) -> Self {
        Self {
            guard,
            command_timeout,
        }
    }

    /// The fixed descriptor table, built once at startup.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "view".to_string(),
                description: "View a file's content with line numbers, or list a directory. \
                              Paths are relative to the sandbox root."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File or directory to view, relative to the sandbox root"
                        },
                        "start_line": {
                            "type": "integer",
                            "description": "First line to show (1-indexed, inclusive)"
                        },
                        "end_line": {
                            "type": "integer",
                            "description": "Last line to show (1-indexed, inclusive)"
                        }
                    },
                    "required": ["path"]
                }),
            },
            ToolDefinition {
                name: "write".to_string(),
                description: "Write content to a file, overwriting existing content and \
                              creating parent directories as needed."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File to write, relative to the sandbox root"
                        },
                        "content": {
                            "type": "string",
                            "description": "The full content to write"
                        }
                    },
                    "required": ["path", "content"]
                }),
            },
            ToolDefinition {
                name: "edit".to_string(),
                description: "Replace an exact text snippet in a file with new text. Fails \
                              unless the snippet occurs exactly once."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File to edit, relative to the sandbox root"
                        },
                        "old_text": {
                            "type": "string",
                            "description": "The EXACT text to find and replace"
                        },
                        "new_text": {
                            "type": "string",
                            "description": "The replacement text"
                        }
                    },
                    "required": ["path", "old_text", "new_text"]
                }),
            },
            ToolDefinition {
                name: "run_command".to_string(),
                description: "Run a shell command inside the sandbox root. Commands touching \
                              paths outside the sandbox are rejected; execution is bounded by \
                              a fixed timeout."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "The shell command to execute"
                        }
                    },
                    "required": ["command"]
                }),
            },
        ]
    }

    /// Dispatches one tool call. All failures are returned as textual
    /// results; nothing propagates to the caller.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolResult {
        info!("Tool call: {} {}", call.name, call.arguments);
        match self.run(call).await {
            Ok(text) => ToolResult::success(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn run(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let args = &call.arguments;
        match call.name.as_str() {
            "view" => self.view(args),
            "write" => self.write(args),
            "edit" => self.edit(args),
            "run_command" => self.run_command(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    // ── Handlers ─────────────────────────────────────────

    fn view(&self, args: &Value) -> Result<String, ToolError> {
        let rel = require_str(args, "path")?;
        let range = match (optional_line(args, "start_line")?, optional_line(args, "end_line")?) {
            (None, None) => None,
            (start, end) => Some((start.unwrap_or(1), end.unwrap_or(usize::MAX))),
        };

        let path = self.guard.resolve(rel)?;
        if path.is_dir() {
            fs::list_dir(&path)
        } else {
            fs::view_file(&path, range)
        }
    }

    fn write(&self, args: &Value) -> Result<String, ToolError> {
        let rel = require_str(args, "path")?;
        let content = require_str(args, "content")?;

        let path = self.guard.resolve_for_write(rel)?;
        fs::write_file(&path, content)?;
        Ok(format!("Wrote {} bytes to {rel}", content.len()))
    }

    fn edit(&self, args: &Value) -> Result<String, ToolError> {
        let rel = require_str(args, "path")?;
        let old = require_str(args, "old_text")?;
        let new = require_str(args, "new_text")?;

        let path = self.guard.resolve(rel)?;
        fs::edit_file(&path, old, new)?;
        Ok(format!("Edited {rel}"))
    }

    async fn run_command(&self, args: &Value) -> Result<String, ToolError> {
        let command = require_str(args, "command")?;
        CommandFilter::check(command)?;
        shell::run_command(command, self.guard.root(), self.command_timeout).await
    }
}

// ── Argument extraction ──────────────────────────────────
// Runs before any sandbox check or I/O: malformed requests
// short-circuit without touching the guards.

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required string `{field}`")))
}

fn optional_line(args: &Value, field: &str) -> Result<Option<usize>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| ToolError::InvalidArguments(format!("`{field}` must be an integer"))),
    }
}
