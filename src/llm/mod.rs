//! Provider-neutral conversation model and the [`LlmClient`] seam.
//!
//! The agent loop only ever sees these types plus the ordered
//! [`StreamEvent`] channel; how they map onto a provider's wire format
//! is the provider's business.

pub mod anthropic;
pub mod client;

use serde_json::Value;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    /// Result of a tool call, answering a preceding assistant request.
    Tool,
}

/// One unit of message content.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// A tool invocation the assistant requested.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// The outcome of a tool invocation, tagged with the request it
    /// answers.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// One entry of the conversation history.
///
/// The history is append-only: the loop pushes messages and never
/// mutates existing ones.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
        }
    }
}

/// Schema-described tool exposed to the model.
///
/// Serialized verbatim into the provider's `tools[]` array. Built once
/// at startup and read-only thereafter.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Provider-assigned id; the eventual tool result carries it back.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Ordered events of one model invocation.
///
/// A single consumer reads these off an mpsc channel; arrival order is
/// concatenation order for text and execution order for tool calls.
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental fragment of assistant text.
    TextDelta(String),
    /// A complete tool call (arguments fully accumulated).
    ToolCall(ToolCallRequest),
    /// End of this invocation; no further events will arrive.
    Done,
}
