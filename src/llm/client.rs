//! `LlmClient` trait — abstraction over LLM backends.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Message, StreamEvent, ToolDefinition};

/// Abstraction over streaming LLM backends.
///
/// A provider translates the shared message/tool types into its wire
/// format and feeds normalized [`StreamEvent`]s, in arrival order, into
/// the returned channel. Exactly one consumer reads it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Starts one model invocation over the full conversation.
    ///
    /// Returns the event channel for this invocation. Transport
    /// failures surface either here or as an `Err` item on the
    /// channel; both are fatal to the current turn only.
    async fn stream_turn(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<mpsc::Receiver<Result<StreamEvent>>>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in status output, e.g. `"anthropic (claude-sonnet-4-5)"`.
    fn description(&self) -> String;
}
