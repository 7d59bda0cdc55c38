//! Streaming client for the Anthropic Messages API.
//!
//! One invocation = one POST with `stream: true`, consumed as
//! server-sent events. The SSE event soup is normalized into the
//! crate's [`StreamEvent`] order: text deltas as they arrive, each tool
//! call once its argument JSON is fully accumulated, then `Done`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;

use super::{ContentBlock, LlmClient, Message, Role, StreamEvent, ToolCallRequest, ToolDefinition};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API (streaming).
pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

// ── SSE wire format ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    message: Option<SseMessage>,
    content_block: Option<SseContentBlock>,
    delta: Option<SseDelta>,
    usage: Option<SseUsage>,
    error: Option<SseError>,
}

#[derive(Debug, Deserialize)]
struct SseMessage {
    usage: Option<SseUsage>,
}

#[derive(Debug, Deserialize)]
struct SseContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct SseError {
    message: String,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Maps conversation messages onto the Anthropic wire format.
    ///
    /// Tool messages become `user` messages carrying `tool_result`
    /// blocks — the API has no separate tool role.
    fn wire_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                };
                let content: Vec<Value> = msg.content.iter().map(wire_block).collect();
                json!({ "role": role, "content": content })
            })
            .collect()
    }

    fn wire_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect()
    }
}

fn wire_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::ToolUse { id, name, input } => {
            json!({ "type": "tool_use", "id": id, "name": name, "input": input })
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn stream_turn(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<mpsc::Receiver<Result<StreamEvent>>> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens_per_request,
            "system": system_prompt,
            "messages": Self::wire_messages(messages),
            "tools": Self::wire_tools(tools),
            "stream": true,
        });

        debug!(
            "Calling Claude API ({}) with {} messages, {} tools",
            self.config.model,
            messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            anyhow::bail!("Claude API error ({status}): {body}");
        }

        let (tx, rx) = mpsc::channel(32);
        let mut events = response.bytes_stream().eventsource();

        tokio::spawn(async move {
            // Pending tool call whose argument JSON is still streaming in
            let mut current_tool: Option<(String, String)> = None;
            let mut partial_json = String::new();
            let mut input_tokens = 0u32;
            let mut output_tokens = 0u32;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!("SSE stream error: {e}"))).await;
                        return;
                    }
                };

                let parsed: SseEvent = match serde_json::from_str(&event.data) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("Unparseable stream event ({e}): {}", event.data);
                        continue;
                    }
                };

                match parsed.event_type.as_str() {
                    "message_start" => {
                        if let Some(usage) = parsed.message.and_then(|m| m.usage) {
                            input_tokens = usage.input_tokens;
                        }
                    }
                    "content_block_start" => {
                        if let Some(block) = parsed.content_block {
                            if block.block_type == "tool_use" {
                                current_tool = Some((
                                    block.id.unwrap_or_default(),
                                    block.name.unwrap_or_default(),
                                ));
                                partial_json.clear();
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Some(delta) = parsed.delta {
                            if let Some(text) = delta.text {
                                if tx.send(Ok(StreamEvent::TextDelta(text))).await.is_err() {
                                    return;
                                }
                            }
                            if let Some(fragment) = delta.partial_json {
                                partial_json.push_str(&fragment);
                            }
                        }
                    }
                    "content_block_stop" => {
                        if let Some((id, name)) = current_tool.take() {
                            let arguments = if partial_json.is_empty() {
                                json!({})
                            } else {
                                match serde_json::from_str(&partial_json) {
                                    Ok(v) => v,
                                    Err(e) => {
                                        warn!("Malformed tool arguments ({e}): {partial_json}");
                                        json!({})
                                    }
                                }
                            };
                            partial_json.clear();

                            let call = ToolCallRequest {
                                id,
                                name,
                                arguments,
                            };
                            if tx.send(Ok(StreamEvent::ToolCall(call))).await.is_err() {
                                return;
                            }
                        }
                    }
                    "message_delta" => {
                        if let Some(usage) = parsed.usage {
                            output_tokens = usage.output_tokens;
                        }
                    }
                    "message_stop" => {
                        info!("LLM response: {input_tokens} in / {output_tokens} out tokens");
                        let _ = tx.send(Ok(StreamEvent::Done)).await;
                        return;
                    }
                    "error" => {
                        let reason = parsed
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "unknown".to_string());
                        let _ = tx.send(Err(anyhow!("Claude API error: {reason}"))).await;
                        return;
                    }
                    other => {
                        debug!("Ignoring stream event type: {other}");
                    }
                }
            }

            // Stream ended without message_stop — still unblock the reader
            let _ = tx.send(Ok(StreamEvent::Done)).await;
        });

        Ok(rx)
    }

    fn description(&self) -> String {
        format!("anthropic ({})", self.config.model)
    }
}
