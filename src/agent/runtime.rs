use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::LimitsConfig;
use crate::llm::{ContentBlock, LlmClient, Message, StreamEvent, ToolDefinition};
use crate::tools::ToolDispatcher;

/// The turn-orchestration loop — core of patchbox.
///
/// Owns the append-only conversation history. Per user input it
/// invokes the model, streams text out, dispatches any requested tool
/// calls, feeds the results back, and repeats until the model stops
/// calling tools or the turn ceiling is hit. The ceiling guarantees
/// termination: the loop never makes more than `max_turns` model
/// invocations per user input.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolDefinition>,
    limits: LimitsConfig,
    system_prompt: String,
    history: Vec<Message>,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: ToolDispatcher,
        limits: LimitsConfig,
        sandbox_root: &str,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            tools: ToolDispatcher::definitions(),
            limits,
            system_prompt: build_system_prompt(sandbox_root),
            history: Vec::new(),
        }
    }

    /// Processes one user input to completion.
    ///
    /// Text fragments are forwarded to `on_text` in arrival order as
    /// they stream in. Returns the final assistant text. A transport
    /// failure of the model service ends the turn with `Err`; the
    /// conversation survives for the next input.
    pub async fn handle_input(
        &mut self,
        input: &str,
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        self.history.push(Message::user(input));

        let max_turns = self.limits.max_turns.max(1);
        let mut final_text = String::new();

        for turn in 1..=max_turns {
            debug!("Model turn {turn}/{max_turns}");

            let mut events = self
                .llm
                .stream_turn(&self.system_prompt, &self.history, &self.tools)
                .await?;

            let mut text = String::new();
            let mut calls = Vec::new();

            // Single consumer; arrival order is preserved for both
            // text fragments and tool-call requests.
            while let Some(event) = events.recv().await {
                match event? {
                    StreamEvent::TextDelta(delta) => {
                        on_text(&delta);
                        text.push_str(&delta);
                    }
                    StreamEvent::ToolCall(call) => calls.push(call),
                    StreamEvent::Done => break,
                }
            }

            if !text.is_empty() {
                final_text = text.clone();
            }

            // No tool calls: the accumulated text is the final answer.
            if calls.is_empty() {
                self.history
                    .push(Message::assistant(vec![ContentBlock::Text { text }]));
                return Ok(final_text);
            }

            // Record the assistant request before any tool result, so
            // every tool message answers a preceding tool_use block.
            let mut blocks = Vec::new();
            if !text.is_empty() {
                blocks.push(ContentBlock::Text { text });
            }
            for call in &calls {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                });
            }
            self.history.push(Message::assistant(blocks));

            for call in &calls {
                let result = self.dispatcher.dispatch(call).await;
                debug!(
                    "Tool {} -> {} ({} chars)",
                    call.name,
                    if result.success { "ok" } else { "error" },
                    result.text.len()
                );
                self.history
                    .push(Message::tool_result(&call.id, result.text, !result.success));
            }

            info!("Turn {turn}/{max_turns}: dispatched {} tool call(s)", calls.len());
        }

        warn!("Turn ceiling reached ({max_turns}), stopping this input");
        Ok(final_text)
    }
}

fn build_system_prompt(sandbox_root: &str) -> String {
    format!(
        "You are patchbox, a coding assistant working inside a sandbox directory.\n\
         Your working directory is: {sandbox_root}\n\n\
         Rules:\n\
         - All file paths are relative to the sandbox root; you cannot reach outside it\n\
         - Use the view/write/edit tools for files and run_command for shell commands\n\
         - When a tool call fails, read the reason and correct your input\n\
         - Be concise; answer in plain text"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Role, ToolCallRequest};
    use crate::sandbox::PathGuard;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Scripted model: plays one event list per invocation, then
    /// repeats the last script forever. Counts invocations.
    struct ScriptedClient {
        scripts: Mutex<Vec<Vec<StreamEvent>>>,
        invocations: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
                invocations: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    fn text(s: &str) -> StreamEvent {
        StreamEvent::TextDelta(s.to_string())
    }

    fn view_call(id: &str) -> StreamEvent {
        StreamEvent::ToolCall(ToolCallRequest {
            id: id.to_string(),
            name: "view".to_string(),
            arguments: json!({"path": "."}),
        })
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn stream_turn(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<mpsc::Receiver<Result<StreamEvent>>> {
            let n = self.invocations.fetch_add(1, Ordering::SeqCst);
            let events = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.is_empty() {
                    // Out of script: a model that always calls a tool
                    vec![view_call(&format!("toolu_{n}")), StreamEvent::Done]
                } else {
                    scripts.remove(0)
                }
            };

            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }

        fn description(&self) -> String {
            "scripted".to_string()
        }
    }

    fn runtime(llm: Arc<dyn LlmClient>, root: &std::path::Path, max_turns: usize) -> AgentRuntime {
        let dispatcher = ToolDispatcher::new(PathGuard::new(root).unwrap(), Duration::from_secs(5));
        let limits = LimitsConfig {
            max_turns,
            command_timeout_secs: 5,
        };
        AgentRuntime::new(llm, dispatcher, limits, &root.display().to_string())
    }

    #[tokio::test]
    async fn test_text_only_turn_is_final() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedClient::new(vec![vec![
            text("Hello "),
            text("world"),
            StreamEvent::Done,
        ]]));
        let mut runtime = runtime(llm.clone(), dir.path(), 5);

        let mut streamed = String::new();
        let answer = runtime
            .handle_input("hi", &mut |s: &str| streamed.push_str(s))
            .await
            .unwrap();

        assert_eq!(answer, "Hello world");
        assert_eq!(streamed, "Hello world");
        assert_eq!(llm.count(), 1);
        // user + assistant
        assert_eq!(runtime.history.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let llm = Arc::new(ScriptedClient::new(vec![
            vec![text("Let me check."), view_call("toolu_1"), StreamEvent::Done],
            vec![text("There is one file."), StreamEvent::Done],
        ]));
        let mut runtime = runtime(llm.clone(), dir.path(), 5);

        let answer = runtime
            .handle_input("what files are there?", &mut |_: &str| {})
            .await
            .unwrap();

        assert_eq!(answer, "There is one file.");
        assert_eq!(llm.count(), 2);

        // user, assistant(tool_use), tool, assistant
        let roles: Vec<Role> = runtime.history.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

        // The tool message answers the preceding assistant request
        let ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } = &runtime.history[2].content[0]
        else {
            panic!("Expected a tool_result block");
        };
        assert_eq!(tool_use_id, "toolu_1");
        assert!(!*is_error);
        assert!(content.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_turn_ceiling_terminates_loop() {
        let dir = tempfile::tempdir().unwrap();
        // No scripts: every invocation requests another tool call
        let llm = Arc::new(ScriptedClient::new(vec![]));
        let mut runtime = runtime(llm.clone(), dir.path(), 3);

        runtime.handle_input("loop forever", &mut |_: &str| {}).await.unwrap();

        // Exactly max_turns model invocations, never more
        assert_eq!(llm.count(), 3);
    }

    #[tokio::test]
    async fn test_failed_tool_result_is_recorded_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedClient::new(vec![
            vec![
                StreamEvent::ToolCall(ToolCallRequest {
                    id: "toolu_bad".to_string(),
                    name: "view".to_string(),
                    arguments: json!({"path": "../outside"}),
                }),
                StreamEvent::Done,
            ],
            vec![text("That path is off limits."), StreamEvent::Done],
        ]));
        let mut runtime = runtime(llm.clone(), dir.path(), 5);

        runtime.handle_input("read ../outside", &mut |_: &str| {}).await.unwrap();

        let ContentBlock::ToolResult { is_error, content, .. } = &runtime.history[2].content[0]
        else {
            panic!("Expected a tool_result block");
        };
        assert!(*is_error);
        assert!(content.contains("Access denied"));
    }

    #[tokio::test]
    async fn test_history_grows_across_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedClient::new(vec![
            vec![text("one"), StreamEvent::Done],
            vec![text("two"), StreamEvent::Done],
        ]));
        let mut runtime = runtime(llm, dir.path(), 5);

        runtime.handle_input("first", &mut |_: &str| {}).await.unwrap();
        assert_eq!(runtime.history.len(), 2);
        runtime.handle_input("second", &mut |_: &str| {}).await.unwrap();
        assert_eq!(runtime.history.len(), 4);
    }
}
