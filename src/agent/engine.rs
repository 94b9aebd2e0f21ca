use std::path::Path;

use crate::agent::claude::{
    ClaudeClient, ContentBlock, Message, MessageContent, MessagesRequest, StopReason,
};
use crate::agent::tools::{ToolOutput, ToolRegistry};
use crate::error::{AppError, Result};

/// Outcome of an agent run.
#[derive(Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Agent finished; `summary` is its final answer.
    Completed { summary: String },
    /// Agent hit the turn limit without finishing.
    TurnLimitReached,
    /// Agent hit Claude API rate limits.
    RateLimited { message: String },
    /// Nobody is listening for the result anymore.
    Cancelled,
    /// Agent encountered an error.
    Failed { error: String },
}

pub struct AgentEngine {
    client: ClaudeClient,
    tools: ToolRegistry,
    max_turns: u32,
}

impl AgentEngine {
    pub fn new(client: ClaudeClient, tools: ToolRegistry, max_turns: u32) -> Self {
        Self {
            client,
            tools,
            max_turns,
        }
    }

    /// Run the agentic loop.
    ///
    /// - `system_prompt`: The system prompt with the failure context.
    /// - `workspace_root`: The root directory of the cloned repo.
    /// - `initial_message`: The initial user message to start the conversation.
    /// - `is_cancelled`: Checked before each turn; returns true if work should stop.
    /// - `on_progress`: Receives the assistant's text after each turn.
    pub async fn run<F, P>(
        &self,
        system_prompt: &str,
        workspace_root: &Path,
        initial_message: &str,
        is_cancelled: F,
        on_progress: P,
    ) -> AgentOutcome
    where
        F: Fn() -> bool,
        P: Fn(&str),
    {
        let tool_definitions = self.tools.definitions();

        let mut messages = vec![Message::user(initial_message)];

        let mut total_input_tokens = 0u32;
        let mut total_output_tokens = 0u32;

        for turn in 0..self.max_turns {
            if is_cancelled() {
                tracing::info!("Agent cancelled");
                return AgentOutcome::Cancelled;
            }

            tracing::debug!(turn = turn, "Agent turn");

            let request = MessagesRequest {
                model: self.client.model().to_string(),
                max_tokens: self.client.max_tokens(),
                system: system_prompt.to_string(),
                messages: messages.clone(),
                tools: tool_definitions.clone(),
            };

            let response = match self.client.send_message(&request).await {
                Ok(r) => r,
                Err(AppError::ClaudeRateLimited(msg)) => {
                    tracing::warn!("Claude API rate limited, stopping agent");
                    return AgentOutcome::RateLimited { message: msg };
                }
                Err(e) => {
                    return AgentOutcome::Failed {
                        error: format!("Claude API error: {e}"),
                    };
                }
            };

            total_input_tokens += response.usage.input_tokens;
            total_output_tokens += response.usage.output_tokens;

            tracing::debug!(
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Claude response"
            );

            let text = extract_text(&response.content);
            if !text.is_empty() {
                on_progress(&text);
            }

            match response.stop_reason {
                Some(StopReason::EndTurn) | Some(StopReason::StopSequence) => {
                    tracing::info!(
                        total_input_tokens,
                        total_output_tokens,
                        turns = turn + 1,
                        "Agent completed"
                    );
                    return AgentOutcome::Completed { summary: text };
                }
                Some(StopReason::ToolUse) => {
                    messages.push(Message {
                        role: "assistant".to_string(),
                        content: MessageContent::Blocks(response.content.clone()),
                    });

                    let mut tool_results = Vec::new();

                    for block in &response.content {
                        if let ContentBlock::ToolUse { id, name, input } = block {
                            tracing::debug!(tool = %name, "Executing tool");

                            let (content, is_error) =
                                match self.execute_tool(workspace_root, name, input).await {
                                    Ok(ToolOutput::Success(content)) => (content, None),
                                    Ok(ToolOutput::Error(error)) => {
                                        tracing::debug!(tool = %name, error = %error, "Tool error");
                                        (error, Some(true))
                                    }
                                    Err(e) => {
                                        tracing::warn!(tool = %name, error = %e, "Tool execution error");
                                        (format!("Internal error: {e}"), Some(true))
                                    }
                                };

                            tool_results.push(ContentBlock::ToolResult {
                                tool_use_id: id.clone(),
                                content,
                                is_error,
                            });
                        }
                    }

                    messages.push(Message {
                        role: "user".to_string(),
                        content: MessageContent::Blocks(tool_results),
                    });
                }
                Some(StopReason::MaxTokens) => {
                    tracing::warn!("Agent response hit max_tokens limit");
                    messages.push(Message {
                        role: "assistant".to_string(),
                        content: MessageContent::Blocks(response.content),
                    });
                    messages.push(Message::user("Please continue."));
                }
                other => {
                    tracing::warn!(stop_reason = ?other, "Unexpected stop reason");
                    return AgentOutcome::Failed {
                        error: format!("Unexpected stop reason: {other:?}"),
                    };
                }
            }
        }

        tracing::warn!(max_turns = self.max_turns, "Agent hit turn limit");
        AgentOutcome::TurnLimitReached
    }

    async fn execute_tool(
        &self,
        workspace_root: &Path,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AppError::Agent(format!("Unknown tool: {name}")))?;

        tool.execute(workspace_root, input.clone()).await
    }
}

fn extract_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| {
            if let ContentBlock::Text { text } = block {
                Some(text.as_str())
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_skips_tool_blocks() {
        let blocks = vec![
            ContentBlock::Text {
                text: "first".to_string(),
            },
            ContentBlock::ToolUse {
                id: "1".to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({}),
            },
            ContentBlock::Text {
                text: "second".to_string(),
            },
        ];
        assert_eq!(extract_text(&blocks), "first\nsecond");
    }

    #[tokio::test]
    async fn test_cancelled_before_first_turn() {
        let config: crate::config::ClaudeConfig = serde_json::from_value(serde_json::json!({
            "api_key": "sk-test"
        }))
        .unwrap();
        let engine = AgentEngine::new(
            ClaudeClient::from_config(&config),
            ToolRegistry::read_only(1024, 10),
            5,
        );

        let outcome = engine
            .run("system", Path::new("."), "go", || true, |_| {})
            .await;
        assert_eq!(outcome, AgentOutcome::Cancelled);
    }
}
