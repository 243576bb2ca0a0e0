#![deny(missing_docs)]
//! Anthropic Messages API dialect adapter for the LLM capability (§4.5).
//!
//! Anthropic keeps the system prompt outside `messages` and represents tool
//! calls/results as typed content blocks rather than top-level fields — both
//! absorbed here so the Agent Orchestrator never sees them.

mod wire;

use async_trait::async_trait;
use forgehook_llm_core::provider::ChatProvider;
use forgehook_llm_core::types::{
    ChatRequest, ChatResponse, FinishReason, FunctionCall, Role, ToolCall, Usage,
};
use wire::{
    AnthropicContent, AnthropicContentBlock, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicTool,
};

const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
    api_version: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            api_url: "https://api.anthropic.com/v1/messages".into(),
            api_version: "2023-06-01".into(),
        }
    }

    /// Override the API URL (for testing or proxies).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_request(&self, request: &ChatRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            alias_model(&request.model)
        };

        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .filter_map(|m| m.content.as_deref())
            .collect();
        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        };

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| match m.role {
                Role::Tool => AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                        tool_use_id: m.tool_call_id.clone().unwrap_or_default(),
                        content: m.content.clone().unwrap_or_default(),
                        is_error: false,
                    }]),
                },
                Role::Assistant if m.tool_calls.is_some() => {
                    let mut blocks = Vec::new();
                    if let Some(text) = &m.content {
                        blocks.push(AnthropicContentBlock::Text { text: text.clone() });
                    }
                    for tc in m.tool_calls.as_ref().unwrap() {
                        blocks.push(AnthropicContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.function.name.clone(),
                            input: serde_json::from_str(&tc.function.arguments)
                                .unwrap_or(serde_json::Value::Null),
                        });
                    }
                    AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    }
                }
                Role::Assistant => AnthropicMessage {
                    role: "assistant".into(),
                    content: AnthropicContent::Text(m.content.clone().unwrap_or_default()),
                },
                Role::User => AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Text(m.content.clone().unwrap_or_default()),
                },
                Role::System => unreachable!("filtered above"),
            })
            .collect();

        let tools: Vec<AnthropicTool> = request
            .tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect();

        AnthropicRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(4096),
            messages,
            system,
            tools,
            temperature: request.temperature,
        }
    }

    fn parse_response(&self, response: AnthropicResponse) -> ChatResponse {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in &response.content {
            match block {
                AnthropicContentBlock::Text { text } => text_parts.push(text.clone()),
                AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id: id.clone(),
                    function: FunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                }),
                AnthropicContentBlock::ToolResult { .. } => {}
            }
        }

        let content = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };
        let tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        };

        let finish_reason = match response.stop_reason.as_str() {
            "tool_use" => FinishReason::ToolCalls,
            "max_tokens" => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: Some(Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
            error: None,
        }
    }
}

/// Short aliases resolved to the pinned model snapshot, per the capability's
/// "model-name aliasing applied inside the adapter" contract.
fn alias_model(name: &str) -> String {
    match name {
        "claude-sonnet" => "claude-sonnet-4-20250514".to_string(),
        "claude-haiku" => "claude-haiku-4-5-20251001".to_string(),
        "claude-opus" => "claude-opus-4-1-20250805".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let api_request = self.build_request(&request);
        tracing::debug!(model = %api_request.model, messages = api_request.messages.len(), "anthropic chat request");

        let http_response = match self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "anthropic request failed");
                return ChatResponse::error(format!("request failed: {e}"));
            }
        };

        let status = http_response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return ChatResponse::error("authentication failed");
        }
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            tracing::warn!(%status, "anthropic returned non-2xx");
            return ChatResponse::error(format!("HTTP {status}: {body}"));
        }

        match http_response.json::<AnthropicResponse>().await {
            Ok(api_response) => self.parse_response(api_response),
            Err(e) => ChatResponse::error(format!("invalid response: {e}")),
        }
    }
}
