#![deny(missing_docs)]
//! OpenAI Chat Completions dialect adapter for the LLM capability (§4.5).
//!
//! OpenAI keeps system prompts inline as `role: "system"` messages and
//! tool results as `role: "tool"` messages carrying `tool_call_id` — the
//! dialect closest to the capability's own internal shape.

mod wire;

use async_trait::async_trait;
use forgehook_llm_core::provider::ChatProvider;
use forgehook_llm_core::types::{
    ChatRequest, ChatResponse, FinishReason, FunctionCall, Role, ToolCall, Usage,
};
use wire::{
    OpenAIFunction, OpenAIFunctionCall, OpenAIMessage, OpenAIRequest, OpenAIResponse,
    OpenAITool, OpenAIToolCall,
};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI Chat Completions provider.
pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
    org_id: Option<String>,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            api_url: "https://api.openai.com/v1/chat/completions".into(),
            org_id: None,
        }
    }

    /// Override the API URL (for testing, proxies, or Azure OpenAI).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the `OpenAI-Organization` header for multi-org accounts.
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    fn build_request(&self, request: &ChatRequest) -> OpenAIRequest {
        let model = if request.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            request.model.clone()
        };

        let messages = request
            .messages
            .iter()
            .map(|m| {
                let (role, tool_call_id) = match m.role {
                    Role::System => ("system", None),
                    Role::User => ("user", None),
                    Role::Assistant => ("assistant", None),
                    Role::Tool => ("tool", m.tool_call_id.clone()),
                };

                let tool_calls = m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OpenAIToolCall {
                            id: tc.id.clone(),
                            call_type: "function".into(),
                            function: OpenAIFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: tc.function.arguments.clone(),
                            },
                        })
                        .collect()
                });

                OpenAIMessage {
                    role: role.to_string(),
                    content: m.content.clone(),
                    tool_calls,
                    tool_call_id,
                }
            })
            .collect();

        let tools: Vec<OpenAITool> = request
            .tools
            .iter()
            .map(|t| OpenAITool {
                tool_type: "function".into(),
                function: OpenAIFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        OpenAIRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
        }
    }

    fn parse_response(&self, response: OpenAIResponse) -> ChatResponse {
        let Some(choice) = response.choices.into_iter().next() else {
            return ChatResponse::error("no choices in response");
        };

        let content = choice
            .message
            .content
            .filter(|c| !c.is_empty());

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    },
                })
                .collect()
        });

        let finish_reason = match choice.finish_reason.as_str() {
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: Some(Usage {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: response.usage.completion_tokens,
            }),
            error: None,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let api_request = self.build_request(&request);
        tracing::debug!(model = %api_request.model, messages = api_request.messages.len(), "openai chat request");

        let mut builder = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        if let Some(org) = &self.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }

        let http_response = match builder.json(&api_request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "openai request failed");
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
            tracing::warn!(%status, "openai returned non-2xx");
            return ChatResponse::error(format!("HTTP {status}: {body}"));
        }

        match http_response.json::<OpenAIResponse>().await {
            Ok(api_response) => self.parse_response(api_response),
            Err(e) => ChatResponse::error(format!("invalid response: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgehook_llm_core::types::{ChatMessage, FunctionCall as CoreFunctionCall, ToolCall as CoreToolCall};
    use serde_json::json;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new("sk-test")
    }

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            provider: "openai".into(),
            model: String::new(),
            messages,
            tools: vec![],
            max_tokens: None,
            temperature: None,
        }
    }

    #[test]
    fn default_model_when_unset() {
        let req = request(vec![ChatMessage::text(Role::User, "hi")]);
        let api_request = provider().build_request(&req);
        assert_eq!(api_request.model, DEFAULT_MODEL);
    }

    #[test]
    fn system_message_stays_inline() {
        let req = request(vec![
            ChatMessage::text(Role::System, "Be helpful."),
            ChatMessage::text(Role::User, "hi"),
        ]);
        let api_request = provider().build_request(&req);
        assert_eq!(api_request.messages[0].role, "system");
        assert_eq!(api_request.messages[1].role, "user");
    }

    #[test]
    fn tool_result_message_keeps_tool_call_id() {
        let req = request(vec![ChatMessage::tool_result("call_1", "file.txt")]);
        let api_request = provider().build_request(&req);
        assert_eq!(api_request.messages[0].role, "tool");
        assert_eq!(api_request.messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_string() {
        let req = request(vec![ChatMessage::assistant_tool_calls(
            None,
            vec![CoreToolCall {
                id: "call_1".into(),
                function: CoreFunctionCall {
                    name: "echo__post_echo".into(),
                    arguments: "{\"msg\":\"hi\"}".into(),
                },
            }],
        )]);
        let api_request = provider().build_request(&req);
        let tool_calls = api_request.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.arguments, "{\"msg\":\"hi\"}");
    }

    #[test]
    fn parse_tool_calls_finish_reason() {
        let raw = json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"content": null, "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "bash", "arguments": "{\"cmd\":\"ls\"}"}}]},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        });
        let api_response: OpenAIResponse = serde_json::from_value(raw).unwrap();
        let response = provider().parse_response(api_response);
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls.unwrap()[0].function.name, "bash");
    }

    #[test]
    fn parse_stop_finish_reason() {
        let raw = json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "done"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        });
        let api_response: OpenAIResponse = serde_json::from_value(raw).unwrap();
        let response = provider().parse_response(api_response);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.content.as_deref(), Some("done"));
    }

    #[test]
    fn no_choices_is_an_error_response() {
        let raw = json!({"model": "gpt-4o-mini", "choices": [], "usage": {"prompt_tokens": 0, "completion_tokens": 0}});
        let api_response: OpenAIResponse = serde_json::from_value(raw).unwrap();
        let response = provider().parse_response(api_response);
        assert_eq!(response.finish_reason, FinishReason::Error);
    }

    #[test]
    fn name_is_openai() {
        assert_eq!(provider().name(), "openai");
    }
}
