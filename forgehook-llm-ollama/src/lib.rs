#![deny(missing_docs)]
//! Ollama local model dialect adapter for the LLM capability (§4.5).
//!
//! Ollama runs models locally: there are no auth headers, and any non-2xx
//! or transport failure becomes `finish_reason = Error` rather than an
//! exception, per the capability's "no exception surface" contract.

mod wire;

use async_trait::async_trait;
use forgehook_llm_core::provider::ChatProvider;
use forgehook_llm_core::types::{
    ChatRequest, ChatResponse, FinishReason, FunctionCall, Role, ToolCall, Usage,
};
use uuid::Uuid;
use wire::{OllamaFunction, OllamaFunctionCall, OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse, OllamaTool, OllamaToolCall};

const DEFAULT_MODEL: &str = "llama3.2:1b";

/// Ollama local model provider.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    keep_alive: Option<String>,
}

impl OllamaProvider {
    /// Create a new Ollama provider pointed at the default local endpoint,
    /// `http://localhost:11434/api/chat`.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: "http://localhost:11434/api/chat".into(),
            keep_alive: None,
        }
    }

    /// Override the API URL (for remote Ollama instances or custom ports).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the `keep_alive` duration for how long Ollama keeps the model
    /// loaded, e.g. `"5m"`, `"0"`, `"-1"`.
    pub fn with_keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.keep_alive = Some(duration.into());
        self
    }

    fn build_request(&self, request: &ChatRequest) -> OllamaRequest {
        let model = if request.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            alias_model(&request.model)
        };

        let messages = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string();

                let tool_calls = m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: serde_json::from_str(&tc.function.arguments)
                                    .unwrap_or(serde_json::Value::Null),
                            },
                        })
                        .collect()
                });

                OllamaMessage {
                    role,
                    content: m.content.clone().unwrap_or_default(),
                    tool_calls,
                }
            })
            .collect();

        let tools: Vec<OllamaTool> = request
            .tools
            .iter()
            .map(|t| OllamaTool {
                tool_type: "function".into(),
                function: OllamaFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaRequest {
            model,
            messages,
            stream: false,
            tools,
            keep_alive: self.keep_alive.clone(),
            options,
        }
    }

    fn parse_response(&self, response: OllamaResponse) -> ChatResponse {
        let content = if response.message.content.is_empty() {
            None
        } else {
            Some(response.message.content.clone())
        };

        let tool_calls = response.message.tool_calls.as_ref().and_then(|calls| {
            if calls.is_empty() {
                return None;
            }
            Some(
                calls
                    .iter()
                    .map(|tc| ToolCall {
                        id: Uuid::new_v4().to_string(),
                        function: FunctionCall {
                            name: tc.function.name.clone(),
                            arguments: tc.function.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        });

        let finish_reason = if tool_calls.is_some() {
            FinishReason::ToolCalls
        } else {
            match response.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            }
        };

        ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: Some(Usage {
                input_tokens: response.prompt_eval_count.unwrap_or(0),
                output_tokens: response.eval_count.unwrap_or(0),
            }),
            error: None,
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Ollama has no short-name aliasing today; identity mapping kept as the
/// single seam the other dialect adapters also expose, so a future local
/// alias table (e.g. `"llama3"` -> a pinned tag) has one place to live.
fn alias_model(name: &str) -> String {
    name.to_string()
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let api_request = self.build_request(&request);
        tracing::debug!(model = %api_request.model, messages = api_request.messages.len(), "ollama chat request");

        let http_response = match self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "ollama request failed");
                return ChatResponse::error(format!("request failed: {e}"));
            }
        };

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            tracing::warn!(%status, "ollama returned non-2xx");
            return ChatResponse::error(format!("HTTP {status}: {body}"));
        }

        match http_response.json::<OllamaResponse>().await {
            Ok(api_response) => self.parse_response(api_response),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse ollama response");
                ChatResponse::error(format!("invalid response: {e}"))
            }
        }
    }
}
