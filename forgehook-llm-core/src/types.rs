//! Wire-agnostic types for the LLM capability (§4.5).
//!
//! These are the internal lingua franca — not Anthropic's shape, not
//! OpenAI's shape, not Ollama's shape. Each provider adapter translates to
//! and from this shape; the differences between dialects never leak past
//! the adapter boundary.

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
    /// Result of a tool call, fed back to the model.
    Tool,
}

/// A function the model requested to call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name as the model saw it (see the Tool Schema Builder).
    pub name: String,
    /// JSON-encoded argument object. Kept as a string because that is what
    /// every dialect actually transmits on the wire; the caller parses it.
    pub arguments: String,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque id correlating this call with its eventual `tool` message.
    pub id: String,
    /// The function the model wants invoked.
    pub function: FunctionCall,
}

/// One message in the conversation sent to or received from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Text content. Absent on an assistant message that is pure tool
    /// calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set on a `tool` message: which call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on an `assistant` message that requested tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    /// Build a plain system/user/assistant message with just text.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Build the `tool` message fed back after dispatching a call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// Build the assistant message recording requested tool calls.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }
}

/// JSON-Schema description of one tool, as projected by the Tool Schema
/// Builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name, `{hookId}__{action}`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input object.
    pub parameters: serde_json::Value,
}

/// Request for a single chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Dialect-selecting provider key, e.g. `"anthropic"`, `"openai"`, `"ollama"`.
    pub provider: String,
    /// Model identifier, subject to adapter-side aliasing.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools available this turn.
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    /// Maximum output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Model produced a final response.
    Stop,
    /// Model wants to invoke one or more tools.
    ToolCalls,
    /// Hit `maxTokens`.
    Length,
    /// Unknown provider, missing credential, HTTP error, or a response that
    /// failed to parse. `error` on the response carries the detail.
    Error,
}

/// Token accounting from one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
}

/// Result of one `Chat` call. Never an `Err` — failure is represented as
/// `finish_reason = Error` with `error` populated, per the capability's "no
/// exception surface" contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content, when the model produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the model, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token usage, when the provider reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Populated iff `finish_reason == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// Build an error response. Never panics, never throws — this is how
    /// adapters report failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: None,
            tool_calls: None,
            finish_reason: FinishReason::Error,
            usage: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_serde_roundtrip() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(role, back);
        }
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", "{\"msg\":\"hi\"}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn finish_reason_roundtrip() {
        for reason in [
            FinishReason::Stop,
            FinishReason::ToolCalls,
            FinishReason::Length,
            FinishReason::Error,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            let back: FinishReason = serde_json::from_str(&json).unwrap();
            assert_eq!(reason, back);
        }
        assert_eq!(serde_json::to_string(&FinishReason::ToolCalls).unwrap(), "\"tool_calls\"");
    }

    #[test]
    fn error_response_has_no_content_or_usage() {
        let resp = ChatResponse::error("unknown provider \"foo\"");
        assert_eq!(resp.finish_reason, FinishReason::Error);
        assert!(resp.content.is_none());
        assert_eq!(resp.error.as_deref(), Some("unknown provider \"foo\""));
    }

    #[test]
    fn tool_schema_serializes_parameters_verbatim() {
        let schema = ToolSchema {
            name: "echo__post_echo".into(),
            description: "echo: POST /echo".into(),
            parameters: json!({"type": "object", "properties": {"msg": {"type": "string"}}, "required": ["msg"]}),
        };
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["parameters"]["required"][0], "msg");
    }
}
