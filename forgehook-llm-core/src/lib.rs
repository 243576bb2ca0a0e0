//! # forgehook-llm-core — the LLM capability's shared shape
//!
//! Defines the provider-agnostic chat request/response types (§4.5), the
//! object-safe [`ChatProvider`] trait each dialect adapter implements, and
//! a small [`ProviderRegistry`] the Agent Orchestrator uses to dispatch on
//! `agent.provider` at runtime.

#![deny(missing_docs)]

pub mod provider;
pub mod registry;
pub mod types;

pub use provider::ChatProvider;
pub use registry::ProviderRegistry;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, FinishReason, FunctionCall, Role, ToolCall,
    ToolSchema, Usage,
};
