//! The object-safe LLM provider boundary.
//!
//! Unlike a generic-over-`Provider` design, the Agent Orchestrator selects
//! a provider at runtime from `agent.provider` (a plain string), so this
//! trait has to be dyn-dispatchable — the same reasoning that makes
//! `forgehook_core::RuntimeAdapter` and `PersistencePort` `async-trait`
//! instead of RPITIT.

use async_trait::async_trait;

use crate::types::ChatRequest;
use crate::types::ChatResponse;

/// One LLM provider dialect (Anthropic, OpenAI, Ollama, ...).
///
/// `chat` never returns an `Err` — a failed request is reported as a
/// [`ChatResponse`] with `finish_reason = Error`, per the capability's
/// contract that H has no exception surface.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// The dialect key this provider answers to, e.g. `"anthropic"`.
    fn name(&self) -> &'static str;

    /// Run one chat completion.
    async fn chat(&self, request: ChatRequest) -> ChatResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ChatProvider) {}
}
