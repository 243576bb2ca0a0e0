//! Dialect-keyed lookup from `agent.provider` to a [`ChatProvider`].
//!
//! An unknown provider key is itself one of the documented failure modes of
//! H, so lookup returns a [`ChatResponse`] directly rather than a
//! `Result` — callers never need a separate error path for "no such
//! provider" versus "the provider returned an error".

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::ChatProvider;
use crate::types::{ChatRequest, ChatResponse};

/// Maps provider dialect keys to their adapter.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its own [`ChatProvider::name`].
    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Dispatch a chat request to the provider named by `request.provider`.
    /// An unregistered provider yields `finish_reason = Error` rather than
    /// panicking or returning `Result`.
    pub async fn chat(&self, request: ChatRequest) -> ChatResponse {
        match self.providers.get(&request.provider) {
            Some(provider) => provider.chat(request).await,
            None => ChatResponse::error(format!("unknown provider \"{}\"", request.provider)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FinishReason;

    struct StubProvider;

    #[async_trait::async_trait]
    impl ChatProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn chat(&self, _request: ChatRequest) -> ChatResponse {
            ChatResponse {
                content: Some("hi".into()),
                tool_calls: None,
                finish_reason: FinishReason::Stop,
                usage: None,
                error: None,
            }
        }
    }

    fn request(provider: &str) -> ChatRequest {
        ChatRequest {
            provider: provider.into(),
            model: "m".into(),
            messages: vec![],
            tools: vec![],
            max_tokens: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider));
        let resp = registry.chat(request("stub")).await;
        assert_eq!(resp.content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error_response_not_a_panic() {
        let registry = ProviderRegistry::new();
        let resp = registry.chat(request("nonexistent")).await;
        assert_eq!(resp.finish_reason, FinishReason::Error);
        assert!(resp.error.unwrap().contains("nonexistent"));
    }
}
