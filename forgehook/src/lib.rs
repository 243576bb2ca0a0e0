#![deny(missing_docs)]
//! # forgehook — host umbrella crate
//!
//! Provides a single import surface for the ForgeHook host. Re-exports the
//! lifecycle engine, agent orchestrator, and adapter crates behind feature
//! flags, plus a `prelude` for the happy path.

#[cfg(feature = "core")]
pub use forgehook_core;
#[cfg(feature = "agent")]
pub use forgehook_agent;
#[cfg(feature = "lifecycle")]
pub use forgehook_lifecycle;
#[cfg(feature = "agent")]
pub use forgehook_llm_core;
#[cfg(feature = "llm-anthropic")]
pub use forgehook_llm_anthropic;
#[cfg(feature = "llm-ollama")]
pub use forgehook_llm_ollama;
#[cfg(feature = "llm-openai")]
pub use forgehook_llm_openai;
#[cfg(feature = "lifecycle")]
pub use forgehook_ports;
#[cfg(feature = "runtime-container")]
pub use forgehook_runtime_container;
#[cfg(feature = "runtime-embedded")]
pub use forgehook_runtime_embedded;
#[cfg(feature = "runtime-gateway")]
pub use forgehook_runtime_gateway;
#[cfg(feature = "state-fs")]
pub use forgehook_state_fs;
#[cfg(feature = "state-memory")]
pub use forgehook_state_memory;
#[cfg(feature = "lifecycle")]
pub use forgehook_tools;

/// Happy-path imports for composing a ForgeHook host.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use forgehook_core::{
        Agent, AgentConfig, AgentConfigOverride, AgentRun, ForgehookConfig, ForgehookError,
        HookId, HookInstance, HookManifest, HookStatus, InstanceId, PersistencePort, Runtime,
        RuntimeAdapter, RunStatus,
    };

    #[cfg(feature = "lifecycle")]
    pub use forgehook_lifecycle::HookLifecycleEngine;

    #[cfg(feature = "lifecycle")]
    pub use forgehook_ports::PortAllocator;

    #[cfg(feature = "lifecycle")]
    pub use forgehook_tools::{build_tool_name, build_tools, endpoint_key, parse_tool_name};

    #[cfg(feature = "agent")]
    pub use forgehook_agent::AgentOrchestrator;

    #[cfg(feature = "agent")]
    pub use forgehook_llm_core::provider::ChatProvider;
    #[cfg(feature = "agent")]
    pub use forgehook_llm_core::registry::ProviderRegistry;

    #[cfg(feature = "runtime-container")]
    pub use forgehook_runtime_container::ContainerRuntimeAdapter;

    #[cfg(feature = "runtime-embedded")]
    pub use forgehook_runtime_embedded::EmbeddedRuntimeAdapter;

    #[cfg(feature = "runtime-gateway")]
    pub use forgehook_runtime_gateway::GatewayRuntimeAdapter;

    #[cfg(feature = "state-memory")]
    pub use forgehook_state_memory::MemoryPersistence;

    #[cfg(feature = "state-fs")]
    pub use forgehook_state_fs::FsPersistence;
}
