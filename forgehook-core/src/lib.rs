//! # forgehook-core — shared protocol types for the ForgeHook host
//!
//! This crate defines the domain model, the error taxonomy, and the two
//! trait boundaries that the rest of the host is built against:
//!
//! | Boundary | Trait | What it does |
//! |----------|-------|--------------|
//! | Runtime | [`RuntimeAdapter`] | Install/start/stop/invoke one hook, regardless of runtime kind |
//! | Persistence | [`PersistencePort`] | The only data abstraction the core depends on |
//!
//! ## Design principle
//!
//! Every trait here is operation-defined, not mechanism-defined — exactly
//! the same principle the rest of this lineage follows: `RuntimeAdapter`
//! means "provision/run/invoke this hook," not "shell out to the Docker
//! CLI." That is what lets a container adapter, an in-process adapter, and
//! an HTTP-proxy adapter all satisfy the Hook Lifecycle Engine's single
//! `runtime -> Arc<dyn RuntimeAdapter>` dispatch map.
//!
//! ## Dependency notes
//!
//! Like the rest of this lineage, extension data (manifests' `config`,
//! agent runs' `output`) is carried as `serde_json::Value` rather than a
//! generic `T: Serialize`, because the wire boundary here genuinely is JSON
//! (LLM tool-call arguments, hook request/response bodies) and a generic
//! parameter would not be object-safe.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod id;
pub mod duration;
pub mod model;
pub mod persistence;
pub mod progress;
pub mod retry;
pub mod runtime;

pub use config::ForgehookConfig;
pub use duration::DurationMs;
pub use error::{ErrorEnvelope, ForgehookError};
pub use id::{AgentId, HookId, InstallId, InstanceId, RunId};
pub use model::{
    Agent, AgentConfig, AgentConfigOverride, AgentRun, Dependencies, Endpoint, HealthCheck,
    HealthStatus, HookInstance, HookManifest, HookStatus, HttpMethod, ImageRef,
    LifecycleEvent, LifecycleEventType, ResourceLimits, Runtime, RunStatus, RunStep,
    RuntimeState, UpdateHistoryRow, UpdateType, slugify,
};
pub use persistence::{ListAgentsOptions, PersistencePort};
pub use progress::{ProgressEvent, ProgressPhase};
pub use retry::retry_delay;
pub use runtime::{DiscoveredContainer, InstallOptions, RuntimeAdapter};
