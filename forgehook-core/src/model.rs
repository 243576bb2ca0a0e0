//! The domain model owned by the Hook Lifecycle Engine and the Agent
//! Orchestrator: manifests, runtime instances, update history, agents, and
//! agent runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AgentId, HookId, InstanceId, RunId};

/// Which adapter executes a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Full isolation, HTTP wire to a local container.
    Container,
    /// Runs in-process, trusted code.
    Embedded,
    /// HTTP proxy to an externally-hosted endpoint.
    Gateway,
}

/// HTTP method of a hook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// Lowercase name, used when building tool names and dispatch keys.
    pub fn as_lower(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_lower().to_uppercase())
    }
}

/// One HTTP endpoint a hook exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path, e.g. `/echo`.
    pub path: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema fragment for the request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<serde_json::Value>,
}

/// Container image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    /// Repository, e.g. `example/echo`.
    pub repository: String,
    /// Tag, defaults to `latest` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ImageRef {
    /// The tag to use, defaulting to `latest`.
    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }
}

/// Healthcheck declared by a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Path to probe.
    pub path: String,
    /// Interval between checks, in seconds.
    pub interval_sec: u64,
    /// Per-check timeout, in seconds.
    pub timeout_sec: u64,
    /// Consecutive failures tolerated before `unhealthy`.
    pub retries: u32,
}

/// Resource limits declared by a manifest, as raw strings (see §4.2 parsing).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory, e.g. `"256m"`, `"1g"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// CPU count, e.g. `"0.5"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
}

/// Upstream service dependencies declared by a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    /// Names of required infra services (redis, postgres, vector, ...).
    #[serde(default)]
    pub services: Vec<String>,
}

/// Declarative, never-mutated hook manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookManifest {
    /// Manifest id, becomes `hookId` on the instance.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semver-ish version string.
    pub version: String,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Which adapter runs this hook.
    pub runtime: Runtime,
    /// Container port the process listens on (container runtime only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Image reference (container runtime only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Inline module source (embedded runtime only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_code: Option<String>,
    /// Externally-hosted base URL (gateway runtime only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_base_url: Option<String>,
    /// Endpoints exposed by this hook.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Manifest-default environment variables.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Named volumes to mount (container runtime).
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Upstream service dependencies.
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Resource limits.
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Healthcheck definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
}

/// Lifecycle state of a hook instance. Transitions form the graph owned by
/// the Hook Lifecycle Engine; this type only names the legal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    /// Install in progress.
    Installing,
    /// Installed but not started.
    Installed,
    /// Start in progress.
    Starting,
    /// Running and reachable.
    Running,
    /// Stop in progress.
    Stopping,
    /// Stopped, can be started again.
    Stopped,
    /// Terminal-ish failure state; can be retried via Start/Update.
    Error,
    /// Uninstall in progress; the row is removed on success.
    Uninstalling,
    /// Update in progress.
    Updating,
}

/// Health surveillance result for a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last health check passed.
    Healthy,
    /// Last health check failed.
    Unhealthy,
    /// No health check has been run (always true when `status != running`).
    Unknown,
}

/// Runtime-specific fields of a [`HookInstance`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Container id (container runtime).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Container name (container runtime).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Allocated host port (container runtime).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    /// Whether the module is loaded (embedded runtime).
    #[serde(default)]
    pub module_loaded: bool,
    /// Invocation counter (embedded runtime).
    #[serde(default)]
    pub invocation_count: u64,
    /// Base URL (gateway runtime).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Runtime record owned by the Hook Lifecycle Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInstance {
    /// Instance identity.
    pub instance_id: InstanceId,
    /// Manifest id; unique across non-uninstalled instances.
    pub hook_id: HookId,
    /// The manifest this instance was installed from.
    pub manifest: HookManifest,
    /// Which adapter runs this hook.
    pub runtime: Runtime,
    /// Current lifecycle status.
    pub status: HookStatus,
    /// Current health surveillance result.
    pub health_status: HealthStatus,
    /// Timestamp of the last health check, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_at: Option<DateTime<Utc>>,
    /// Last error message, set only while `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the instance last entered `Running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance last entered `Stopped`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// When an update last completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Runtime-specific fields.
    #[serde(default)]
    pub runtime_state: RuntimeState,
    /// Currently installed version.
    pub installed_version: String,
    /// Version prior to the most recent successful update, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    /// Image tag prior to the most recent successful update, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_image_tag: Option<String>,
    /// User-supplied configuration, layered over manifest defaults.
    #[serde(default)]
    pub config: serde_json::Value,
    /// User-supplied environment overrides, layered over manifest defaults
    /// (user overrides win).
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl HookInstance {
    /// `healthStatus` must be `unknown` whenever `status != running` (§3 invariant).
    pub fn health_status_for(status: HookStatus, computed: HealthStatus) -> HealthStatus {
        if status == HookStatus::Running {
            computed
        } else {
            HealthStatus::Unknown
        }
    }
}

/// How an update was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Pulled a new tag from a registry.
    Online,
    /// Loaded from an uploaded bundle/tarball.
    Upload,
}

/// Append-only update/rollback history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateHistoryRow {
    /// Which instance this update applied to.
    pub instance_id: InstanceId,
    /// Version before the update.
    pub from_version: String,
    /// Version after the update (requested version on failure).
    pub to_version: String,
    /// How the update was supplied.
    pub update_type: UpdateType,
    /// Whether the update succeeded.
    pub success: bool,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the update was attempted.
    pub at: DateTime<Utc>,
}

/// Append-only lifecycle audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEventType {
    /// Install started.
    Installing,
    /// Install completed.
    Installed,
    /// Start started.
    Starting,
    /// Start completed.
    Started,
    /// Stop started.
    Stopping,
    /// Stop completed.
    Stopped,
    /// Update started.
    Updating,
    /// Update completed.
    Updated,
    /// Uninstall started.
    Uninstalling,
    /// Uninstall completed.
    Uninstalled,
    /// Any adapter failure.
    Error,
    /// A health surveillance tick.
    Health,
}

/// One row of the append-only lifecycle event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: LifecycleEventType,
    /// The instance this event concerns.
    pub instance_id: InstanceId,
    /// When the event occurred.
    pub at: DateTime<Utc>,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Per-run overridable execution configuration for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of tool-call steps before forced termination.
    pub max_steps: u32,
    /// Maximum tokens requested per LLM call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Wall-clock budget for the whole run.
    pub timeout_ms: u64,
    /// Whether tool-call failures should be retried.
    #[serde(default)]
    pub retry_on_error: bool,
    /// Maximum retries per tool call, when `retry_on_error`.
    #[serde(default)]
    pub max_retries: u32,
}

impl AgentConfig {
    /// Overlay `override_` onto `self`, `override_` fields winning when set.
    pub fn merged_with(&self, override_: &AgentConfigOverride) -> AgentConfig {
        AgentConfig {
            max_steps: override_.max_steps.unwrap_or(self.max_steps),
            max_tokens: override_.max_tokens.or(self.max_tokens),
            temperature: override_.temperature.or(self.temperature),
            timeout_ms: override_.timeout_ms.unwrap_or(self.timeout_ms),
            retry_on_error: override_.retry_on_error.unwrap_or(self.retry_on_error),
            max_retries: override_.max_retries.unwrap_or(self.max_retries),
        }
    }
}

/// Sparse override applied on top of an [`AgentConfig`] for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfigOverride {
    /// Override for `max_steps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Override for `max_tokens`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Override for `temperature`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Override for `timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Override for `retry_on_error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_error: Option<bool>,
    /// Override for `max_retries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// A callable agent definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id.
    pub id: AgentId,
    /// Unique, URL-safe slug derived from `name`.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// LLM provider key (e.g. `"ollama"`, `"openai"`, `"anthropic"`).
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// System prompt seeded at the start of every run.
    pub system_prompt: String,
    /// Hook ids this agent is permitted to call.
    pub tool_hook_ids: Vec<String>,
    /// Default execution configuration.
    pub config: AgentConfig,
    /// Whether non-owners may invoke this agent.
    pub is_public: bool,
    /// Creator, if tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Derive a unique, URL-safe slug: lowercase, non-alphanumerics collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Terminal or in-flight status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created but not yet started.
    Pending,
    /// Loop in progress.
    Running,
    /// Finished normally.
    Completed,
    /// Finished with an unrecoverable error.
    Failed,
    /// Wall-clock budget exceeded.
    Timeout,
}

/// One tool-call iteration recorded in an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    /// 1-based step number, monotonically increasing.
    pub step: u32,
    /// Hook id the LLM targeted.
    pub tool: String,
    /// Endpoint/action key within that hook.
    pub action: String,
    /// Arguments passed to the tool call.
    pub input: serde_json::Value,
    /// Tool output, if it succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent on this step, in milliseconds.
    pub duration_ms: u64,
    /// When the step was recorded.
    pub at: DateTime<Utc>,
}

/// A single execution of an [`Agent`] against an input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    /// Unique id.
    pub id: RunId,
    /// Which agent this run belongs to.
    pub agent_id: AgentId,
    /// The raw text input.
    pub input_text: String,
    /// Optional structured input appended as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<serde_json::Value>,
    /// Parsed structured output, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Raw final LLM utterance, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    /// Every tool-call step taken during the run, in order.
    pub steps: Vec<RunStep>,
    /// `== steps.len()`, kept as a column for cheap queries.
    pub total_steps: u32,
    /// Accumulated input tokens across all LLM calls.
    pub tokens_input: u64,
    /// Accumulated output tokens across all LLM calls.
    pub tokens_output: u64,
    /// Wall-clock duration, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Current status.
    pub status: RunStatus,
    /// Error message, set only when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Completion timestamp, set once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_non_alphanumerics() {
        assert_eq!(slugify("My Cool Agent!!"), "my-cool-agent");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("already-slug"), "already-slug");
        assert_eq!(slugify("CAPS_and_underscores"), "caps-and-underscores");
    }

    #[test]
    fn health_status_forced_unknown_when_not_running() {
        assert_eq!(
            HookInstance::health_status_for(HookStatus::Stopped, HealthStatus::Healthy),
            HealthStatus::Unknown
        );
        assert_eq!(
            HookInstance::health_status_for(HookStatus::Running, HealthStatus::Healthy),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn agent_config_override_wins_when_set() {
        let base = AgentConfig {
            max_steps: 5,
            max_tokens: Some(1024),
            temperature: Some(0.2),
            timeout_ms: 30_000,
            retry_on_error: false,
            max_retries: 0,
        };
        let over = AgentConfigOverride {
            max_steps: Some(10),
            timeout_ms: Some(60_000),
            ..Default::default()
        };
        let merged = base.merged_with(&over);
        assert_eq!(merged.max_steps, 10);
        assert_eq!(merged.timeout_ms, 60_000);
        assert_eq!(merged.max_tokens, Some(1024));
        assert_eq!(merged.temperature, Some(0.2));
    }
}
