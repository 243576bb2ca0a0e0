//! The persistence port: the only data abstraction the core depends on.
//!
//! Object-safe so the Hook Lifecycle Engine and Agent Orchestrator can hold
//! it as `Arc<dyn PersistencePort>`, the same way the rest of this lineage
//! holds its state abstraction as a trait object rather than a concrete
//! database client.

use async_trait::async_trait;

use crate::error::ForgehookError;
use crate::id::{AgentId, HookId, InstanceId, RunId};
use crate::model::{Agent, AgentRun, HookInstance, LifecycleEvent, UpdateHistoryRow};

/// Filter/pagination options for `list_agents`.
#[derive(Debug, Clone, Default)]
pub struct ListAgentsOptions {
    /// Include agents with `is_public == false`.
    pub include_private: bool,
    /// Max rows to return.
    pub limit: usize,
    /// Rows to skip.
    pub offset: usize,
}

/// The persistence abstraction assumed by the core. Each row's columns are
/// exactly the attributes of the corresponding domain type; implementers may
/// serialize nested structures (`manifest`, `config`, `steps`) as JSON.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Insert or replace a hook instance row.
    async fn upsert_hook(&self, instance: HookInstance) -> Result<(), ForgehookError>;
    /// Fetch a hook instance by its instance id.
    async fn get_hook(&self, instance_id: &InstanceId) -> Result<Option<HookInstance>, ForgehookError>;
    /// Fetch a hook instance by its manifest hook id.
    async fn get_hook_by_hook_id(&self, hook_id: &HookId) -> Result<Option<HookInstance>, ForgehookError>;
    /// List every hook instance.
    async fn list_hooks(&self) -> Result<Vec<HookInstance>, ForgehookError>;
    /// Remove a hook instance row (used by `Uninstall`).
    async fn delete_hook(&self, instance_id: &InstanceId) -> Result<(), ForgehookError>;
    /// Every host port currently held by a non-uninstalled container instance.
    async fn used_ports(&self) -> Result<Vec<u16>, ForgehookError>;
    /// Append one row to the lifecycle event log.
    async fn append_event(&self, event: LifecycleEvent) -> Result<(), ForgehookError>;
    /// Append one row to the update history log.
    async fn append_update_history(&self, row: UpdateHistoryRow) -> Result<(), ForgehookError>;
    /// All update history rows for one instance, oldest first.
    async fn update_history(&self, instance_id: &InstanceId) -> Result<Vec<UpdateHistoryRow>, ForgehookError>;

    /// Insert or replace an agent row.
    async fn upsert_agent(&self, agent: Agent) -> Result<(), ForgehookError>;
    /// Fetch an agent by id or by slug.
    async fn get_agent(&self, id_or_slug: &str) -> Result<Option<Agent>, ForgehookError>;
    /// List agents, optionally including private ones, paginated.
    async fn list_agents(&self, options: ListAgentsOptions) -> Result<Vec<Agent>, ForgehookError>;
    /// Soft-delete an agent by setting `deleted_at`.
    async fn soft_delete_agent(&self, id: &AgentId) -> Result<(), ForgehookError>;

    /// Insert a new, non-terminal agent run row.
    async fn create_run(&self, run: AgentRun) -> Result<(), ForgehookError>;
    /// Overwrite a run row with its terminal state.
    async fn finalize_run(&self, run: AgentRun) -> Result<(), ForgehookError>;
    /// Fetch a run by id.
    async fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, ForgehookError>;
    /// Runs for one agent, newest first, paginated.
    async fn runs_by_agent(&self, agent_id: &AgentId, limit: usize, offset: usize) -> Result<Vec<AgentRun>, ForgehookError>;
    /// The most recent runs across all agents, newest first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<AgentRun>, ForgehookError>;
}
