#![deny(missing_docs)]
//! In-memory implementation of [`PersistencePort`].
//!
//! Uses a `HashMap` behind a `RwLock` per row kind for concurrent access.
//! Nothing here survives a process restart — that is what
//! `forgehook-state-fs` is for.

use std::collections::HashMap;

use async_trait::async_trait;
use forgehook_core::{
    Agent, AgentId, AgentRun, ForgehookError, HookId, HookInstance, InstanceId, LifecycleEvent,
    ListAgentsOptions, PersistencePort, RunId, UpdateHistoryRow,
};
use tokio::sync::RwLock;

/// In-memory persistence port. Suitable for testing, prototyping, and
/// single-process use cases where persistence across restarts is not
/// required.
#[derive(Default)]
pub struct MemoryPersistence {
    hooks: RwLock<HashMap<InstanceId, HookInstance>>,
    agents: RwLock<HashMap<AgentId, Agent>>,
    runs: RwLock<HashMap<RunId, AgentRun>>,
    events: RwLock<Vec<LifecycleEvent>>,
    update_history: RwLock<Vec<UpdateHistoryRow>>,
}

impl MemoryPersistence {
    /// Create a new, empty in-memory persistence port.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistencePort for MemoryPersistence {
    async fn upsert_hook(&self, instance: HookInstance) -> Result<(), ForgehookError> {
        self.hooks.write().await.insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    async fn get_hook(&self, instance_id: &InstanceId) -> Result<Option<HookInstance>, ForgehookError> {
        Ok(self.hooks.read().await.get(instance_id).cloned())
    }

    async fn get_hook_by_hook_id(&self, hook_id: &HookId) -> Result<Option<HookInstance>, ForgehookError> {
        Ok(self.hooks.read().await.values().find(|i| &i.hook_id == hook_id).cloned())
    }

    async fn list_hooks(&self) -> Result<Vec<HookInstance>, ForgehookError> {
        Ok(self.hooks.read().await.values().cloned().collect())
    }

    async fn delete_hook(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        self.hooks.write().await.remove(instance_id);
        Ok(())
    }

    async fn used_ports(&self) -> Result<Vec<u16>, ForgehookError> {
        Ok(self.hooks.read().await.values().filter_map(|i| i.runtime_state.host_port).collect())
    }

    async fn append_event(&self, event: LifecycleEvent) -> Result<(), ForgehookError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn append_update_history(&self, row: UpdateHistoryRow) -> Result<(), ForgehookError> {
        self.update_history.write().await.push(row);
        Ok(())
    }

    async fn update_history(&self, instance_id: &InstanceId) -> Result<Vec<UpdateHistoryRow>, ForgehookError> {
        Ok(self
            .update_history
            .read()
            .await
            .iter()
            .filter(|h| &h.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<(), ForgehookError> {
        self.agents.write().await.insert(agent.id.clone(), agent);
        Ok(())
    }

    async fn get_agent(&self, id_or_slug: &str) -> Result<Option<Agent>, ForgehookError> {
        Ok(self
            .agents
            .read()
            .await
            .values()
            .find(|a| a.id.as_str() == id_or_slug || a.slug == id_or_slug)
            .cloned())
    }

    async fn list_agents(&self, options: ListAgentsOptions) -> Result<Vec<Agent>, ForgehookError> {
        let mut agents: Vec<Agent> = self
            .agents
            .read()
            .await
            .values()
            .filter(|a| a.deleted_at.is_none())
            .filter(|a| options.include_private || a.is_public)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let agents = agents.into_iter().skip(options.offset);
        Ok(if options.limit == 0 {
            agents.collect()
        } else {
            agents.take(options.limit).collect()
        })
    }

    async fn soft_delete_agent(&self, id: &AgentId) -> Result<(), ForgehookError> {
        if let Some(agent) = self.agents.write().await.get_mut(id) {
            agent.deleted_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn create_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
        self.runs.write().await.insert(run.id.clone(), run);
        Ok(())
    }

    async fn finalize_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
        self.runs.write().await.insert(run.id.clone(), run);
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, ForgehookError> {
        Ok(self.runs.read().await.get(id).cloned())
    }

    async fn runs_by_agent(&self, agent_id: &AgentId, limit: usize, offset: usize) -> Result<Vec<AgentRun>, ForgehookError> {
        let mut runs: Vec<AgentRun> = self.runs.read().await.values().filter(|r| &r.agent_id == agent_id).cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let runs = runs.into_iter().skip(offset);
        Ok(if limit == 0 { runs.collect() } else { runs.take(limit).collect() })
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<AgentRun>, ForgehookError> {
        let mut runs: Vec<AgentRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(if limit == 0 { runs } else { runs.into_iter().take(limit).collect() })
    }
}
