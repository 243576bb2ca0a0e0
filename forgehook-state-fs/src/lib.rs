#![deny(missing_docs)]
//! Filesystem-backed implementation of [`PersistencePort`].
//!
//! Directory layout:
//! ```text
//! root/
//!   hooks/<instance-id>.json
//!   agents/<agent-id>.json
//!   runs/<run-id>.json
//!   events.ndjson
//!   update_history.ndjson
//! ```
//! Each row is its own JSON file so reads never need to parse the whole
//! collection; the two append-only logs are newline-delimited JSON, one row
//! per line, matching the engine's "append, never rewrite" access pattern.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use forgehook_core::{
    Agent, AgentId, AgentRun, ForgehookError, HookId, HookInstance, InstanceId, LifecycleEvent,
    ListAgentsOptions, PersistencePort, RunId, UpdateHistoryRow,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Filesystem-backed persistence port, rooted at a directory.
///
/// Suitable for single-process deployments where state must survive a
/// restart without a database. An `async_trait` method on `&self` can run
/// concurrently with another, so the two append-only logs are each guarded
/// by their own lock to keep lines from interleaving; individual entity
/// files are written whole and don't need one.
pub struct FsPersistence {
    root: PathBuf,
    events_lock: Mutex<()>,
    history_lock: Mutex<()>,
}

impl FsPersistence {
    /// Create a store rooted at `root`. Subdirectories are created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            events_lock: Mutex::new(()),
            history_lock: Mutex::new(()),
        }
    }

    fn hooks_dir(&self) -> PathBuf {
        self.root.join("hooks")
    }

    fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn events_path(&self) -> PathBuf {
        self.root.join("events.ndjson")
    }

    fn history_path(&self) -> PathBuf {
        self.root.join("update_history.ndjson")
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ForgehookError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ForgehookError::Internal(format!("create dir {}: {e}", dir.display())))?;
    }
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| ForgehookError::Internal(format!("serialize {}: {e}", path.display())))?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ForgehookError::Internal(format!("write {}: {e}", path.display())))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ForgehookError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let value = serde_json::from_str(&contents)
                .map_err(|e| ForgehookError::Internal(format!("parse {}: {e}", path.display())))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ForgehookError::Internal(format!("read {}: {e}", path.display()))),
    }
}

async fn list_json<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>, ForgehookError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ForgehookError::Internal(format!("read dir {}: {e}", dir.display()))),
    };
    let mut rows = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ForgehookError::Internal(format!("read dir {}: {e}", dir.display())))?
    {
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(row) = read_json(&entry.path()).await? {
            rows.push(row);
        }
    }
    Ok(rows)
}

async fn append_line(lock: &Mutex<()>, path: &Path, line: &str) -> Result<(), ForgehookError> {
    let _guard = lock.lock().await;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ForgehookError::Internal(format!("create dir {}: {e}", dir.display())))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ForgehookError::Internal(format!("open {}: {e}", path.display())))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| ForgehookError::Internal(format!("append {}: {e}", path.display())))?;
    file.write_all(b"\n")
        .await
        .map_err(|e| ForgehookError::Internal(format!("append {}: {e}", path.display())))
}

async fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, ForgehookError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| ForgehookError::Internal(format!("parse {}: {e}", path.display()))))
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ForgehookError::Internal(format!("read {}: {e}", path.display()))),
    }
}

#[async_trait]
impl PersistencePort for FsPersistence {
    async fn upsert_hook(&self, instance: HookInstance) -> Result<(), ForgehookError> {
        let path = self.hooks_dir().join(format!("{}.json", instance.instance_id.as_str()));
        write_json(&path, &instance).await
    }

    async fn get_hook(&self, instance_id: &InstanceId) -> Result<Option<HookInstance>, ForgehookError> {
        read_json(&self.hooks_dir().join(format!("{}.json", instance_id.as_str()))).await
    }

    async fn get_hook_by_hook_id(&self, hook_id: &HookId) -> Result<Option<HookInstance>, ForgehookError> {
        Ok(list_json::<HookInstance>(&self.hooks_dir()).await?.into_iter().find(|i| &i.hook_id == hook_id))
    }

    async fn list_hooks(&self) -> Result<Vec<HookInstance>, ForgehookError> {
        list_json(&self.hooks_dir()).await
    }

    async fn delete_hook(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        let path = self.hooks_dir().join(format!("{}.json", instance_id.as_str()));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ForgehookError::Internal(format!("remove {}: {e}", path.display()))),
        }
    }

    async fn used_ports(&self) -> Result<Vec<u16>, ForgehookError> {
        Ok(list_json::<HookInstance>(&self.hooks_dir()).await?.into_iter().filter_map(|i| i.runtime_state.host_port).collect())
    }

    async fn append_event(&self, event: LifecycleEvent) -> Result<(), ForgehookError> {
        let line = serde_json::to_string(&event).map_err(|e| ForgehookError::Internal(e.to_string()))?;
        append_line(&self.events_lock, &self.events_path(), &line).await
    }

    async fn append_update_history(&self, row: UpdateHistoryRow) -> Result<(), ForgehookError> {
        let line = serde_json::to_string(&row).map_err(|e| ForgehookError::Internal(e.to_string()))?;
        append_line(&self.history_lock, &self.history_path(), &line).await
    }

    async fn update_history(&self, instance_id: &InstanceId) -> Result<Vec<UpdateHistoryRow>, ForgehookError> {
        Ok(read_lines::<UpdateHistoryRow>(&self.history_path())
            .await?
            .into_iter()
            .filter(|h| &h.instance_id == instance_id)
            .collect())
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<(), ForgehookError> {
        let path = self.agents_dir().join(format!("{}.json", agent.id.as_str()));
        write_json(&path, &agent).await
    }

    async fn get_agent(&self, id_or_slug: &str) -> Result<Option<Agent>, ForgehookError> {
        let by_id = read_json::<Agent>(&self.agents_dir().join(format!("{id_or_slug}.json"))).await?;
        if by_id.is_some() {
            return Ok(by_id);
        }
        Ok(list_json::<Agent>(&self.agents_dir()).await?.into_iter().find(|a| a.slug == id_or_slug))
    }

    async fn list_agents(&self, options: ListAgentsOptions) -> Result<Vec<Agent>, ForgehookError> {
        let mut agents: Vec<Agent> = list_json(&self.agents_dir())
            .await?
            .into_iter()
            .filter(|a: &Agent| a.deleted_at.is_none())
            .filter(|a| options.include_private || a.is_public)
            .collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let agents = agents.into_iter().skip(options.offset);
        Ok(if options.limit == 0 { agents.collect() } else { agents.take(options.limit).collect() })
    }

    async fn soft_delete_agent(&self, id: &AgentId) -> Result<(), ForgehookError> {
        let path = self.agents_dir().join(format!("{}.json", id.as_str()));
        if let Some(mut agent) = read_json::<Agent>(&path).await? {
            agent.deleted_at = Some(chrono::Utc::now());
            write_json(&path, &agent).await?;
        }
        Ok(())
    }

    async fn create_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
        let path = self.runs_dir().join(format!("{}.json", run.id.as_str()));
        write_json(&path, &run).await
    }

    async fn finalize_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
        let path = self.runs_dir().join(format!("{}.json", run.id.as_str()));
        write_json(&path, &run).await
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, ForgehookError> {
        read_json(&self.runs_dir().join(format!("{}.json", id.as_str()))).await
    }

    async fn runs_by_agent(&self, agent_id: &AgentId, limit: usize, offset: usize) -> Result<Vec<AgentRun>, ForgehookError> {
        let mut runs: Vec<AgentRun> = list_json::<AgentRun>(&self.runs_dir()).await?.into_iter().filter(|r| &r.agent_id == agent_id).collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let runs = runs.into_iter().skip(offset);
        Ok(if limit == 0 { runs.collect() } else { runs.take(limit).collect() })
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<AgentRun>, ForgehookError> {
        let mut runs: Vec<AgentRun> = list_json(&self.runs_dir()).await?;
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(if limit == 0 { runs } else { runs.into_iter().take(limit).collect() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgehook_core::{AgentConfig, HealthStatus, HookManifest, HookStatus, Runtime, RuntimeState};
    use std::collections::HashMap;

    fn agent(id: &str, slug: &str) -> Agent {
        let now = chrono::Utc::now();
        Agent {
            id: AgentId::new(id),
            slug: slug.into(),
            name: slug.into(),
            description: None,
            provider: "ollama".into(),
            model: "llama3.2".into(),
            system_prompt: "be helpful".into(),
            tool_hook_ids: vec![],
            config: AgentConfig { max_steps: 5, max_tokens: None, temperature: None, timeout_ms: 30_000, retry_on_error: false, max_retries: 0 },
            is_public: true,
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn hook_instance(instance_id: &str, hook_id: &str, host_port: Option<u16>) -> HookInstance {
        HookInstance {
            instance_id: InstanceId::new(instance_id),
            hook_id: HookId::new(hook_id),
            manifest: HookManifest {
                id: hook_id.into(),
                name: hook_id.into(),
                version: "1.0.0".into(),
                description: None,
                runtime: Runtime::Container,
                port: Some(8080),
                image: None,
                module_code: None,
                gateway_base_url: None,
                endpoints: vec![],
                environment: HashMap::new(),
                volumes: vec![],
                dependencies: Default::default(),
                resources: Default::default(),
                health_check: None,
            },
            runtime: Runtime::Container,
            status: HookStatus::Running,
            health_status: HealthStatus::Unknown,
            last_health_check_at: None,
            error: None,
            started_at: None,
            stopped_at: None,
            last_updated_at: None,
            runtime_state: RuntimeState { host_port, ..Default::default() },
            installed_version: "1.0.0".into(),
            previous_version: None,
            previous_image_tag: None,
            config: serde_json::Value::Null,
            environment: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn hook_survives_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistence::new(dir.path());
        store.upsert_hook(hook_instance("inst-1", "echo", Some(9000))).await.unwrap();

        let reopened = FsPersistence::new(dir.path());
        let fetched = reopened.get_hook(&InstanceId::new("inst-1")).await.unwrap().unwrap();
        assert_eq!(fetched.hook_id.as_str(), "echo");
        assert_eq!(reopened.used_ports().await.unwrap(), vec![9000]);
    }

    #[tokio::test]
    async fn delete_hook_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistence::new(dir.path());
        store.upsert_hook(hook_instance("inst-1", "echo", None)).await.unwrap();
        store.delete_hook(&InstanceId::new("inst-1")).await.unwrap();
        assert!(store.get_hook(&InstanceId::new("inst-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn agent_lookup_by_slug_falls_back_to_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistence::new(dir.path());
        store.upsert_agent(agent("a1", "my-agent")).await.unwrap();
        assert!(store.get_agent("a1").await.unwrap().is_some());
        assert!(store.get_agent("my-agent").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_history_appends_without_interleaving() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistence::new(dir.path());
        for i in 0..5 {
            store
                .append_update_history(UpdateHistoryRow {
                    instance_id: InstanceId::new("inst-1"),
                    from_version: format!("{i}.0.0"),
                    to_version: format!("{}.0.0", i + 1),
                    update_type: forgehook_core::UpdateType::Online,
                    success: true,
                    error: None,
                    at: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }
        let rows = store.update_history(&InstanceId::new("inst-1")).await.unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn list_hooks_on_fresh_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistence::new(dir.path());
        assert!(store.list_hooks().await.unwrap().is_empty());
    }
}
