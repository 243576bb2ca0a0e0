//! The Hook Lifecycle Engine (E+F, §4.1): the install/start/stop/update/
//! rollback/invoke state machine, adoption & reconciliation at boot, and
//! health surveillance.
//!
//! State lives in an in-memory map guarded by one exclusive mutex for
//! mutating operations (§5's concurrency model), mirrored to the
//! [`PersistencePort`] after every transition so the map can be rebuilt on
//! restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use forgehook_core::{
    Dependencies, Endpoint, ForgehookError, HealthStatus, HookId, HookInstance, HookManifest,
    HookStatus, InstallId, InstallOptions, InstanceId, LifecycleEvent, LifecycleEventType,
    PersistencePort, ProgressPhase, ResourceLimits, Runtime, RuntimeAdapter, RuntimeState,
    UpdateHistoryRow, UpdateType,
};
use forgehook_ports::PortAllocator;

use crate::progress_bus::ProgressBus;

const GRACEFUL_STOP_GUARD: &str = "instance is not running";

/// What an `Update`/`Rollback` call supplies as the new version.
#[derive(Debug, Clone)]
pub enum UpdateSource {
    /// Container runtime: pull a new tag, keep everything else.
    ImageTag {
        /// New image tag.
        tag: String,
        /// New `installedVersion` to record.
        version: String,
    },
    /// Embedded runtime: replace the module source.
    ModuleCode {
        /// New module source.
        module_code: String,
        /// New `installedVersion` to record.
        version: String,
    },
    /// Full manifest replacement (container or embedded).
    Manifest(HookManifest),
}

/// Coordinates every runtime kind behind one state machine.
pub struct HookLifecycleEngine {
    persistence: Arc<dyn PersistencePort>,
    adapters: HashMap<Runtime, Arc<dyn RuntimeAdapter>>,
    ports: Arc<PortAllocator>,
    progress: Arc<ProgressBus>,
    instances: Mutex<HashMap<InstanceId, HookInstance>>,
    container_prefix: String,
}

impl HookLifecycleEngine {
    /// Build a fresh engine. Call [`Self::bootstrap`] before serving traffic
    /// to load persisted state. `container_prefix` is the naming convention
    /// (§6's `NamingConfig`) `bootstrap` uses to discover orphaned containers.
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        adapters: HashMap<Runtime, Arc<dyn RuntimeAdapter>>,
        ports: Arc<PortAllocator>,
        container_prefix: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            adapters,
            ports,
            progress: Arc::new(ProgressBus::new()),
            instances: Mutex::new(HashMap::new()),
            container_prefix: container_prefix.into(),
        }
    }

    /// The install progress bus, shared with the external transport layer.
    pub fn progress(&self) -> Arc<ProgressBus> {
        self.progress.clone()
    }

    fn adapter_for(&self, runtime: Runtime) -> Result<Arc<dyn RuntimeAdapter>, ForgehookError> {
        self.adapters
            .get(&runtime)
            .cloned()
            .ok_or_else(|| ForgehookError::Internal(format!("no adapter registered for runtime {runtime:?}")))
    }

    fn snapshot(&self, instance_id: &InstanceId) -> Result<HookInstance, ForgehookError> {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ForgehookError::NotFound(format!("hook instance {instance_id}")))
    }

    fn put(&self, instance: HookInstance) {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .insert(instance.instance_id.clone(), instance);
    }

    async fn persist(&self, instance: &HookInstance) -> Result<(), ForgehookError> {
        self.persistence.upsert_hook(instance.clone()).await
    }

    async fn emit(&self, event_type: LifecycleEventType, instance_id: &InstanceId, data: Option<serde_json::Value>) {
        let event = LifecycleEvent {
            event_type,
            instance_id: instance_id.clone(),
            at: Utc::now(),
            data,
        };
        if let Err(e) = self.persistence.append_event(event).await {
            tracing::warn!(error = %e, %instance_id, "failed to append lifecycle event");
        }
    }

    /// Load every persisted instance into memory, reconciling the port
    /// allocator against the ports they hold. Running container instances
    /// are re-probed; unreachable ones fall back to `stopped`. Then adopts
    /// any containers a prior process left running that this engine has no
    /// row for (§4.1 "Adoption & reconciliation").
    pub async fn bootstrap(&self) -> Result<(), ForgehookError> {
        let rows = self.persistence.list_hooks().await?;
        let mut used_ports: Vec<u16> = rows.iter().filter_map(|i| i.runtime_state.host_port).collect();

        let mut by_container_name: HashMap<String, InstanceId> = HashMap::new();
        for mut instance in rows {
            if instance.status == HookStatus::Running {
                if let Ok(adapter) = self.adapter_for(instance.runtime) {
                    match adapter.check_health(&instance).await {
                        Ok(health) => instance.health_status = HookInstance::health_status_for(instance.status, health),
                        Err(_) => {
                            instance.status = HookStatus::Stopped;
                            instance.health_status = HealthStatus::Unknown;
                            instance.runtime_state.container_id = None;
                        }
                    }
                }
            }
            if let Some(name) = &instance.runtime_state.container_name {
                by_container_name.insert(name.clone(), instance.instance_id.clone());
            }
            self.put(instance);
        }

        if let Ok(adapter) = self.adapter_for(Runtime::Container) {
            let discovered = adapter.discover(&self.container_prefix).await.unwrap_or_default();
            let mut seen_names: std::collections::HashSet<String> = std::collections::HashSet::new();
            for container in discovered {
                seen_names.insert(container.name.clone());
                if let Some(instance_id) = by_container_name.get(&container.name) {
                    let mut instance = self.snapshot(instance_id)?;
                    if container.running {
                        instance.runtime_state.container_id = Some(container.runtime_id.clone());
                        instance.runtime_state.host_port = instance.runtime_state.host_port.or(container.host_port);
                        if let Some(port) = instance.runtime_state.host_port {
                            used_ports.push(port);
                        }
                    }
                    self.put(instance);
                    continue;
                }

                let hook_id = container
                    .name
                    .strip_prefix(&self.container_prefix)
                    .unwrap_or(&container.name)
                    .to_string();
                if let Some(port) = container.host_port {
                    used_ports.push(port);
                }
                let instance = synthesize_adopted_instance(&container.name, hook_id, container.runtime_id, container.running, container.host_port);
                tracing::info!(instance_id = %instance.instance_id, "adopted orphaned container at bootstrap");
                self.put(instance.clone());
                self.persist(&instance).await?;
            }

            for (name, instance_id) in &by_container_name {
                if seen_names.contains(name) {
                    continue;
                }
                let mut instance = self.snapshot(instance_id)?;
                if instance.status == HookStatus::Running {
                    instance.status = HookStatus::Stopped;
                    instance.health_status = HealthStatus::Unknown;
                    instance.runtime_state.container_id = None;
                    self.put(instance.clone());
                    self.persist(&instance).await?;
                }
            }
        }

        self.ports.reconcile(used_ports);
        Ok(())
    }

    /// Map every known hook's `hookId` to its instance id, for resolving a
    /// tool name's hook-id prefix (see the Tool Schema Builder) to the
    /// instance `invoke` needs.
    pub fn instances_by_hook_id(&self) -> HashMap<HookId, InstanceId> {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .values()
            .map(|i| (i.hook_id.clone(), i.instance_id.clone()))
            .collect()
    }

    /// Resolve a `hookId` to its instance id.
    pub fn instance_id_for_hook(&self, hook_id: &HookId) -> Result<InstanceId, ForgehookError> {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .values()
            .find(|i| &i.hook_id == hook_id)
            .map(|i| i.instance_id.clone())
            .ok_or_else(|| ForgehookError::NotFound(format!("hook '{hook_id}'")))
    }

    /// `Install(manifest, config, env, autoStart, installId?) -> instance`.
    pub async fn install(
        &self,
        manifest: HookManifest,
        config: serde_json::Value,
        environment: HashMap<String, String>,
        auto_start: bool,
        install_id: Option<InstallId>,
    ) -> Result<HookInstance, ForgehookError> {
        let hook_id = forgehook_core::HookId::new(manifest.id.clone());
        if self.persistence.get_hook_by_hook_id(&hook_id).await?.is_some() {
            return Err(ForgehookError::Conflict(format!("hook '{}' already installed", manifest.id)));
        }

        if let Some(id) = &install_id {
            self.progress.publish_progress(id, ProgressPhase::Pull, Some("provisioning".into()));
        }

        let adapter = self.adapter_for(manifest.runtime)?;
        let host_port = if manifest.runtime == Runtime::Container {
            Some(self.ports.allocate()?)
        } else {
            None
        };

        let options = InstallOptions {
            config: config.clone(),
            environment: environment.clone(),
            host_port,
        };

        let instance_id = InstanceId::new(format!("{}-{}", manifest.id, Utc::now().timestamp_millis()));
        let runtime_kind = manifest.runtime;

        match adapter.install(&manifest, &options).await {
            Ok(runtime_state) => {
                let instance = HookInstance {
                    instance_id: instance_id.clone(),
                    hook_id,
                    installed_version: manifest.version.clone(),
                    manifest,
                    runtime: runtime_kind,
                    status: HookStatus::Installed,
                    health_status: HealthStatus::Unknown,
                    last_health_check_at: None,
                    error: None,
                    started_at: None,
                    stopped_at: None,
                    last_updated_at: None,
                    runtime_state,
                    previous_version: None,
                    previous_image_tag: None,
                    config,
                    environment,
                };
                self.put(instance.clone());
                self.persist(&instance).await?;
                self.emit(LifecycleEventType::Installing, &instance_id, None).await;
                self.emit(LifecycleEventType::Installed, &instance_id, None).await;
                if let Some(id) = &install_id {
                    self.progress.publish_progress(id, ProgressPhase::Create, None);
                }

                if auto_start {
                    self.start(&instance_id, false).await?;
                    if let Some(id) = &install_id {
                        self.progress.publish_progress(id, ProgressPhase::Start, None);
                        self.progress.publish_complete(id);
                    }
                    return self.snapshot(&instance_id);
                }
                if let Some(id) = &install_id {
                    self.progress.publish_complete(id);
                }
                Ok(instance)
            }
            Err(err) => {
                if let Some(port) = host_port {
                    self.ports.release(port);
                }
                if let Some(id) = &install_id {
                    self.progress.publish_error(id, err.to_string());
                }
                Err(err)
            }
        }
    }

    /// `Start(instanceId, {pullLatest?}) -> ok`.
    pub async fn start(&self, instance_id: &InstanceId, pull_latest: bool) -> Result<(), ForgehookError> {
        let mut instance = self.snapshot(instance_id)?;
        instance.status = HookStatus::Starting;
        self.put(instance.clone());
        self.emit(LifecycleEventType::Starting, instance_id, None).await;

        let adapter = self.adapter_for(instance.runtime)?;
        match adapter.start(&instance, pull_latest).await {
            Ok(runtime_state) => {
                instance.runtime_state = runtime_state;
                instance.status = HookStatus::Running;
                instance.health_status = HealthStatus::Unknown;
                instance.error = None;
                instance.started_at = Some(Utc::now());
                self.put(instance.clone());
                self.persist(&instance).await?;
                self.emit(LifecycleEventType::Started, instance_id, None).await;
                Ok(())
            }
            Err(err) => {
                instance.status = HookStatus::Error;
                instance.error = Some(err.to_string());
                self.put(instance.clone());
                self.persist(&instance).await?;
                self.emit(LifecycleEventType::Error, instance_id, Some(serde_json::json!({ "message": err.to_string() }))).await;
                Err(err)
            }
        }
    }

    /// `Stop(instanceId)`.
    pub async fn stop(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        let mut instance = self.snapshot(instance_id)?;
        if instance.status != HookStatus::Running {
            return Err(ForgehookError::Validation(GRACEFUL_STOP_GUARD.into()));
        }
        instance.status = HookStatus::Stopping;
        self.put(instance.clone());
        self.emit(LifecycleEventType::Stopping, instance_id, None).await;

        let adapter = self.adapter_for(instance.runtime)?;
        adapter.stop(&instance).await?;

        instance.status = HookStatus::Stopped;
        instance.health_status = HealthStatus::Unknown;
        instance.stopped_at = Some(Utc::now());
        self.put(instance.clone());
        self.persist(&instance).await?;
        self.emit(LifecycleEventType::Stopped, instance_id, None).await;
        Ok(())
    }

    /// `Restart = Stop ∘ Start`.
    pub async fn restart(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        self.stop(instance_id).await?;
        self.start(instance_id, false).await
    }

    /// `Uninstall(instanceId)`.
    pub async fn uninstall(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        let instance = self.snapshot(instance_id)?;
        if instance.status == HookStatus::Running {
            self.stop(instance_id).await?;
        }
        let instance = self.snapshot(instance_id)?;
        let adapter = self.adapter_for(instance.runtime)?;
        adapter.remove(&instance).await?;

        if let Some(port) = instance.runtime_state.host_port {
            self.ports.release(port);
        }
        self.instances.lock().expect("instance table poisoned").remove(instance_id);
        self.persistence.delete_hook(instance_id).await?;
        self.emit(LifecycleEventType::Uninstalling, instance_id, None).await;
        self.emit(LifecycleEventType::Uninstalled, instance_id, None).await;
        Ok(())
    }

    /// `Update(instanceId, source)`.
    pub async fn update(&self, instance_id: &InstanceId, source: UpdateSource) -> Result<(), ForgehookError> {
        let mut instance = self.snapshot(instance_id)?;
        let was_running = instance.status == HookStatus::Running;
        let from_version = instance.installed_version.clone();
        let previous_tag = instance.manifest.image.as_ref().map(|i| i.tag_or_latest().to_string());

        instance.status = HookStatus::Updating;
        self.put(instance.clone());
        self.emit(LifecycleEventType::Updating, instance_id, None).await;

        let to_version = match &source {
            UpdateSource::ImageTag { version, .. } => version.clone(),
            UpdateSource::ModuleCode { version, .. } => version.clone(),
            UpdateSource::Manifest(m) => m.version.clone(),
        };

        let result = self.apply_update(&mut instance, source, was_running).await;

        let history = UpdateHistoryRow {
            instance_id: instance_id.clone(),
            from_version,
            to_version,
            update_type: UpdateType::Online,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            at: Utc::now(),
        };
        let _ = self.persistence.append_update_history(history).await;

        match result {
            Ok(()) => {
                instance.previous_version = Some(instance.installed_version.clone());
                instance.previous_image_tag = previous_tag;
                instance.status = if was_running { HookStatus::Running } else { HookStatus::Installed };
                instance.last_updated_at = Some(Utc::now());
                self.put(instance.clone());
                self.persist(&instance).await?;
                self.emit(LifecycleEventType::Updated, instance_id, None).await;
                Ok(())
            }
            Err(err) => {
                instance.status = HookStatus::Error;
                instance.error = Some(err.to_string());
                self.put(instance.clone());
                self.persist(&instance).await?;
                self.emit(LifecycleEventType::Error, instance_id, Some(serde_json::json!({ "message": err.to_string() }))).await;
                Err(err)
            }
        }
    }

    async fn apply_update(&self, instance: &mut HookInstance, source: UpdateSource, was_running: bool) -> Result<(), ForgehookError> {
        let adapter = self.adapter_for(instance.runtime)?;
        adapter.remove(instance).await?;

        let mut new_manifest = instance.manifest.clone();
        let mut new_version = instance.installed_version.clone();
        match source {
            UpdateSource::ImageTag { tag, version } => {
                if let Some(image) = new_manifest.image.as_mut() {
                    image.tag = Some(tag);
                }
                new_version = version;
            }
            UpdateSource::ModuleCode { module_code, version } => {
                new_manifest.module_code = Some(module_code);
                new_version = version;
            }
            UpdateSource::Manifest(manifest) => {
                new_version = manifest.version.clone();
                new_manifest = manifest;
            }
        }
        new_manifest.version = new_version.clone();

        let options = InstallOptions {
            config: instance.config.clone(),
            environment: instance.environment.clone(),
            host_port: instance.runtime_state.host_port,
        };
        let runtime_state = adapter.install(&new_manifest, &options).await?;
        instance.manifest = new_manifest;
        instance.installed_version = new_version;
        instance.runtime_state = runtime_state;

        if was_running {
            adapter.start(instance, false).await?;
        }
        Ok(())
    }

    /// `Rollback(instanceId)`: re-applies `previousVersion`/`previousImageTag`.
    pub async fn rollback(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
        let instance = self.snapshot(instance_id)?;
        let previous_version = instance
            .previous_version
            .clone()
            .ok_or_else(|| ForgehookError::Validation("no previous version to roll back to".into()))?;
        let previous_tag = instance
            .previous_image_tag
            .clone()
            .ok_or_else(|| ForgehookError::Validation("no previous image tag to roll back to".into()))?;
        self.update(
            instance_id,
            UpdateSource::ImageTag { tag: previous_tag, version: previous_version },
        )
        .await
    }

    /// `Invoke(instanceId, endpointKey, body, retries) -> json`.
    pub async fn invoke(
        &self,
        instance_id: &InstanceId,
        endpoint_key: &str,
        body: serde_json::Value,
        retries: u32,
    ) -> Result<serde_json::Value, ForgehookError> {
        let instance = self.snapshot(instance_id)?;
        let endpoint = find_endpoint(&instance.manifest, endpoint_key)
            .ok_or_else(|| ForgehookError::NotFound(format!("endpoint '{endpoint_key}' on hook '{}'", instance.hook_id)))?;
        let adapter = self.adapter_for(instance.runtime)?;

        let mut attempt = 0u32;
        loop {
            match adapter.invoke(&instance, &endpoint, endpoint_key, body.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    match forgehook_core::retry_delay(attempt, retries) {
                        Some(delay) => {
                            tracing::warn!(attempt, %instance_id, error = %err, "invoke failed, retrying");
                            tokio::time::sleep(delay.to_std()).await;
                            attempt += 1;
                        }
                        None => return Err(err),
                    }
                }
            }
        }
    }

    /// One health-surveillance tick for a single instance. Callers schedule
    /// this on their own ticker (first at +10s, then every 30s per §4.1);
    /// the engine does not own a scheduler.
    pub async fn health_tick(&self, instance_id: &InstanceId) -> Result<HealthStatus, ForgehookError> {
        let mut instance = self.snapshot(instance_id)?;
        if instance.status != HookStatus::Running {
            return Ok(HealthStatus::Unknown);
        }
        let adapter = self.adapter_for(instance.runtime)?;
        let computed = adapter.check_health(&instance).await.unwrap_or(HealthStatus::Unhealthy);
        let health = HookInstance::health_status_for(instance.status, computed);
        instance.health_status = health;
        instance.last_health_check_at = Some(Utc::now());
        self.put(instance.clone());
        self.persist(&instance).await?;
        self.emit(LifecycleEventType::Health, instance_id, Some(serde_json::json!({ "health": health }))).await;
        Ok(health)
    }

    /// Read-only snapshot of one instance, for transport layers.
    pub fn get(&self, instance_id: &InstanceId) -> Result<HookInstance, ForgehookError> {
        self.snapshot(instance_id)
    }

    /// Read-only snapshot of every instance, for transport layers.
    pub fn list(&self) -> Vec<HookInstance> {
        self.instances.lock().expect("instance table poisoned").values().cloned().collect()
    }
}

/// Build a minimal instance row for a container found running at bootstrap
/// with no persisted row of its own. It has no endpoints until an `Update`
/// or a fresh `Install` replaces the synthesized manifest.
fn synthesize_adopted_instance(
    container_name: &str,
    hook_id: String,
    container_id: String,
    running: bool,
    host_port: Option<u16>,
) -> HookInstance {
    let now = Utc::now();
    let manifest = HookManifest {
        id: hook_id.clone(),
        name: hook_id.clone(),
        version: "0.0.0-adopted".into(),
        description: Some("synthesized at bootstrap for an orphaned container".into()),
        runtime: Runtime::Container,
        port: None,
        image: None,
        module_code: None,
        gateway_base_url: None,
        endpoints: Vec::new(),
        environment: HashMap::new(),
        volumes: Vec::new(),
        dependencies: Dependencies::default(),
        resources: ResourceLimits::default(),
        health_check: None,
    };
    HookInstance {
        instance_id: InstanceId::new(container_name.to_string()),
        hook_id: HookId::new(hook_id),
        installed_version: manifest.version.clone(),
        manifest,
        runtime: Runtime::Container,
        status: if running { HookStatus::Running } else { HookStatus::Stopped },
        health_status: HealthStatus::Unknown,
        last_health_check_at: None,
        error: None,
        started_at: if running { Some(now) } else { None },
        stopped_at: if running { None } else { Some(now) },
        last_updated_at: None,
        runtime_state: RuntimeState {
            container_id: Some(container_id),
            container_name: Some(container_name.to_string()),
            host_port,
            ..Default::default()
        },
        previous_version: None,
        previous_image_tag: None,
        config: serde_json::Value::Null,
        environment: HashMap::new(),
    }
}

fn find_endpoint(manifest: &HookManifest, endpoint_key: &str) -> Option<Endpoint> {
    manifest
        .endpoints
        .iter()
        .find(|e| forgehook_tools::endpoint_key(e.method, &e.path) == endpoint_key)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgehook_core::{Dependencies, HealthCheck, HttpMethod, ImageRef, ListAgentsOptions, ResourceLimits, RuntimeState};
    use std::collections::HashMap as Map;

    struct FakeRuntime {
        fail_install: bool,
    }

    #[async_trait::async_trait]
    impl RuntimeAdapter for FakeRuntime {
        async fn install(&self, _manifest: &HookManifest, options: &InstallOptions) -> Result<RuntimeState, ForgehookError> {
            if self.fail_install {
                return Err(ForgehookError::RuntimeError("boom".into()));
            }
            Ok(RuntimeState {
                container_id: Some("fake-container".into()),
                host_port: options.host_port,
                ..Default::default()
            })
        }
        async fn start(&self, instance: &HookInstance, _pull_latest: bool) -> Result<RuntimeState, ForgehookError> {
            Ok(instance.runtime_state.clone())
        }
        async fn stop(&self, _instance: &HookInstance) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn remove(&self, _instance: &HookInstance) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn invoke(&self, _instance: &HookInstance, _endpoint: &Endpoint, _action: &str, body: serde_json::Value) -> Result<serde_json::Value, ForgehookError> {
            Ok(serde_json::json!({ "echoed": body }))
        }
        async fn logs(&self, _instance: &HookInstance, _tail: usize) -> Result<Vec<u8>, ForgehookError> {
            Ok(Vec::new())
        }
        async fn check_health(&self, _instance: &HookInstance) -> Result<HealthStatus, ForgehookError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[derive(Default)]
    struct FakePersistence {
        hooks: Mutex<Map<InstanceId, HookInstance>>,
        events: Mutex<Vec<LifecycleEvent>>,
        history: Mutex<Vec<UpdateHistoryRow>>,
    }

    #[async_trait::async_trait]
    impl PersistencePort for FakePersistence {
        async fn upsert_hook(&self, instance: HookInstance) -> Result<(), ForgehookError> {
            self.hooks.lock().unwrap().insert(instance.instance_id.clone(), instance);
            Ok(())
        }
        async fn get_hook(&self, instance_id: &InstanceId) -> Result<Option<HookInstance>, ForgehookError> {
            Ok(self.hooks.lock().unwrap().get(instance_id).cloned())
        }
        async fn get_hook_by_hook_id(&self, hook_id: &forgehook_core::HookId) -> Result<Option<HookInstance>, ForgehookError> {
            Ok(self.hooks.lock().unwrap().values().find(|i| &i.hook_id == hook_id).cloned())
        }
        async fn list_hooks(&self) -> Result<Vec<HookInstance>, ForgehookError> {
            Ok(self.hooks.lock().unwrap().values().cloned().collect())
        }
        async fn delete_hook(&self, instance_id: &InstanceId) -> Result<(), ForgehookError> {
            self.hooks.lock().unwrap().remove(instance_id);
            Ok(())
        }
        async fn used_ports(&self) -> Result<Vec<u16>, ForgehookError> {
            Ok(self.hooks.lock().unwrap().values().filter_map(|i| i.runtime_state.host_port).collect())
        }
        async fn append_event(&self, event: LifecycleEvent) -> Result<(), ForgehookError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
        async fn append_update_history(&self, row: UpdateHistoryRow) -> Result<(), ForgehookError> {
            self.history.lock().unwrap().push(row);
            Ok(())
        }
        async fn update_history(&self, instance_id: &InstanceId) -> Result<Vec<UpdateHistoryRow>, ForgehookError> {
            Ok(self.history.lock().unwrap().iter().filter(|h| &h.instance_id == instance_id).cloned().collect())
        }
        async fn upsert_agent(&self, _agent: forgehook_core::Agent) -> Result<(), ForgehookError> {
            unimplemented!()
        }
        async fn get_agent(&self, _id_or_slug: &str) -> Result<Option<forgehook_core::Agent>, ForgehookError> {
            unimplemented!()
        }
        async fn list_agents(&self, _options: ListAgentsOptions) -> Result<Vec<forgehook_core::Agent>, ForgehookError> {
            unimplemented!()
        }
        async fn soft_delete_agent(&self, _id: &forgehook_core::AgentId) -> Result<(), ForgehookError> {
            unimplemented!()
        }
        async fn create_run(&self, _run: forgehook_core::AgentRun) -> Result<(), ForgehookError> {
            unimplemented!()
        }
        async fn finalize_run(&self, _run: forgehook_core::AgentRun) -> Result<(), ForgehookError> {
            unimplemented!()
        }
        async fn get_run(&self, _id: &forgehook_core::RunId) -> Result<Option<forgehook_core::AgentRun>, ForgehookError> {
            unimplemented!()
        }
        async fn runs_by_agent(&self, _agent_id: &forgehook_core::AgentId, _limit: usize, _offset: usize) -> Result<Vec<forgehook_core::AgentRun>, ForgehookError> {
            unimplemented!()
        }
        async fn recent_runs(&self, _limit: usize) -> Result<Vec<forgehook_core::AgentRun>, ForgehookError> {
            unimplemented!()
        }
    }

    fn manifest(id: &str) -> HookManifest {
        HookManifest {
            id: id.into(),
            name: format!("{id} hook"),
            version: "1.0.0".into(),
            description: None,
            runtime: Runtime::Container,
            port: Some(8080),
            image: Some(ImageRef { repository: "example/echo".into(), tag: Some("v1".into()) }),
            module_code: None,
            gateway_base_url: None,
            endpoints: vec![Endpoint { method: HttpMethod::Post, path: "/echo".into(), description: None, request_body: None }],
            environment: Map::new(),
            volumes: vec![],
            dependencies: Dependencies::default(),
            resources: ResourceLimits::default(),
            health_check: None::<HealthCheck>,
        }
    }

    fn engine(fail_install: bool) -> HookLifecycleEngine {
        let persistence: Arc<dyn PersistencePort> = Arc::new(FakePersistence::default());
        let mut adapters: HashMap<Runtime, Arc<dyn RuntimeAdapter>> = HashMap::new();
        adapters.insert(Runtime::Container, Arc::new(FakeRuntime { fail_install }));
        let ports = Arc::new(PortAllocator::new(forgehook_core::config::PortRange { start: 9000, end: 9010 }));
        HookLifecycleEngine::new(persistence, adapters, ports, "forgehook-")
    }

    #[tokio::test]
    async fn install_with_auto_start_reaches_running() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let refreshed = engine.get(&instance.instance_id).unwrap();
        assert_eq!(refreshed.status, HookStatus::Running);
        assert!(refreshed.runtime_state.host_port.is_some());
    }

    #[tokio::test]
    async fn install_without_auto_start_stays_installed() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap();
        assert_eq!(instance.status, HookStatus::Installed);
    }

    #[tokio::test]
    async fn duplicate_hook_id_is_a_conflict() {
        let engine = engine(false);
        engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap();
        let err = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn failed_install_releases_the_port() {
        let engine = engine(true);
        let err = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap_err();
        assert_eq!(err.code(), "runtime_error");
        assert!(!engine.ports.is_allocated(9000));
    }

    #[tokio::test]
    async fn stop_then_start_round_trips_status() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        engine.stop(&instance.instance_id).await.unwrap();
        assert_eq!(engine.get(&instance.instance_id).unwrap().status, HookStatus::Stopped);
        engine.start(&instance.instance_id, false).await.unwrap();
        assert_eq!(engine.get(&instance.instance_id).unwrap().status, HookStatus::Running);
    }

    #[tokio::test]
    async fn stop_requires_running_status() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap();
        let err = engine.stop(&instance.instance_id).await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn uninstall_releases_port_and_removes_row() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let port = engine.get(&instance.instance_id).unwrap().runtime_state.host_port.unwrap();
        engine.uninstall(&instance.instance_id).await.unwrap();
        assert!(engine.get(&instance.instance_id).is_err());
        assert!(!engine.ports.is_allocated(port));
    }

    #[tokio::test]
    async fn update_records_history_and_bumps_version() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        engine
            .update(&instance.instance_id, UpdateSource::ImageTag { tag: "v2".into(), version: "2.0.0".into() })
            .await
            .unwrap();
        let refreshed = engine.get(&instance.instance_id).unwrap();
        assert_eq!(refreshed.installed_version, "2.0.0");
        assert_eq!(refreshed.previous_version.as_deref(), Some("1.0.0"));
        assert_eq!(refreshed.status, HookStatus::Running);
    }

    #[tokio::test]
    async fn rollback_without_prior_update_is_rejected() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let err = engine.rollback(&instance.instance_id).await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn rollback_after_update_restores_previous_version() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        engine
            .update(&instance.instance_id, UpdateSource::ImageTag { tag: "v2".into(), version: "2.0.0".into() })
            .await
            .unwrap();
        engine.rollback(&instance.instance_id).await.unwrap();
        let refreshed = engine.get(&instance.instance_id).unwrap();
        assert_eq!(refreshed.installed_version, "1.0.0");
    }

    #[tokio::test]
    async fn invoke_dispatches_to_matching_endpoint() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let result = engine
            .invoke(&instance.instance_id, "post_echo", serde_json::json!({"msg": "hi"}), 0)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"echoed": {"msg": "hi"}}));
    }

    #[tokio::test]
    async fn invoke_unknown_endpoint_key_is_not_found() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let err = engine.invoke(&instance.instance_id, "get_missing", serde_json::json!({}), 0).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn health_tick_is_unknown_when_not_running() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), false, None).await.unwrap();
        let health = engine.health_tick(&instance.instance_id).await.unwrap();
        assert_eq!(health, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn health_tick_reports_healthy_when_running() {
        let engine = engine(false);
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();
        let health = engine.health_tick(&instance.instance_id).await.unwrap();
        assert_eq!(health, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn bootstrap_loads_persisted_instances() {
        let persistence: Arc<dyn PersistencePort> = Arc::new(FakePersistence::default());
        let mut adapters: HashMap<Runtime, Arc<dyn RuntimeAdapter>> = HashMap::new();
        adapters.insert(Runtime::Container, Arc::new(FakeRuntime { fail_install: false }));
        let ports = Arc::new(PortAllocator::new(forgehook_core::config::PortRange { start: 9100, end: 9110 }));
        let engine = HookLifecycleEngine::new(persistence.clone(), adapters, ports, "forgehook-");
        let instance = engine.install(manifest("echo"), serde_json::json!({}), Map::new(), true, None).await.unwrap();

        let adapters2: HashMap<Runtime, Arc<dyn RuntimeAdapter>> = {
            let mut m: HashMap<Runtime, Arc<dyn RuntimeAdapter>> = HashMap::new();
            m.insert(Runtime::Container, Arc::new(FakeRuntime { fail_install: false }));
            m
        };
        let ports2 = Arc::new(PortAllocator::new(forgehook_core::config::PortRange { start: 9100, end: 9110 }));
        let fresh_engine = HookLifecycleEngine::new(persistence, adapters2, ports2, "forgehook-");
        fresh_engine.bootstrap().await.unwrap();
        assert_eq!(fresh_engine.get(&instance.instance_id).unwrap().status, HookStatus::Running);
        assert!(fresh_engine.ports.is_allocated(instance.runtime_state.host_port.unwrap()));
    }
}
