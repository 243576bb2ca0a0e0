#![deny(missing_docs)]
//! Container `RuntimeAdapter` (§4.2): full isolation, HTTP wire to a local
//! Docker-compatible daemon.
//!
//! Split into three collaborators the way the adapter contract names them:
//! [`docker::DockerClient`] talks to the engine, [`registry::RegistryClient`]
//! answers "has this tag changed upstream," and [`resources`] turns the
//! manifest's string resource limits into the units the engine API wants.

pub mod docker;
pub mod registry;
pub mod resources;

use async_trait::async_trait;
use forgehook_core::{
    DiscoveredContainer, Endpoint, ForgehookError, HealthStatus, HookInstance, HookManifest,
    InstallOptions, Runtime, RuntimeAdapter, RuntimeState,
};

use docker::{ContainerSpec, DockerClient, HealthConfig};
use registry::RegistryClient;

const STOP_GRACE_SECS: u64 = 30;
const DEFAULT_CONTAINER_PREFIX: &str = "forgehook-";
const DEFAULT_NETWORK: &str = "forgehook-net";

/// Container runtime adapter. One instance is shared across every
/// container-backed hook; nothing here is per-instance state.
pub struct ContainerRuntimeAdapter {
    docker: DockerClient,
    registry: RegistryClient,
    container_prefix: String,
    network_name: String,
}

impl ContainerRuntimeAdapter {
    /// Build an adapter talking to the engine at `docker_base_url`
    /// (e.g. `http://localhost:2375`), using the given naming conventions.
    pub fn new(docker_base_url: impl Into<String>, container_prefix: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            docker: DockerClient::new(docker_base_url),
            registry: RegistryClient::new(),
            container_prefix: container_prefix.into(),
            network_name: network_name.into(),
        }
    }

    /// Build an adapter with the documented default naming conventions.
    pub fn with_defaults(docker_base_url: impl Into<String>) -> Self {
        Self::new(docker_base_url, DEFAULT_CONTAINER_PREFIX, DEFAULT_NETWORK)
    }

    fn container_name(&self, hook_id: &str) -> String {
        format!("{}{hook_id}", self.container_prefix)
    }

    fn compose_environment(manifest: &HookManifest, options: &InstallOptions, host_port: u16) -> Vec<String> {
        let mut env = std::collections::HashMap::new();
        env.insert("PORT".to_string(), host_port.to_string());
        env.insert("NODE_ENV".to_string(), "production".to_string());
        for service in &manifest.dependencies.services {
            env.insert(
                format!("{}_HOST", service.to_uppercase()),
                format!("forgehook-{service}"),
            );
        }
        for (k, v) in &manifest.environment {
            env.insert(k.clone(), v.clone());
        }
        for (k, v) in &options.environment {
            env.insert(k.clone(), v.clone());
        }
        env.into_iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    fn health_config(manifest: &HookManifest) -> Option<HealthConfig> {
        let check = manifest.health_check.as_ref()?;
        Some(HealthConfig {
            test: vec!["CMD".into(), "curl".into(), "-f".into(), check.path.clone()],
            interval: (check.interval_sec * 1_000_000_000) as i64,
            timeout: (check.timeout_sec * 1_000_000_000) as i64,
            retries: check.retries,
        })
    }

    async fn recreate(
        &self,
        manifest: &HookManifest,
        host_port: u16,
        environment: &std::collections::HashMap<String, String>,
    ) -> Result<RuntimeState, ForgehookError> {
        let image = manifest
            .image
            .as_ref()
            .ok_or_else(|| ForgehookError::Validation("container hook missing image".into()))?;
        let name = self.container_name(&manifest.id);
        let memory_bytes = manifest.resources.memory.as_deref().map(resources::parse_memory).transpose()?;
        let nano_cpus = manifest.resources.cpu.as_deref().map(resources::parse_cpu_nanos).transpose()?;

        let spec = ContainerSpec {
            name: name.clone(),
            image: format!("{}:{}", image.repository, image.tag_or_latest()),
            env: environment.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            exposed_port: manifest.port.unwrap_or(80),
            host_port,
            network: self.network_name.clone(),
            binds: manifest.volumes.clone(),
            memory_bytes,
            nano_cpus,
            health_check: Self::health_config(manifest),
        };

        let container_id = self.docker.create_container(&spec).await?;
        Ok(RuntimeState {
            container_id: Some(container_id),
            container_name: Some(name),
            host_port: Some(host_port),
            ..Default::default()
        })
    }
}

#[async_trait]
impl RuntimeAdapter for ContainerRuntimeAdapter {
    async fn install(&self, manifest: &HookManifest, options: &InstallOptions) -> Result<RuntimeState, ForgehookError> {
        if manifest.runtime != Runtime::Container {
            return Err(ForgehookError::Validation("not a container hook".into()));
        }
        let image = manifest
            .image
            .as_ref()
            .ok_or_else(|| ForgehookError::Validation("container hook missing image".into()))?;
        let host_port = options
            .host_port
            .ok_or_else(|| ForgehookError::Internal("container install requires a pre-allocated host port".into()))?;

        self.docker.ensure_network(&self.network_name).await?;
        for volume in &manifest.volumes {
            self.docker.ensure_volume(volume).await?;
        }
        if !self.docker.image_exists(&image.repository, image.tag_or_latest()).await? {
            self.docker.pull_image(&image.repository, image.tag_or_latest()).await?;
        }

        let mut environment = std::collections::HashMap::new();
        for kv in Self::compose_environment(manifest, options, host_port) {
            if let Some((k, v)) = kv.split_once('=') {
                environment.insert(k.to_string(), v.to_string());
            }
        }
        self.recreate(manifest, host_port, &environment).await
    }

    async fn start(&self, instance: &HookInstance, pull_latest: bool) -> Result<RuntimeState, ForgehookError> {
        let container_id = instance
            .runtime_state
            .container_id
            .as_deref()
            .ok_or_else(|| ForgehookError::Validation("start requires an existing container".into()))?;

        if pull_latest {
            let image = instance
                .manifest
                .image
                .as_ref()
                .ok_or_else(|| ForgehookError::Validation("container hook missing image".into()))?;
            let local = self
                .docker
                .local_digest(&image.repository, image.tag_or_latest())
                .await?;
            let remote = self
                .registry
                .remote_digest(&image.repository, image.tag_or_latest())
                .await;
            if registry::has_update(local.as_deref(), remote.as_deref()) {
                self.docker.pull_image(&image.repository, image.tag_or_latest()).await?;
                self.docker.remove(container_id).await?;
                let host_port = instance.runtime_state.host_port.unwrap_or(0);
                let mut environment = instance.environment.clone();
                for (k, v) in &instance.manifest.environment {
                    environment.entry(k.clone()).or_insert_with(|| v.clone());
                }
                let state = self.recreate(&instance.manifest, host_port, &environment).await?;
                self.docker.start(state.container_id.as_deref().unwrap_or_default()).await?;
                return Ok(state);
            }
        }

        self.docker.start(container_id).await?;
        Ok(instance.runtime_state.clone())
    }

    async fn stop(&self, instance: &HookInstance) -> Result<(), ForgehookError> {
        let container_id = instance
            .runtime_state
            .container_id
            .as_deref()
            .ok_or_else(|| ForgehookError::Validation("stop requires an existing container".into()))?;
        self.docker.stop(container_id, STOP_GRACE_SECS).await
    }

    async fn remove(&self, instance: &HookInstance) -> Result<(), ForgehookError> {
        let Some(container_id) = instance.runtime_state.container_id.as_deref() else {
            return Ok(());
        };
        self.docker.remove(container_id).await
    }

    async fn invoke(
        &self,
        instance: &HookInstance,
        endpoint: &Endpoint,
        _action: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ForgehookError> {
        let host_port = instance
            .runtime_state
            .host_port
            .ok_or_else(|| ForgehookError::RuntimeError("instance has no host port".into()))?;
        let url = format!("http://localhost:{host_port}{}", endpoint.path);
        let client = reqwest::Client::new();
        let request = client.request(
            method_to_reqwest(endpoint.method),
            &url,
        );
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgehookError::RuntimeError(format!("invoke {url}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ForgehookError::RuntimeError(format!("invoke {url}: read body: {e}")))?;
        if !status.is_success() {
            return Err(ForgehookError::RuntimeError(format!("invoke {url}: HTTP {status}: {text}")));
        }
        serde_json::from_str(&text).or(Ok(serde_json::Value::String(text)))
    }

    async fn logs(&self, instance: &HookInstance, tail: usize) -> Result<Vec<u8>, ForgehookError> {
        let container_id = instance
            .runtime_state
            .container_id
            .as_deref()
            .ok_or_else(|| ForgehookError::NotFound("no container for instance".into()))?;
        self.docker.logs(container_id, tail).await
    }

    async fn check_health(&self, instance: &HookInstance) -> Result<HealthStatus, ForgehookError> {
        let Some(container_id) = instance.runtime_state.container_id.as_deref() else {
            return Ok(HealthStatus::Unknown);
        };
        let inspected = self.docker.inspect(container_id).await?;
        if !inspected.state.running {
            return Ok(HealthStatus::Unknown);
        }
        Ok(match inspected.state.health.map(|h| h.status) {
            Some(status) if status == "healthy" => HealthStatus::Healthy,
            Some(status) if status == "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        })
    }

    async fn discover(&self, name_prefix: &str) -> Result<Vec<DiscoveredContainer>, ForgehookError> {
        let containers = self.docker.list(name_prefix).await?;
        Ok(containers
            .into_iter()
            .map(|c| DiscoveredContainer {
                name: c.name().unwrap_or(&c.id).to_string(),
                runtime_id: c.id.clone(),
                running: c.state == "running",
                host_port: c.host_port(),
            })
            .collect())
    }
}

fn method_to_reqwest(method: forgehook_core::HttpMethod) -> reqwest::Method {
    use forgehook_core::HttpMethod;
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}
