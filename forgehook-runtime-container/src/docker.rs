//! Minimal Docker Engine API client (§6: pull, image inspect, container
//! create/start/stop/remove/inspect/logs). Talks HTTP to a `DOCKER_HOST`
//! (`tcp://host:port`); `DOCKER_SOCKET` is accepted for configuration
//! purposes but only the TCP transport is wired up here.

use std::collections::HashMap;

use forgehook_core::ForgehookError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_VERSION: &str = "v1.43";

/// Talks to one Docker-compatible engine.
pub struct DockerClient {
    client: reqwest::Client,
    base_url: String,
}

/// A single host-port binding for a container's exposed port.
#[derive(Debug, Serialize, Default)]
pub struct PortBinding {
    /// The host port to bind to, as a string (Docker API convention).
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

/// Docker container healthcheck configuration.
#[derive(Debug, Serialize)]
pub struct HealthConfig {
    /// The healthcheck command to run.
    #[serde(rename = "Test")]
    pub test: Vec<String>,
    /// Interval between healthchecks, in nanoseconds.
    #[serde(rename = "Interval")]
    pub interval: i64,
    /// Timeout for a single healthcheck run, in nanoseconds.
    #[serde(rename = "Timeout")]
    pub timeout: i64,
    /// Number of consecutive failures needed to report unhealthy.
    #[serde(rename = "Retries")]
    pub retries: u32,
}

/// Docker container restart policy.
#[derive(Debug, Serialize, Default)]
pub struct RestartPolicy {
    /// The restart policy name, e.g. `unless-stopped`.
    #[serde(rename = "Name")]
    pub name: String,
}

/// Input to `create_container`; maps onto the Docker Engine API's
/// `ContainerConfig` + `HostConfig`.
#[derive(Debug, Default)]
pub struct ContainerSpec {
    /// Desired container name.
    pub name: String,
    /// Image reference to run.
    pub image: String,
    /// Environment variables, as `KEY=VALUE` strings.
    pub env: Vec<String>,
    /// Container-side port to expose.
    pub exposed_port: u16,
    /// Host-side port to bind the exposed port to.
    pub host_port: u16,
    /// Docker network mode/name to attach to.
    pub network: String,
    /// Bind mounts, as `host:container[:mode]` strings.
    pub binds: Vec<String>,
    /// Memory limit in bytes, if constrained.
    pub memory_bytes: Option<u64>,
    /// CPU limit in nano-CPUs, if constrained.
    pub nano_cpus: Option<u64>,
    /// Healthcheck configuration, if any.
    pub health_check: Option<HealthConfig>,
}

/// Response body from the container-create endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateContainerResponse {
    /// The created container's ID.
    #[serde(rename = "Id")]
    pub id: String,
}

/// One entry from the container-list endpoint.
#[derive(Debug, Deserialize)]
pub struct ContainerSummary {
    /// The container's ID.
    #[serde(rename = "Id")]
    pub id: String,
    /// The container's names, as reported by Docker.
    #[serde(rename = "Names")]
    pub names: Vec<String>,
    /// The container's current state, e.g. `running`.
    #[serde(rename = "State")]
    pub state: String,
    /// Published ports for this container.
    #[serde(rename = "Ports", default)]
    pub ports: Vec<PortSummary>,
}

/// One published port entry from the container-list endpoint.
#[derive(Debug, Deserialize)]
pub struct PortSummary {
    /// The container-side port.
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    /// The host-side port, if published.
    #[serde(rename = "PublicPort", default)]
    pub public_port: Option<u16>,
    /// The port protocol, e.g. `tcp`.
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

impl ContainerSummary {
    /// The host-side TCP port Docker published for this container, if any.
    pub fn host_port(&self) -> Option<u16> {
        self.ports.iter().find_map(|p| p.public_port)
    }

    /// The container's bare name, stripped of Docker's leading `/`.
    pub fn name(&self) -> Option<&str> {
        self.names.first().map(|n| n.trim_start_matches('/'))
    }
}

/// Response body from the container-inspect endpoint.
#[derive(Debug, Deserialize)]
pub struct InspectResponse {
    /// The container's current state.
    #[serde(rename = "State")]
    pub state: InspectState,
}

/// The `State` section of a container-inspect response.
#[derive(Debug, Deserialize)]
pub struct InspectState {
    /// Whether the container is currently running.
    #[serde(rename = "Running")]
    pub running: bool,
    /// Healthcheck status, if a healthcheck is configured.
    #[serde(rename = "Health")]
    pub health: Option<InspectHealth>,
}

/// The `Health` section of a container-inspect response.
#[derive(Debug, Deserialize)]
pub struct InspectHealth {
    /// The healthcheck status, e.g. `healthy`.
    #[serde(rename = "Status")]
    pub status: String,
}

/// Response body from the image-inspect endpoint.
#[derive(Debug, Deserialize)]
pub struct ImageInspectResponse {
    /// Content-addressable digests for this image.
    #[serde(rename = "RepoDigests")]
    pub repo_digests: Vec<String>,
}

impl DockerClient {
    /// Build a client against `base_url`, e.g. `http://localhost:2375` when
    /// `DOCKER_HOST=tcp://localhost:2375`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{API_VERSION}{path}", self.base_url.trim_end_matches('/'))
    }

    fn engine_err(context: &str, err: impl std::fmt::Display) -> ForgehookError {
        ForgehookError::EngineUnavailable(format!("{context}: {err}"))
    }

    /// Check that the Docker engine is reachable.
    pub async fn ping(&self) -> Result<(), ForgehookError> {
        self.client
            .get(self.url("/_ping"))
            .send()
            .await
            .map_err(|e| Self::engine_err("ping", e))?;
        Ok(())
    }

    /// Create the named Docker network if it doesn't already exist.
    pub async fn ensure_network(&self, name: &str) -> Result<(), ForgehookError> {
        let list_url = self.url("/networks");
        let filters = serde_json::json!({ "name": [name] });
        let existing: Vec<Value> = self
            .client
            .get(&list_url)
            .query(&[("filters", filters.to_string())])
            .send()
            .await
            .map_err(|e| Self::engine_err("list networks", e))?
            .json()
            .await
            .map_err(|e| Self::engine_err("parse network list", e))?;
        if !existing.is_empty() {
            return Ok(());
        }
        let body = serde_json::json!({ "Name": name, "CheckDuplicate": true });
        let response = self
            .client
            .post(self.url("/networks/create"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::engine_err("create network", e))?;
        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(ForgehookError::EngineUnavailable(format!(
                "create network {name}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Create the named Docker volume if it doesn't already exist.
    pub async fn ensure_volume(&self, name: &str) -> Result<(), ForgehookError> {
        let body = serde_json::json!({ "Name": name });
        self.client
            .post(self.url("/volumes/create"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::engine_err("create volume", e))?;
        Ok(())
    }

    /// Check whether the given image:tag exists locally.
    pub async fn image_exists(&self, repository: &str, tag: &str) -> Result<bool, ForgehookError> {
        let response = self
            .client
            .get(self.url(&format!("/images/{repository}:{tag}/json")))
            .send()
            .await
            .map_err(|e| Self::engine_err("image inspect", e))?;
        Ok(response.status().is_success())
    }

    /// Look up the content digest of a locally-present image:tag, if any.
    pub async fn local_digest(&self, repository: &str, tag: &str) -> Result<Option<String>, ForgehookError> {
        let response = self
            .client
            .get(self.url(&format!("/images/{repository}:{tag}/json")))
            .send()
            .await
            .map_err(|e| Self::engine_err("image inspect", e))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let inspected: ImageInspectResponse = response
            .json()
            .await
            .map_err(|e| Self::engine_err("parse image inspect", e))?;
        Ok(inspected
            .repo_digests
            .first()
            .and_then(|d| d.split('@').nth(1))
            .map(str::to_string))
    }

    /// Pull the given image:tag from its configured registry.
    pub async fn pull_image(&self, repository: &str, tag: &str) -> Result<(), ForgehookError> {
        let response = self
            .client
            .post(self.url(&format!("/images/create?fromImage={repository}&tag={tag}")))
            .send()
            .await
            .map_err(|e| Self::engine_err("pull image", e))?;
        if !response.status().is_success() {
            return Err(ForgehookError::ImageError(format!(
                "pull {repository}:{tag}: HTTP {}",
                response.status()
            )));
        }
        // Drain the streamed pull-progress body; we don't surface it.
        let _ = response.bytes().await;
        Ok(())
    }

    /// Create a container from the given spec, returning its ID.
    pub async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ForgehookError> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{}/tcp", spec.exposed_port),
            vec![PortBinding {
                host_port: spec.host_port.to_string(),
            }],
        );
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(format!("{}/tcp", spec.exposed_port), serde_json::json!({}));

        let body = serde_json::json!({
            "Image": spec.image,
            "Env": spec.env,
            "ExposedPorts": exposed_ports,
            "HostConfig": {
                "PortBindings": port_bindings,
                "NetworkMode": spec.network,
                "Binds": spec.binds,
                "RestartPolicy": RestartPolicy { name: "unless-stopped".into() },
                "Memory": spec.memory_bytes,
                "NanoCpus": spec.nano_cpus,
            },
            "Healthcheck": spec.health_check,
        });

        let response = self
            .client
            .post(self.url(&format!("/containers/create?name={}", spec.name)))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::engine_err("create container", e))?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ForgehookError::RuntimeError(format!(
                "create container {}: {text}",
                spec.name
            )));
        }
        let created: CreateContainerResponse = response
            .json()
            .await
            .map_err(|e| Self::engine_err("parse create response", e))?;
        Ok(created.id)
    }

    /// Start the container with the given ID.
    pub async fn start(&self, id: &str) -> Result<(), ForgehookError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{id}/start")))
            .send()
            .await
            .map_err(|e| Self::engine_err("start container", e))?;
        if !response.status().is_success() && response.status().as_u16() != 304 {
            return Err(ForgehookError::RuntimeError(format!(
                "start {id}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Stop the container with the given ID, allowing `timeout_secs` for graceful shutdown.
    pub async fn stop(&self, id: &str, timeout_secs: u64) -> Result<(), ForgehookError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{id}/stop?t={timeout_secs}")))
            .send()
            .await
            .map_err(|e| Self::engine_err("stop container", e))?;
        if !response.status().is_success() && response.status().as_u16() != 304 {
            return Err(ForgehookError::RuntimeError(format!(
                "stop {id}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Forcibly remove the container with the given ID.
    pub async fn remove(&self, id: &str) -> Result<(), ForgehookError> {
        let response = self
            .client
            .delete(self.url(&format!("/containers/{id}?force=true")))
            .send()
            .await
            .map_err(|e| Self::engine_err("remove container", e))?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ForgehookError::RuntimeError(format!(
                "remove {id}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Inspect the container with the given ID.
    pub async fn inspect(&self, id: &str) -> Result<InspectResponse, ForgehookError> {
        let response = self
            .client
            .get(self.url(&format!("/containers/{id}/json")))
            .send()
            .await
            .map_err(|e| Self::engine_err("inspect container", e))?;
        if !response.status().is_success() {
            return Err(ForgehookError::NotFound(format!("container {id}")));
        }
        response
            .json()
            .await
            .map_err(|e| Self::engine_err("parse inspect", e))
    }

    /// Fetch the last `tail` lines of stdout/stderr logs for the given container.
    pub async fn logs(&self, id: &str, tail: usize) -> Result<Vec<u8>, ForgehookError> {
        let response = self
            .client
            .get(self.url(&format!(
                "/containers/{id}/logs?stdout=true&stderr=true&tail={tail}"
            )))
            .send()
            .await
            .map_err(|e| Self::engine_err("fetch logs", e))?;
        if !response.status().is_success() {
            return Err(ForgehookError::RuntimeError(format!(
                "logs {id}: HTTP {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Self::engine_err("read logs body", e))
    }

    /// List containers whose name starts with `name_prefix`.
    pub async fn list(&self, name_prefix: &str) -> Result<Vec<ContainerSummary>, ForgehookError> {
        let filters = serde_json::json!({ "name": [name_prefix] });
        let response = self
            .client
            .get(self.url("/containers/json"))
            .query(&[("all", "true"), ("filters", &filters.to_string())])
            .send()
            .await
            .map_err(|e| Self::engine_err("list containers", e))?;
        response
            .json()
            .await
            .map_err(|e| Self::engine_err("parse container list", e))
    }
}
