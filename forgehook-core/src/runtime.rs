//! The capability interface every runtime adapter (container, embedded,
//! gateway) implements.
//!
//! Per the design notes: polymorphism by runtime type becomes a capability
//! interface, not an inline branch. The Hook Lifecycle Engine holds a
//! `Runtime -> Arc<dyn RuntimeAdapter>` map and dispatches to the adapter
//! once per operation; it never switches on runtime type internally.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ForgehookError;
use crate::model::{Endpoint, HealthStatus, HookInstance, HookManifest, RuntimeState};

/// Inputs to `RuntimeAdapter::install`, beyond the manifest itself.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// User-supplied config overrides, layered over the manifest.
    pub config: serde_json::Value,
    /// User-supplied environment overrides (these win over manifest defaults).
    pub environment: HashMap<String, String>,
    /// A previously allocated host port, when the caller already reserved one.
    pub host_port: Option<u16>,
}

/// One runtime-native entity found by [`RuntimeAdapter::discover`] that the
/// engine doesn't already have a row for, or whose row needs reconciling.
/// Bootstrap uses this to adopt containers left running by a prior process.
#[derive(Debug, Clone)]
pub struct DiscoveredContainer {
    /// The name the adapter's naming convention assigned, e.g. `forgehook-<hookId>`.
    pub name: String,
    /// Whatever handle the runtime uses to address it again (container id, pid, url).
    pub runtime_id: String,
    /// `true` if the runtime reports it as currently running.
    pub running: bool,
    /// The host port it was published on, if the runtime exposes one.
    pub host_port: Option<u16>,
}

/// Object-safe trait implemented once per runtime kind.
///
/// Every method is scoped to a single instance; adapters never need to see
/// the full instance table. The Hook Lifecycle Engine is the only caller.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Provision whatever the runtime needs to exist before it can start:
    /// pull an image, load a module, or simply record a base URL.
    async fn install(
        &self,
        manifest: &HookManifest,
        options: &InstallOptions,
    ) -> Result<RuntimeState, ForgehookError>;

    /// Start (or restart in place) the instance. `pull_latest` is only
    /// meaningful for the container adapter.
    async fn start(
        &self,
        instance: &HookInstance,
        pull_latest: bool,
    ) -> Result<RuntimeState, ForgehookError>;

    /// Stop the instance gracefully.
    async fn stop(&self, instance: &HookInstance) -> Result<(), ForgehookError>;

    /// Tear down whatever `install` provisioned.
    async fn remove(&self, instance: &HookInstance) -> Result<(), ForgehookError>;

    /// Dispatch one endpoint call. `action` is the parsed tool-name suffix
    /// (see the Tool Schema Builder); adapters that don't need it (container,
    /// gateway) ignore it and dispatch on `endpoint` directly.
    async fn invoke(
        &self,
        instance: &HookInstance,
        endpoint: &Endpoint,
        action: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ForgehookError>;

    /// Fetch the most recent `tail` lines/bytes of log output, if supported.
    async fn logs(&self, instance: &HookInstance, tail: usize) -> Result<Vec<u8>, ForgehookError>;

    /// Run one health probe.
    async fn check_health(&self, instance: &HookInstance) -> Result<HealthStatus, ForgehookError>;

    /// List runtime-native entities matching `name_prefix`, for bootstrap
    /// adoption of things started by a prior process (§4.1 "Adoption &
    /// reconciliation"). Adapters with nothing to discover (embedded,
    /// gateway) keep the default empty result.
    async fn discover(&self, _name_prefix: &str) -> Result<Vec<DiscoveredContainer>, ForgehookError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn RuntimeAdapter) {}
}
