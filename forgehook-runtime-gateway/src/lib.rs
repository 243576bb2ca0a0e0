#![deny(missing_docs)]
//! Gateway `RuntimeAdapter` (§4.3): a thin HTTP proxy to an externally-hosted
//! hook. The adapter keeps only the manifest's `gatewayBaseUrl`; install and
//! start are no-ops beyond recording it, since nothing here is provisioned.

use async_trait::async_trait;
use forgehook_core::{
    Endpoint, ForgehookError, HealthStatus, HookInstance, HookManifest, InstallOptions, Runtime,
    RuntimeAdapter, RuntimeState,
};

/// Proxies every invoke to `{baseUrl}{path}` verbatim.
pub struct GatewayRuntimeAdapter {
    client: reqwest::Client,
}

impl Default for GatewayRuntimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayRuntimeAdapter {
    /// New adapter with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RuntimeAdapter for GatewayRuntimeAdapter {
    async fn install(&self, manifest: &HookManifest, _options: &InstallOptions) -> Result<RuntimeState, ForgehookError> {
        if manifest.runtime != Runtime::Gateway {
            return Err(ForgehookError::Validation("not a gateway hook".into()));
        }
        let base_url = manifest
            .gateway_base_url
            .clone()
            .ok_or_else(|| ForgehookError::Validation("gateway hook missing gatewayBaseUrl".into()))?;
        Ok(RuntimeState {
            base_url: Some(base_url),
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

    async fn invoke(
        &self,
        instance: &HookInstance,
        endpoint: &Endpoint,
        _action: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ForgehookError> {
        let base_url = instance
            .runtime_state
            .base_url
            .as_deref()
            .ok_or_else(|| ForgehookError::RuntimeError("gateway instance has no base url".into()))?;
        let url = format!("{base_url}{}", endpoint.path);
        let response = self
            .client
            .request(method_to_reqwest(endpoint.method), &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgehookError::RuntimeError(format!("gateway invoke {url}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ForgehookError::RuntimeError(format!("gateway invoke {url}: read body: {e}")))?;
        if !status.is_success() {
            return Err(ForgehookError::RuntimeError(format!("gateway invoke {url}: HTTP {status}: {text}")));
        }
        serde_json::from_str(&text).or(Ok(serde_json::Value::String(text)))
    }

    async fn logs(&self, _instance: &HookInstance, _tail: usize) -> Result<Vec<u8>, ForgehookError> {
        Ok(Vec::new())
    }

    async fn check_health(&self, instance: &HookInstance) -> Result<HealthStatus, ForgehookError> {
        let Some(base_url) = instance.runtime_state.base_url.as_deref() else {
            return Ok(HealthStatus::Unknown);
        };
        match self.client.get(base_url).send().await {
            Ok(response) if response.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy),
            Err(e) => {
                tracing::warn!(error = %e, "gateway health probe failed");
                Ok(HealthStatus::Unhealthy)
            }
        }
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
