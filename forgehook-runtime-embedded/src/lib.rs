#![deny(missing_docs)]
//! Embedded `RuntimeAdapter` (§4.3): trusted hook code runs in-process, no
//! network hop, no container.
//!
//! A module's exports are declared as a JSON object mapping each function
//! name to the value it returns — `moduleCode` is that object, serialized.
//! This keeps the embedded runtime dependency-free (no scripting VM in the
//! stack) while still exercising the full load/invoke/unload/update/rollback
//! surface the lifecycle engine drives every runtime through.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgehook_core::{
    Endpoint, ForgehookError, HealthStatus, HookInstance, HookManifest, InstallOptions,
    Runtime, RuntimeAdapter, RuntimeState,
};
use serde_json::Value;

struct LoadedModule {
    exports: HashMap<String, Value>,
    invocation_count: u64,
    last_invoked_at: Option<DateTime<Utc>>,
}

/// One invocation outcome, before it is folded into `RuntimeAdapter::invoke`'s
/// plain `Result`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InvokeOutcome {
    /// Whether the export was found and returned a value.
    pub success: bool,
    /// The export's stored value, when `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// `"unknown export"` when `!success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-process module table: `hookId -> loaded module`.
pub struct EmbeddedRuntimeAdapter {
    modules: Mutex<HashMap<String, LoadedModule>>,
}

impl Default for EmbeddedRuntimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedRuntimeAdapter {
    /// Empty module table.
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
        }
    }

    fn parse_module(module_code: &str) -> Result<HashMap<String, Value>, ForgehookError> {
        serde_json::from_str(module_code)
            .map_err(|e| ForgehookError::Validation(format!("invalid module code: {e}")))
    }

    /// Load (or replace) a hook's module from its declared exports.
    pub fn load(&self, hook_id: &str, module_code: &str) -> Result<(), ForgehookError> {
        let exports = Self::parse_module(module_code)?;
        let mut modules = self.modules.lock().expect("module table poisoned");
        modules.insert(
            hook_id.to_string(),
            LoadedModule {
                exports,
                invocation_count: 0,
                last_invoked_at: None,
            },
        );
        Ok(())
    }

    /// Drop a hook's module.
    pub fn unload(&self, hook_id: &str) {
        self.modules.lock().expect("module table poisoned").remove(hook_id);
    }

    /// Call one export by name, per the `{success, result?, error?}` contract.
    pub fn invoke_export(&self, hook_id: &str, function_name: &str, _input: Value) -> InvokeOutcome {
        let mut modules = self.modules.lock().expect("module table poisoned");
        let Some(module) = modules.get_mut(hook_id) else {
            return InvokeOutcome {
                success: false,
                result: None,
                error: Some("module not loaded".into()),
            };
        };
        match module.exports.get(function_name).cloned() {
            Some(value) => {
                module.invocation_count += 1;
                module.last_invoked_at = Some(Utc::now());
                InvokeOutcome {
                    success: true,
                    result: Some(value),
                    error: None,
                }
            }
            None => InvokeOutcome {
                success: false,
                result: None,
                error: Some("unknown export".into()),
            },
        }
    }

    /// `CheckHealth(hookId) -> {loaded, exports[], invocationCount, lastInvoked?}`.
    pub fn health_snapshot(&self, hook_id: &str) -> Value {
        let modules = self.modules.lock().expect("module table poisoned");
        match modules.get(hook_id) {
            Some(module) => serde_json::json!({
                "loaded": true,
                "exports": module.exports.keys().cloned().collect::<Vec<_>>(),
                "invocationCount": module.invocation_count,
                "lastInvoked": module.last_invoked_at,
            }),
            None => serde_json::json!({ "loaded": false, "exports": [], "invocationCount": 0 }),
        }
    }
}

#[async_trait]
impl RuntimeAdapter for EmbeddedRuntimeAdapter {
    async fn install(&self, manifest: &HookManifest, _options: &InstallOptions) -> Result<RuntimeState, ForgehookError> {
        if manifest.runtime != Runtime::Embedded {
            return Err(ForgehookError::Validation("not an embedded hook".into()));
        }
        let module_code = manifest
            .module_code
            .as_deref()
            .ok_or_else(|| ForgehookError::Validation("embedded hook missing moduleCode".into()))?;
        self.load(&manifest.id, module_code)?;
        Ok(RuntimeState {
            module_loaded: true,
            ..Default::default()
        })
    }

    async fn start(&self, instance: &HookInstance, _pull_latest: bool) -> Result<RuntimeState, ForgehookError> {
        if !self
            .modules
            .lock()
            .expect("module table poisoned")
            .contains_key(instance.hook_id.as_str())
        {
            let module_code = instance
                .manifest
                .module_code
                .as_deref()
                .ok_or_else(|| ForgehookError::Validation("embedded hook missing moduleCode".into()))?;
            self.load(instance.hook_id.as_str(), module_code)?;
        }
        Ok(RuntimeState {
            module_loaded: true,
            ..instance.runtime_state.clone()
        })
    }

    async fn stop(&self, instance: &HookInstance) -> Result<(), ForgehookError> {
        self.unload(instance.hook_id.as_str());
        Ok(())
    }

    async fn remove(&self, instance: &HookInstance) -> Result<(), ForgehookError> {
        self.unload(instance.hook_id.as_str());
        Ok(())
    }

    async fn invoke(
        &self,
        instance: &HookInstance,
        _endpoint: &Endpoint,
        action: &str,
        body: Value,
    ) -> Result<Value, ForgehookError> {
        let function_name = strip_method_prefix(action);
        let outcome = self.invoke_export(instance.hook_id.as_str(), function_name, body);
        if outcome.success {
            Ok(outcome.result.unwrap_or(Value::Null))
        } else {
            Err(ForgehookError::RuntimeError(
                outcome.error.unwrap_or_else(|| "unknown export".into()),
            ))
        }
    }

    async fn logs(&self, _instance: &HookInstance, _tail: usize) -> Result<Vec<u8>, ForgehookError> {
        Ok(Vec::new())
    }

    async fn check_health(&self, instance: &HookInstance) -> Result<HealthStatus, ForgehookError> {
        let loaded = self
            .modules
            .lock()
            .expect("module table poisoned")
            .contains_key(instance.hook_id.as_str());
        Ok(if loaded { HealthStatus::Healthy } else { HealthStatus::Unhealthy })
    }
}

/// `functionName = action` with any leading `get_/post_/put_/delete_/patch_` removed (§4.1 Invoke).
fn strip_method_prefix(action: &str) -> &str {
    for prefix in ["get_", "post_", "put_", "delete_", "patch_"] {
        if let Some(stripped) = action.strip_prefix(prefix) {
            return stripped;
        }
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_method_prefixes() {
        assert_eq!(strip_method_prefix("post_echo"), "echo");
        assert_eq!(strip_method_prefix("get_status"), "status");
        assert_eq!(strip_method_prefix("no_prefix_here"), "no_prefix_here");
    }

    #[test]
    fn load_then_invoke_returns_stored_value() {
        let adapter = EmbeddedRuntimeAdapter::new();
        adapter.load("echo", r#"{"echo": {"ok": true}}"#).unwrap();
        let outcome = adapter.invoke_export("echo", "echo", Value::Null);
        assert!(outcome.success);
        assert_eq!(outcome.result.unwrap(), serde_json::json!({"ok": true}));
    }

    #[test]
    fn unknown_export_is_reported_without_panicking() {
        let adapter = EmbeddedRuntimeAdapter::new();
        adapter.load("echo", r#"{"echo": {}}"#).unwrap();
        let outcome = adapter.invoke_export("echo", "missing", Value::Null);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("unknown export"));
    }

    #[test]
    fn invocation_count_increments() {
        let adapter = EmbeddedRuntimeAdapter::new();
        adapter.load("echo", r#"{"ping": "pong"}"#).unwrap();
        adapter.invoke_export("echo", "ping", Value::Null);
        adapter.invoke_export("echo", "ping", Value::Null);
        let snapshot = adapter.health_snapshot("echo");
        assert_eq!(snapshot["invocationCount"], 2);
    }

    #[test]
    fn unload_clears_the_module() {
        let adapter = EmbeddedRuntimeAdapter::new();
        adapter.load("echo", r#"{"ping": "pong"}"#).unwrap();
        adapter.unload("echo");
        let snapshot = adapter.health_snapshot("echo");
        assert_eq!(snapshot["loaded"], false);
    }
}
