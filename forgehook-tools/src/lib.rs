#![deny(missing_docs)]
//! Tool Schema Builder (§4.4).
//!
//! Projects a set of running hook endpoints into an LLM-function-call tool
//! schema, and provides the inverse: recovering `(hookId, action)` from the
//! tool name the model echoes back in its `tool_calls`.

use std::collections::HashMap;

use forgehook_core::{Endpoint, HookId, HookInstance, HookManifest, HookStatus, HttpMethod};
use forgehook_llm_core::types::ToolSchema;

/// `{method.lower()}_{path with "/" -> "_", leading/trailing "_" stripped}`.
/// Shared by tool-name construction and by the Hook Lifecycle Engine's
/// `Invoke`, which must recompute the same key to find the matching
/// endpoint for a dispatched action.
pub fn endpoint_key(method: HttpMethod, path: &str) -> String {
    let slug = path.replace('/', "_");
    let slug = slug.trim_matches('_');
    format!("{}_{}", method.as_lower(), slug)
}

/// `{hookId}__{endpointKey}`.
pub fn build_tool_name(hook_id: &HookId, method: HttpMethod, path: &str) -> String {
    format!("{hook_id}__{}", endpoint_key(method, path))
}

/// Split a tool name at the **first** `__` into `(hookId, action)`. Endpoint
/// paths may themselves contain underscores, so this never splits beyond
/// the first separator.
pub fn parse_tool_name(tool_name: &str) -> Option<(&str, &str)> {
    tool_name.split_once("__")
}

fn parameters_schema(method: HttpMethod, endpoint: &Endpoint) -> serde_json::Value {
    if let Some(body) = &endpoint.request_body {
        if body.get("properties").is_some() || body.get("type") == Some(&serde_json::json!("object")) {
            return body.clone();
        }
    }
    if method != HttpMethod::Get {
        return serde_json::json!({
            "type": "object",
            "properties": { "input": { "type": "object" } }
        });
    }
    serde_json::json!({ "type": "object", "properties": {} })
}

fn build_tool_schema(manifest: &HookManifest, endpoint: &Endpoint) -> ToolSchema {
    let description = endpoint
        .description
        .clone()
        .unwrap_or_else(|| endpoint.path.clone());
    ToolSchema {
        name: build_tool_name(&HookId::new(manifest.id.as_str()), endpoint.method, &endpoint.path),
        description: format!("{}: {}", manifest.name, description),
        parameters: parameters_schema(endpoint.method, endpoint),
    }
}

/// Build tools for every endpoint of every **running** hook named in
/// `hook_ids`. Unknown or not-running hook ids are silently dropped (and
/// logged), per the builder's contract.
pub fn build_tools(hook_ids: &[HookId], instances: &HashMap<HookId, HookInstance>) -> Vec<ToolSchema> {
    let mut tools = Vec::new();
    for hook_id in hook_ids {
        let Some(instance) = instances.get(hook_id) else {
            tracing::warn!(%hook_id, "tool hook id not found; dropping from tool set");
            continue;
        };
        if instance.status != HookStatus::Running {
            tracing::warn!(%hook_id, status = ?instance.status, "hook not running; dropping from tool set");
            continue;
        }
        for endpoint in &instance.manifest.endpoints {
            tools.push(build_tool_schema(&instance.manifest, endpoint));
        }
    }
    tools
}
