#![deny(missing_docs)]
//! Agent Orchestrator (§4.6): a tool-using ReAct loop over installed hooks.
//!
//! Turns an [`Agent`]'s declared `toolHookIds` into an LLM function-call
//! schema via the Tool Schema Builder, dispatches the model's chosen calls
//! through the Hook Lifecycle Engine's `Invoke`, feeds results back, and
//! enforces the run's step/time/retry budgets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use forgehook_core::{
    Agent, AgentConfig, AgentConfigOverride, AgentRun, ForgehookError, HookId, PersistencePort,
    RunId, RunStatus, RunStep,
};
use forgehook_lifecycle::HookLifecycleEngine;
use forgehook_llm_core::registry::ProviderRegistry;
use forgehook_llm_core::types::{ChatMessage, ChatRequest, FinishReason, Role, ToolSchema};

/// Runs one [`Agent`] against an input, producing a persisted [`AgentRun`].
pub struct AgentOrchestrator {
    lifecycle: Arc<HookLifecycleEngine>,
    providers: Arc<ProviderRegistry>,
    persistence: Arc<dyn PersistencePort>,
}

impl AgentOrchestrator {
    /// Build an orchestrator over the given lifecycle engine, provider
    /// registry, and persistence port.
    pub fn new(
        lifecycle: Arc<HookLifecycleEngine>,
        providers: Arc<ProviderRegistry>,
        persistence: Arc<dyn PersistencePort>,
    ) -> Self {
        Self { lifecycle, providers, persistence }
    }

    /// `Run(agent, {input, data?, configOverride?}) -> AgentRun`.
    pub async fn run(
        &self,
        agent: &Agent,
        input_text: String,
        input_data: Option<serde_json::Value>,
        config_override: AgentConfigOverride,
    ) -> Result<AgentRun, ForgehookError> {
        let run_config = agent.config.merged_with(&config_override);
        let started = Instant::now();

        let mut run = AgentRun {
            id: RunId::new(format!("{}-{}", agent.id, Utc::now().timestamp_millis())),
            agent_id: agent.id.clone(),
            input_text: input_text.clone(),
            input_data: input_data.clone(),
            output: None,
            output_text: None,
            steps: Vec::new(),
            total_steps: 0,
            tokens_input: 0,
            tokens_output: 0,
            duration_ms: None,
            status: RunStatus::Running,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.persistence.create_run(run.clone()).await?;

        let hook_ids: Vec<HookId> = agent.tool_hook_ids.iter().map(|h| HookId::new(h.as_str())).collect();
        let instances: HashMap<HookId, forgehook_core::HookInstance> =
            self.lifecycle.list().into_iter().map(|i| (i.hook_id.clone(), i)).collect();
        let tools = forgehook_tools::build_tools(&hook_ids, &instances);

        let mut user_content = input_text;
        if let Some(data) = &input_data {
            user_content.push('\n');
            user_content.push_str(&data.to_string());
        }
        let mut messages = vec![
            ChatMessage::text(Role::System, agent.system_prompt.clone()),
            ChatMessage::text(Role::User, user_content),
        ];

        let outcome = self.drive(agent, &run_config, &mut messages, &tools, &mut run, started).await;

        run.total_steps = run.steps.len() as u32;
        run.duration_ms = Some(started.elapsed().as_millis() as u64);
        run.completed_at = Some(Utc::now());
        match outcome {
            DriveOutcome::Completed => run.status = RunStatus::Completed,
            DriveOutcome::Timeout => run.status = RunStatus::Timeout,
            DriveOutcome::Failed(message) => {
                run.status = RunStatus::Failed;
                run.error_message = Some(message);
            }
        }
        self.persistence.finalize_run(run.clone()).await?;
        Ok(run)
    }

    async fn drive(
        &self,
        agent: &Agent,
        run_config: &AgentConfig,
        messages: &mut Vec<ChatMessage>,
        tools: &[ToolSchema],
        run: &mut AgentRun,
        started: Instant,
    ) -> DriveOutcome {
        let mut step_count = 0u32;

        while step_count < run_config.max_steps {
            if started.elapsed().as_millis() as u64 > run_config.timeout_ms {
                return DriveOutcome::Timeout;
            }

            let request = ChatRequest {
                provider: agent.provider.clone(),
                model: agent.model.clone(),
                messages: messages.clone(),
                tools: tools.to_vec(),
                max_tokens: run_config.max_tokens,
                temperature: run_config.temperature,
            };
            let response = self.providers.chat(request).await;

            if let Some(usage) = response.usage {
                run.tokens_input += usage.input_tokens;
                run.tokens_output += usage.output_tokens;
            }

            if response.finish_reason == FinishReason::Error {
                return DriveOutcome::Failed(response.error.unwrap_or_else(|| "llm error".into()));
            }

            let Some(tool_calls) = response.tool_calls.filter(|c| !c.is_empty()) else {
                let output_text = response.content.unwrap_or_default();
                let trimmed = output_text.trim();
                run.output = Some(if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::json!({ "result": output_text }))
                } else {
                    serde_json::json!({ "result": output_text })
                });
                run.output_text = Some(output_text);
                return DriveOutcome::Completed;
            };

            messages.push(ChatMessage::assistant_tool_calls(response.content, tool_calls.clone()));

            for tc in tool_calls {
                if step_count >= run_config.max_steps {
                    break;
                }
                step_count += 1;
                let step_started = Instant::now();
                let args: serde_json::Value = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));

                let (tool, action, output, error) = match forgehook_tools::parse_tool_name(&tc.function.name) {
                    Some((hook_id, action)) if agent.tool_hook_ids.iter().any(|h| h == hook_id) => {
                        match self.lifecycle.instance_id_for_hook(&HookId::new(hook_id)) {
                            Ok(instance_id) => {
                                let retries = if run_config.retry_on_error { run_config.max_retries } else { 0 };
                                match self.lifecycle.invoke(&instance_id, action, args.clone(), retries).await {
                                    Ok(output) => (hook_id.to_string(), action.to_string(), Some(output), None),
                                    Err(err) => (hook_id.to_string(), action.to_string(), None, Some(err.to_string())),
                                }
                            }
                            Err(err) => (hook_id.to_string(), action.to_string(), None, Some(err.to_string())),
                        }
                    }
                    Some((hook_id, action)) => (hook_id.to_string(), action.to_string(), None, Some("unknown tool".to_string())),
                    None => (tc.function.name.clone(), String::new(), None, Some("unknown tool".to_string())),
                };

                let duration_ms = step_started.elapsed().as_millis() as u64;
                let tool_result_content = match &output {
                    Some(value) => value.to_string(),
                    None => serde_json::json!({ "error": error.clone().unwrap_or_default() }).to_string(),
                };
                messages.push(ChatMessage::tool_result(tc.id.clone(), tool_result_content));

                run.steps.push(RunStep {
                    step: step_count,
                    tool,
                    action,
                    input: args,
                    output,
                    error,
                    duration_ms,
                    at: Utc::now(),
                });
            }
        }

        DriveOutcome::Failed("max steps exceeded".into())
    }
}

enum DriveOutcome {
    Completed,
    Timeout,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forgehook_core::{
        AgentConfig, AgentId, Dependencies, Endpoint, HealthCheck, HookInstance, HookManifest,
        HttpMethod, ImageRef, InstallOptions, InstanceId, LifecycleEvent, ListAgentsOptions,
        ResourceLimits, RuntimeAdapter, RuntimeState, UpdateHistoryRow,
    };
    use forgehook_llm_core::provider::ChatProvider;
    use forgehook_llm_core::types::{ChatResponse, FunctionCall, ToolCall, Usage};
    use forgehook_ports::PortAllocator;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct EchoRuntime;

    #[async_trait]
    impl RuntimeAdapter for EchoRuntime {
        async fn install(&self, _manifest: &HookManifest, options: &InstallOptions) -> Result<RuntimeState, ForgehookError> {
            Ok(RuntimeState { container_id: Some("c".into()), host_port: options.host_port, ..Default::default() })
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
            Ok(body)
        }
        async fn logs(&self, _instance: &HookInstance, _tail: usize) -> Result<Vec<u8>, ForgehookError> {
            Ok(Vec::new())
        }
        async fn check_health(&self, _instance: &HookInstance) -> Result<forgehook_core::HealthStatus, ForgehookError> {
            Ok(forgehook_core::HealthStatus::Healthy)
        }
    }

    #[derive(Default)]
    struct FakePersistence {
        hooks: Mutex<Map<InstanceId, HookInstance>>,
        runs: Mutex<Map<RunId, AgentRun>>,
    }

    #[async_trait]
    impl PersistencePort for FakePersistence {
        async fn upsert_hook(&self, instance: HookInstance) -> Result<(), ForgehookError> {
            self.hooks.lock().unwrap().insert(instance.instance_id.clone(), instance);
            Ok(())
        }
        async fn get_hook(&self, instance_id: &InstanceId) -> Result<Option<HookInstance>, ForgehookError> {
            Ok(self.hooks.lock().unwrap().get(instance_id).cloned())
        }
        async fn get_hook_by_hook_id(&self, hook_id: &HookId) -> Result<Option<HookInstance>, ForgehookError> {
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
            Ok(Vec::new())
        }
        async fn append_event(&self, _event: LifecycleEvent) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn append_update_history(&self, _row: UpdateHistoryRow) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn update_history(&self, _instance_id: &InstanceId) -> Result<Vec<UpdateHistoryRow>, ForgehookError> {
            Ok(Vec::new())
        }
        async fn upsert_agent(&self, _agent: Agent) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn get_agent(&self, _id_or_slug: &str) -> Result<Option<Agent>, ForgehookError> {
            Ok(None)
        }
        async fn list_agents(&self, _options: ListAgentsOptions) -> Result<Vec<Agent>, ForgehookError> {
            Ok(Vec::new())
        }
        async fn soft_delete_agent(&self, _id: &AgentId) -> Result<(), ForgehookError> {
            Ok(())
        }
        async fn create_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
            self.runs.lock().unwrap().insert(run.id.clone(), run);
            Ok(())
        }
        async fn finalize_run(&self, run: AgentRun) -> Result<(), ForgehookError> {
            self.runs.lock().unwrap().insert(run.id.clone(), run);
            Ok(())
        }
        async fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, ForgehookError> {
            Ok(self.runs.lock().unwrap().get(id).cloned())
        }
        async fn runs_by_agent(&self, _agent_id: &AgentId, _limit: usize, _offset: usize) -> Result<Vec<AgentRun>, ForgehookError> {
            Ok(Vec::new())
        }
        async fn recent_runs(&self, _limit: usize) -> Result<Vec<AgentRun>, ForgehookError> {
            Ok(Vec::new())
        }
    }

    fn echo_manifest() -> HookManifest {
        HookManifest {
            id: "echo".into(),
            name: "echo hook".into(),
            version: "1.0.0".into(),
            description: None,
            runtime: forgehook_core::Runtime::Container,
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

    fn test_agent() -> Agent {
        Agent {
            id: AgentId::new("agent-1"),
            slug: "agent-1".into(),
            name: "Echoer".into(),
            description: None,
            provider: "stub".into(),
            model: "stub-model".into(),
            system_prompt: "you echo".into(),
            tool_hook_ids: vec!["echo".into()],
            config: AgentConfig { max_steps: 3, max_tokens: None, temperature: None, timeout_ms: 5_000, retry_on_error: false, max_retries: 0 },
            is_public: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    async fn orchestrator_with(provider: Arc<dyn ChatProvider>) -> (AgentOrchestrator, Arc<HookLifecycleEngine>) {
        let persistence: Arc<dyn PersistencePort> = Arc::new(FakePersistence::default());
        let mut adapters: HashMap<forgehook_core::Runtime, Arc<dyn RuntimeAdapter>> = HashMap::new();
        adapters.insert(forgehook_core::Runtime::Container, Arc::new(EchoRuntime));
        let ports = Arc::new(PortAllocator::new(forgehook_core::config::PortRange { start: 9000, end: 9010 }));
        let lifecycle = Arc::new(HookLifecycleEngine::new(persistence.clone(), adapters, ports, "forgehook-"));
        lifecycle.install(echo_manifest(), serde_json::json!({}), Map::new(), true, None).await.unwrap();

        let mut registry = ProviderRegistry::new();
        registry.register(provider);
        let orchestrator = AgentOrchestrator::new(lifecycle.clone(), Arc::new(registry), persistence);
        (orchestrator, lifecycle)
    }

    struct ScriptedProvider {
        responses: Mutex<Vec<ChatResponse>>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn chat(&self, _request: ChatRequest) -> ChatResponse {
            self.responses.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn happy_path_completes_with_one_step() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![
                ChatResponse {
                    content: None,
                    tool_calls: Some(vec![ToolCall {
                        id: "call_1".into(),
                        function: FunctionCall { name: "echo__post_echo".into(), arguments: "{\"msg\":\"hi\"}".into() },
                    }]),
                    finish_reason: FinishReason::ToolCalls,
                    usage: Some(Usage { input_tokens: 10, output_tokens: 5 }),
                    error: None,
                },
                ChatResponse {
                    content: Some("done".into()),
                    tool_calls: None,
                    finish_reason: FinishReason::Stop,
                    usage: Some(Usage { input_tokens: 8, output_tokens: 2 }),
                    error: None,
                },
            ]),
        });
        let (orchestrator, _lifecycle) = orchestrator_with(provider).await;
        let agent = test_agent();
        let run = orchestrator.run(&agent, "say hi".into(), None, AgentConfigOverride::default()).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].tool, "echo");
        assert_eq!(run.steps[0].action, "post_echo");
        assert_eq!(run.steps[0].output, Some(serde_json::json!({"msg": "hi"})));
        assert_eq!(run.output_text.as_deref(), Some("done"));
        assert_eq!(run.tokens_input, 18);
        assert_eq!(run.tokens_output, 7);
    }

    struct SlowProvider;

    #[async_trait]
    impl ChatProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn chat(&self, _request: ChatRequest) -> ChatResponse {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            ChatResponse {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".into(),
                    function: FunctionCall { name: "echo__post_echo".into(), arguments: "{}".into() },
                }]),
                finish_reason: FinishReason::ToolCalls,
                usage: None,
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn run_exceeding_timeout_budget_reports_timeout() {
        let (orchestrator, _lifecycle) = orchestrator_with(Arc::new(SlowProvider)).await;
        let mut agent = test_agent();
        agent.config.timeout_ms = 100;
        agent.config.max_steps = 10;
        let run = orchestrator.run(&agent, "say hi".into(), None, AgentConfigOverride::default()).await.unwrap();

        assert_eq!(run.status, RunStatus::Timeout);
        assert_eq!(run.steps.len(), 1);
        assert!(run.duration_ms.unwrap() >= 100);
    }

    #[tokio::test]
    async fn call_to_tool_outside_allow_list_is_recorded_as_unknown() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![
                ChatResponse {
                    content: None,
                    tool_calls: Some(vec![ToolCall {
                        id: "call_1".into(),
                        function: FunctionCall { name: "other__post_run".into(), arguments: "{}".into() },
                    }]),
                    finish_reason: FinishReason::ToolCalls,
                    usage: None,
                    error: None,
                },
                ChatResponse {
                    content: Some("done".into()),
                    tool_calls: None,
                    finish_reason: FinishReason::Stop,
                    usage: None,
                    error: None,
                },
            ]),
        });
        let (orchestrator, _lifecycle) = orchestrator_with(provider).await;
        let agent = test_agent();
        let run = orchestrator.run(&agent, "say hi".into(), None, AgentConfigOverride::default()).await.unwrap();

        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].error.as_deref(), Some("unknown tool"));
    }
}
