//! Supervisor 构建器：统一的初始化逻辑
//!
//! 所有共享句柄（LLM、持久化、检查点）集中在 SupervisorContext 中一次构造，
//! 再显式传给 Orchestrator 与各子 Agent，不使用全局单例。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::orchestrator::Orchestrator;
use crate::core::SupervisorError;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::react::WorkerRegistry;
use crate::store::{
    CheckpointStore, InMemoryCheckpointStore, InMemoryStore, NoteStore, ScheduleStore,
    SqliteCheckpointStore, TaskStore,
};

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
///
/// 缺少 API Key 时仍返回客户端，但 is_available() 为 false，每轮直接返回降级提示。
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let llm = &cfg.llm;
    let explicit_key = llm.api_key.clone().filter(|k| !k.trim().is_empty());

    match llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        "openai" => {
            let key = explicit_key.or_else(|| env_key("OPENAI_API_KEY"));
            tracing::info!("Using OpenAI-compatible LLM ({})", llm.model);
            Arc::new(
                OpenAiClient::new(llm.base_url.as_deref(), &llm.model, key.as_deref())
                    .with_temperature(llm.temperature)
                    .with_timeout(llm.timeouts.request),
            )
        }
        other => {
            if other != "deepseek" {
                tracing::warn!("Unknown LLM provider '{}', falling back to DeepSeek", other);
            }
            // 仅配置了 OPENAI_API_KEY 时也走 DeepSeek 兼容端点
            let key = explicit_key
                .or_else(|| env_key("DEEPSEEK_API_KEY"))
                .or_else(|| env_key("OPENAI_API_KEY"));
            tracing::info!("Using DeepSeek LLM ({})", llm.model);
            let client = match llm.base_url.as_deref() {
                Some(base) => OpenAiClient::new(Some(base), &llm.model, key.as_deref()),
                None => create_deepseek_client(Some(&llm.model), key.as_deref()),
            };
            Arc::new(
                client
                    .with_temperature(llm.temperature)
                    .with_timeout(llm.timeouts.request),
            )
        }
    }
}

/// 一次构造、显式传递的共享上下文
#[derive(Clone)]
pub struct SupervisorContext {
    pub llm: Arc<dyn LlmClient>,
    pub settings: AppConfig,
}

impl SupervisorContext {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AppConfig) -> Self {
        Self { llm, settings }
    }

    pub fn from_config(settings: AppConfig) -> Self {
        Self {
            llm: create_llm_from_config(&settings),
            settings,
        }
    }
}

/// Orchestrator 构建器；未指定的持久化与检查点使用内存实现
pub struct SupervisorBuilder {
    context: SupervisorContext,
    tasks: Option<Arc<dyn TaskStore>>,
    schedules: Option<Arc<dyn ScheduleStore>>,
    notes: Option<Arc<dyn NoteStore>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    workers: Option<WorkerRegistry>,
}

impl SupervisorBuilder {
    pub fn new(context: SupervisorContext) -> Self {
        Self {
            context,
            tasks: None,
            schedules: None,
            notes: None,
            checkpoints: None,
            workers: None,
        }
    }

    /// 三个领域共用同一个存储实现（如 InMemoryStore）
    pub fn with_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: TaskStore + ScheduleStore + NoteStore + 'static,
    {
        let tasks: Arc<dyn TaskStore> = store.clone();
        let schedules: Arc<dyn ScheduleStore> = store.clone();
        let notes: Arc<dyn NoteStore> = store;
        self.tasks = Some(tasks);
        self.schedules = Some(schedules);
        self.notes = Some(notes);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// 替换子 Agent 表（测试中注入脚本化 Worker）
    pub fn with_workers(mut self, workers: WorkerRegistry) -> Self {
        self.workers = Some(workers);
        self
    }

    /// 检查点：显式指定 > 配置的 SQLite 路径 > 内存
    async fn resolve_checkpoints(&mut self) -> Result<Arc<dyn CheckpointStore>, SupervisorError> {
        if let Some(cp) = self.checkpoints.take() {
            return Ok(cp);
        }
        match self.context.settings.app.checkpoint_path.clone() {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using SQLite checkpoints");
                Ok(Arc::new(SqliteCheckpointStore::open(&path).await?))
            }
            None => Ok(Arc::new(InMemoryCheckpointStore::new())),
        }
    }

    pub async fn build(mut self) -> Result<Orchestrator, SupervisorError> {
        let checkpoints = self.resolve_checkpoints().await?;
        let settings = &self.context.settings;
        let llm = self.context.llm.clone();

        let workers = match self.workers.take() {
            Some(workers) => workers,
            None => {
                let fallback = Arc::new(InMemoryStore::new());
                let tasks: Arc<dyn TaskStore> = match self.tasks.take() {
                    Some(s) => s,
                    None => fallback.clone(),
                };
                let schedules: Arc<dyn ScheduleStore> = match self.schedules.take() {
                    Some(s) => s,
                    None => fallback.clone(),
                };
                let notes: Arc<dyn NoteStore> = match self.notes.take() {
                    Some(s) => s,
                    None => fallback,
                };
                WorkerRegistry::standard(
                    llm.clone(),
                    tasks,
                    schedules,
                    notes,
                    settings.tools.tool_timeout_secs,
                    settings.supervisor.worker_max_iterations,
                )
            }
        };

        Ok(Orchestrator::new(
            llm,
            workers,
            checkpoints,
            settings.supervisor.step_budget,
            settings.supervisor.short_message_chars,
            settings.app.max_context_turns,
        ))
    }
}
