//! 子 Agent：一个参数化的 WorkerAgent（领域 + 工具执行器 + 提示词模板），三个领域各一实例
//!
//! Supervisor 只通过 Worker trait 派发，测试中可替换为脚本化实现。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentKind, SupervisorError};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::store::{NoteStore, ScheduleStore, TaskStore, UserId};
use crate::supervisor::events::EventSender;
use crate::supervisor::prompts::{render_worker_prompt, worker_template};
use crate::tools::{note_tools, schedule_tools, task_tools, ToolExecutor, ToolRegistry};

use super::loop_::tool_calling_loop;

/// 一次子 Agent 调用的产出
#[derive(Debug, Clone, Default)]
pub struct WorkerRun {
    /// 本次新产生的 assistant / tool 消息（按时间顺序）
    pub messages: Vec<Message>,
    /// 所有工具调用均成功，且未触达迭代上限
    pub tools_ok: bool,
    pub iterations: usize,
    pub hit_limit: bool,
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// tail 为派发指令之前的对话（不含其它 Agent 的工具轨迹）
    async fn run(
        &self,
        instruction: &str,
        user_id: UserId,
        tail: &[Message],
        events: Option<&EventSender>,
    ) -> Result<WorkerRun, SupervisorError>;
}

pub struct WorkerAgent {
    kind: AgentKind,
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    system_prompt: String,
    max_iterations: usize,
}

impl WorkerAgent {
    /// 使用领域默认提示词模板
    pub fn new(
        kind: AgentKind,
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        tool_timeout_secs: u64,
        max_iterations: usize,
    ) -> Self {
        Self::with_template(
            kind,
            llm,
            tools,
            worker_template(kind),
            tool_timeout_secs,
            max_iterations,
        )
    }

    pub fn with_template(
        kind: AgentKind,
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        template: &str,
        tool_timeout_secs: u64,
        max_iterations: usize,
    ) -> Self {
        let system_prompt = render_worker_prompt(template, &tools.tools_list());
        let executor = ToolExecutor::new(tools, tool_timeout_secs).with_agent(kind.agent_name());
        Self {
            kind,
            llm,
            executor,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

#[async_trait]
impl Worker for WorkerAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(
        &self,
        instruction: &str,
        user_id: UserId,
        tail: &[Message],
        events: Option<&EventSender>,
    ) -> Result<WorkerRun, SupervisorError> {
        tracing::info!(agent = %self.kind.agent_name(), "worker start");
        let run = tool_calling_loop(self, instruction, user_id, tail, events).await?;
        tracing::info!(
            agent = %self.kind.agent_name(),
            iterations = run.iterations,
            tools_ok = run.tools_ok,
            "worker done"
        );
        Ok(run)
    }
}

/// 领域 -> 子 Agent
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<AgentKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 三个领域的标准子 Agent，共享同一个 LLM 客户端
    pub fn standard(
        llm: Arc<dyn LlmClient>,
        tasks: Arc<dyn TaskStore>,
        schedules: Arc<dyn ScheduleStore>,
        notes: Arc<dyn NoteStore>,
        tool_timeout_secs: u64,
        max_iterations: usize,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WorkerAgent::new(
            AgentKind::Task,
            llm.clone(),
            task_tools(tasks),
            tool_timeout_secs,
            max_iterations,
        )));
        registry.register(Arc::new(WorkerAgent::new(
            AgentKind::Schedule,
            llm.clone(),
            schedule_tools(schedules),
            tool_timeout_secs,
            max_iterations,
        )));
        registry.register(Arc::new(WorkerAgent::new(
            AgentKind::Note,
            llm,
            note_tools(notes),
            tool_timeout_secs,
            max_iterations,
        )));
        registry
    }

    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.kind(), worker);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn Worker>> {
        self.workers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
