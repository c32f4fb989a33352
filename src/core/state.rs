//! 编排状态：单轮内贯穿所有节点的 OrchestratorState 与计划 / 结果类型
//!
//! 状态在一轮内只被当前活跃节点修改；轮末整体写入 checkpoint，下一轮从中恢复对话历史。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::memory::{ConversationMemory, Message};
use crate::store::UserId;

/// 子 Agent 类型（固定三种）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Task,
    Schedule,
    Note,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Task, AgentKind::Schedule, AgentKind::Note];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Task => "task",
            AgentKind::Schedule => "schedule",
            AgentKind::Note => "note",
        }
    }

    /// 大小写不敏感；无法识别返回 None（由路由决定如何处理）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "task" => Some(AgentKind::Task),
            "schedule" => Some(AgentKind::Schedule),
            "note" => Some(AgentKind::Note),
            _ => None,
        }
    }

    /// 子 Agent 在消息轨迹中的署名
    pub fn agent_name(&self) -> String {
        format!("{}_agent", self.as_str())
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段缺失或显式为 null 时都取默认值（模型常输出 `"params": null`）
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 计划中的一步；agent 保留模型给出的原始字符串，未知值在路由时处理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub agent: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

impl ExecutionStep {
    pub fn kind(&self) -> Option<AgentKind> {
        AgentKind::parse(&self.agent)
    }
}

/// 执行计划：每轮由 Planner 生成一次，之后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<ExecutionStep>,
}

pub const FALLBACK_PLAN_SUMMARY: &str = "无法解析计划，使用默认处理";
pub const FALLBACK_STEP_DESCRIPTION: &str = "处理用户请求";

impl ExecutionPlan {
    /// 计划无法解析时使用的固定单步计划：交给任务 Agent 查询
    pub fn fallback() -> Self {
        Self {
            summary: FALLBACK_PLAN_SUMMARY.to_string(),
            steps: vec![ExecutionStep {
                agent: AgentKind::Task.as_str().to_string(),
                action: "query".to_string(),
                params: Map::new(),
                description: FALLBACK_STEP_DESCRIPTION.to_string(),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 单步执行结果；每个完成的步骤追加一次，之后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_index: usize,
    pub agent: AgentKind,
    pub success: bool,
    pub result: String,
    pub error: Option<String>,
    /// 子 Agent 的全部工具调用均返回成功且未触达迭代上限（仅用于日志与测试）
    #[serde(default = "default_true")]
    pub tools_ok: bool,
}

fn default_true() -> bool {
    true
}

/// 一轮内的完整编排状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorState {
    /// 对话日志（本轮只追加）
    pub messages: Vec<Message>,
    pub user_id: UserId,
    pub plan: Option<ExecutionPlan>,
    pub current_step: usize,
    pub execution_results: Vec<ExecutionResult>,
    /// 仅在 Route → Worker → Execute 子循环中非空
    pub selected_agent: Option<AgentKind>,
    /// 派发给子 Agent 的上下文：action / params / description / user_message
    #[serde(default)]
    pub agent_context: Map<String, Value>,
    pub needs_business_data: Option<bool>,
    #[serde(default)]
    pub is_planning: bool,
    #[serde(default)]
    pub is_executing: bool,
    #[serde(default)]
    pub is_aggregating: bool,
    #[serde(default)]
    pub should_continue: bool,
    /// 本轮用户消息在 messages 中的下标；之前的消息属于历史轮次
    #[serde(default)]
    pub turn_start: usize,
}

impl OrchestratorState {
    /// 新一轮：从上一轮状态中保留最近 max_turns 轮对话，追加本轮用户消息，其余字段重置
    pub fn next_turn(
        previous: Option<&OrchestratorState>,
        user_text: &str,
        user_id: UserId,
        max_turns: usize,
    ) -> Self {
        let history = previous
            .map(|p| ConversationMemory::from_log(&p.messages, max_turns).into_messages())
            .unwrap_or_default();
        let turn_start = history.len();
        let mut messages = history;
        messages.push(Message::user(user_text));
        Self {
            messages,
            user_id,
            turn_start,
            ..Default::default()
        }
    }

    /// 本轮用户原始输入
    pub fn user_text(&self) -> &str {
        self.messages
            .get(self.turn_start)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// 本轮之前的对话历史
    pub fn history(&self) -> &[Message] {
        &self.messages[..self.turn_start.min(self.messages.len())]
    }

    /// 本轮产生的全部消息（含用户输入）
    pub fn turn_messages(&self) -> &[Message] {
        &self.messages[self.turn_start.min(self.messages.len())..]
    }

    /// 本轮最终回复（最后一条对话类 assistant 消息）
    pub fn final_reply(&self) -> Option<&str> {
        self.turn_messages()
            .iter()
            .rev()
            .find(|m| m.is_dialogue() && m.role == crate::memory::Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn step_count(&self) -> usize {
        self.plan.as_ref().map(|p| p.steps.len()).unwrap_or(0)
    }

    pub fn current_plan_step(&self) -> Option<&ExecutionStep> {
        self.plan.as_ref().and_then(|p| p.steps.get(self.current_step))
    }
}
