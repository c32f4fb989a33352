//! 编排过程事件：用于流式展示节点切换、计划、子 Agent 工具调用与最终回复
//!
//! 事件只用于观察，不参与控制流；接收端关闭时静默丢弃。

use serde::Serialize;
use tokio::sync::mpsc;

/// 单个过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// 进入状态机节点
    NodeEnter { node: String },
    /// 意图分类结果
    Classified {
        needs_business_data: bool,
        reason: String,
    },
    /// 计划生成完成
    PlanReady {
        summary: String,
        steps: usize,
        fallback: bool,
    },
    /// 派发第 step 步到子 Agent
    StepDispatched {
        step: usize,
        agent: String,
        description: String,
    },
    /// 子 Agent 调用工具
    ToolCall {
        agent: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览）
    ToolResult {
        agent: String,
        tool: String,
        ok: bool,
        preview: String,
    },
    /// 工具请求前端动作（如 refresh_task_list）
    FrontendTool { action: String },
    /// 一步执行结果已记录
    StepRecorded {
        step: usize,
        agent: String,
        success: bool,
    },
    /// 最终回复的一小段（流式输出）
    MessageChunk { text: String },
    /// 最终回复结束
    MessageDone,
    /// 本轮被终止（降级回复前）
    Error { text: String },
}

pub type EventSender = mpsc::UnboundedSender<SupervisorEvent>;

pub fn emit(tx: Option<&EventSender>, ev: SupervisorEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// 预览文本：超出 max_chars 个字符时截断并加省略号
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
