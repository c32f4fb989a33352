//! 结果记录：从子 Agent 轨迹中提取结果文本，按关键词判定成败，追加 ExecutionResult 并推进游标

use crate::core::{AgentKind, ExecutionResult, OrchestratorState};
use crate::memory::{Message, Role};
use crate::react::WorkerRun;

use super::prompts::INCOMPLETE_RESULT;

/// 结果文本中出现即视为失败（英文大小写不敏感）
const FAILURE_KEYWORDS: &[&str] = &["失败", "错误", "未完成", "failed", "error", "incomplete"];

pub fn is_failure_text(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FAILURE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// 从后往前找最近一条 assistant 消息：有文本取文本；只有工具调用则取对应 id 的工具结果
pub fn extract_result_text(trace: &[Message]) -> String {
    let Some(last) = trace.iter().rev().find(|m| m.role == Role::Assistant) else {
        return INCOMPLETE_RESULT.to_string();
    };
    if !last.content.trim().is_empty() {
        return last.content.clone();
    }
    last.tool_calls
        .iter()
        .find_map(|call| {
            trace.iter().find(|m| {
                m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call.id.as_str())
            })
        })
        .map(|m| m.content.clone())
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| INCOMPLETE_RESULT.to_string())
}

pub fn record_result(state: &mut OrchestratorState, agent: AgentKind, run: &WorkerRun) -> ExecutionResult {
    let text = extract_result_text(&run.messages);
    push_result(state, agent, text, run.tools_ok)
}

/// 子 Agent 本身出错（未产生轨迹）时记录失败
pub fn record_failure(state: &mut OrchestratorState, agent: AgentKind, text: String) -> ExecutionResult {
    push_result(state, agent, text, false)
}

fn push_result(state: &mut OrchestratorState, agent: AgentKind, text: String, tools_ok: bool) -> ExecutionResult {
    let success = !is_failure_text(&text);
    let result = ExecutionResult {
        step_index: state.current_step,
        agent,
        success,
        error: (!success).then(|| text.clone()),
        result: text,
        tools_ok,
    };
    if success {
        tracing::info!(step = result.step_index, agent = %agent, tools_ok, "step recorded");
    } else {
        tracing::warn!(step = result.step_index, agent = %agent, result = %result.result, "step failed");
    }

    state.execution_results.push(result.clone());
    state.current_step += 1;
    state.selected_agent = None;
    state.agent_context.clear();
    result
}
