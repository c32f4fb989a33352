//! 错误恢复引擎
//!
//! 根据 SupervisorError 与出错节点返回 RecoveryAction：子 Agent 出错记为失败步骤继续执行，
//! 其余到达编排层的错误终止本轮并给出固定的降级回复。

use crate::core::orchestrator::Node;
use crate::core::{RecoveryAction, SupervisorError};
use crate::supervisor::prompts::{general_error_message, LLM_UNAVAILABLE_MESSAGE, STEP_BUDGET_MESSAGE};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 终止本轮时展示给用户的文本
    pub fn user_message(&self, err: &SupervisorError) -> String {
        match err {
            SupervisorError::CompletionUnavailable(_) => LLM_UNAVAILABLE_MESSAGE.to_string(),
            SupervisorError::StepBudgetExceeded { .. } => STEP_BUDGET_MESSAGE.to_string(),
            other => general_error_message(&other.to_string()),
        }
    }

    pub fn handle(&self, err: &SupervisorError, node: &Node) -> RecoveryAction {
        if err.is_fatal() {
            return RecoveryAction::Abort(self.user_message(err));
        }
        match node {
            Node::Dispatch(_) => RecoveryAction::RecordStepFailure(format!("子任务执行失败: {}", err)),
            _ => RecoveryAction::Abort(self.user_message(err)),
        }
    }
}
