//! 编排错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 SupervisorError 与出错节点决定记录失败步骤继续执行，还是终止本轮并给出降级回复。

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

/// 一轮编排中可能出现的错误
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Completion Service 不可用（未配置 / 鉴权失败 / 连接失败）
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("Step budget exceeded ({budget} transitions)")]
    StepBudgetExceeded { budget: usize },

    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 检查点读写失败（编排层只记录告警，不中断本轮）
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<LlmError> for SupervisorError {
    /// 不可用类错误单独归类，便于整轮直接降级
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(msg) => SupervisorError::CompletionUnavailable(msg),
            other => SupervisorError::Llm(other),
        }
    }
}

impl SupervisorError {
    /// 是否必须立即终止本轮（其余错误可在流水线内恢复）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::CompletionUnavailable(_) | SupervisorError::StepBudgetExceeded { .. }
        )
    }
}

/// 恢复引擎给出的动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将当前步骤记为失败（附带结果文本），继续后续步骤
    RecordStepFailure(String),
    /// 终止本轮，以给定文本作为最终回复
    Abort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_llm_error_is_fatal() {
        let err: SupervisorError = LlmError::Unavailable("401".into()).into();
        assert!(matches!(err, SupervisorError::CompletionUnavailable(_)));
        assert!(err.is_fatal());

        let err: SupervisorError = LlmError::InvalidResponse("x".into()).into();
        assert!(matches!(err, SupervisorError::Llm(_)));
        assert!(!err.is_fatal());
        assert!(SupervisorError::StepBudgetExceeded { budget: 3 }.is_fatal());
    }
}
