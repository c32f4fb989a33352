//! 核心编排层：状态与计划类型、错误与恢复、Supervisor 状态机、构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use builder::{create_llm_from_config, SupervisorBuilder, SupervisorContext};
pub use error::{RecoveryAction, SupervisorError};
pub use orchestrator::{Node, Orchestrator, TurnOutcome, TurnStatus};
pub use recovery::RecoveryEngine;
pub use state::{
    AgentKind, ExecutionPlan, ExecutionResult, ExecutionStep, OrchestratorState,
    FALLBACK_PLAN_SUMMARY, FALLBACK_STEP_DESCRIPTION,
};
