//! Steward - 个人效率助手后端的多 Agent 编排核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态、错误与恢复、Supervisor 状态机、构建器
//! - **llm**: Completion Service 抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话消息类型与跨轮历史
//! - **observability**: tracing 日志初始化
//! - **react**: 子 Agent（任务 / 日程 / 笔记）与有界工具调用循环
//! - **store**: 领域模型、持久化接口、检查点
//! - **supervisor**: 意图分类、计划、路由、结果记录、汇总、提示词与过程事件
//! - **tools**: 工具 trait、注册表、执行器与三套业务工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod store;
pub mod supervisor;
pub mod tools;

pub use crate::core::{Orchestrator, SupervisorBuilder, SupervisorContext, TurnOutcome, TurnStatus};
