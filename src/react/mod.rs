//! 执行层：领域子 Agent 与共用的有界工具调用循环

pub mod loop_;
pub mod worker;

pub use worker::{Worker, WorkerAgent, WorkerRegistry, WorkerRun};
