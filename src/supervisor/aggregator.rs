//! 汇总：计划摘要 + 各步结果 -> 一条面向用户的最终回复（终止节点）

use std::sync::Arc;

use crate::core::{ExecutionPlan, ExecutionResult, OrchestratorState, SupervisorError};
use crate::llm::LlmClient;
use crate::memory::Message;

use super::events::EventSender;
use super::prompts::{aggregate_request, AGGREGATE_NODE_PROMPT};
use super::responder::generate_reply;

/// 渲染执行摘要；失败步骤以 ✗ 标出，不会被隐藏
pub fn render_summary(plan: Option<&ExecutionPlan>, results: &[ExecutionResult]) -> String {
    let mut parts = Vec::new();
    if let Some(plan) = plan {
        parts.push(format!("执行计划：{}", plan.summary));
    }
    if !results.is_empty() {
        parts.push("\n执行结果：".to_string());
        for r in results {
            let status = if r.success { "✓" } else { "✗" };
            parts.push(format!("{} [{}] {}", status, r.agent, r.result));
        }
    }
    parts.join("\n")
}

pub struct Aggregator {
    llm: Arc<dyn LlmClient>,
}

impl Aggregator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 成功时恰好追加一条 assistant 消息；失败时不追加（由上层写入降级回复）
    pub async fn aggregate(
        &self,
        state: &mut OrchestratorState,
        events: Option<&EventSender>,
    ) -> Result<(), SupervisorError> {
        let summary = render_summary(state.plan.as_ref(), &state.execution_results);
        let messages = vec![
            Message::system(AGGREGATE_NODE_PROMPT),
            Message::user(aggregate_request(state.user_text(), &summary)),
        ];

        let reply = generate_reply(self.llm.as_ref(), &messages, events).await?;
        state.messages.push(Message::assistant(reply));
        state.is_aggregating = false;
        state.should_continue = false;
        Ok(())
    }
}
