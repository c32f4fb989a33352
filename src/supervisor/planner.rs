//! Planner：用户请求 -> ExecutionPlan
//!
//! 解析失败时不报错，统一退回固定的单步计划（task / query），保证后续流程总有计划可执行。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use thiserror::Error;

use crate::core::{ExecutionPlan, OrchestratorState, SupervisorError};
use crate::llm::LlmClient;
use crate::memory::Message;

use super::prompts::{plan_request, PLAN_NODE_PROMPT};

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("empty planner output")]
    Empty,
    #[error("invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 去掉 Markdown 代码块包裹（```json ... ``` 或 ``` ... ```）
pub fn strip_code_fences(text: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").ok());
    match fence.as_ref().and_then(|re| re.captures(text)).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// 截取首个 `{` 到最后一个 `}`，用于模型在 JSON 前后附带说明文字的情况
pub(crate) fn json_object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析计划 JSON；steps 原样保留模型给出的顺序与字段
pub fn parse_plan(text: &str) -> Result<ExecutionPlan, PlanParseError> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err(PlanParseError::Empty);
    }
    match serde_json::from_str::<ExecutionPlan>(body) {
        Ok(plan) => Ok(plan),
        Err(e) => match json_object_slice(body) {
            Some(slice) if slice.len() < body.len() => Ok(serde_json::from_str(slice)?),
            _ => Err(e.into()),
        },
    }
}

/// 生成的计划与是否使用了兜底计划
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plan: ExecutionPlan,
    pub fallback: bool,
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 仅 Completion Service 不可用时返回错误；其余失败均退回兜底计划
    pub async fn plan(&self, state: &OrchestratorState) -> Result<PlanOutcome, SupervisorError> {
        let mut messages = vec![Message::system(PLAN_NODE_PROMPT)];
        messages.extend(state.history().iter().filter(|m| m.is_dialogue()).cloned());
        messages.push(Message::user(plan_request(state.user_text())));

        let text = match self.llm.complete(&messages).await {
            Ok(text) => text,
            Err(e) if e.is_unavailable() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("planner completion failed, using fallback plan: {}", e);
                return Ok(PlanOutcome {
                    plan: ExecutionPlan::fallback(),
                    fallback: true,
                });
            }
        };
        tracing::debug!(raw = %text, "planner output");

        match parse_plan(&text) {
            Ok(plan) => {
                tracing::info!(summary = %plan.summary, steps = plan.steps.len(), "plan ready");
                Ok(PlanOutcome {
                    plan,
                    fallback: false,
                })
            }
            Err(e) => {
                tracing::warn!("计划解析失败: {}, 使用默认计划", e);
                Ok(PlanOutcome {
                    plan: ExecutionPlan::fallback(),
                    fallback: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_plan_keeps_steps_verbatim() {
        let raw = json!({
            "summary": "创建任务并安排日程",
            "steps": [
                {"agent": "task", "action": "create", "params": {"title": "买菜"}, "description": "创建任务：买菜"},
                {"agent": "schedule", "action": "create", "params": {"title": "周会", "day": 2}, "description": "安排周会"}
            ]
        });
        let plan = parse_plan(&format!("```json\n{}\n```", raw)).unwrap();
        assert_eq!(plan.summary, "创建任务并安排日程");
        assert_eq!(serde_json::to_value(&plan.steps).unwrap(), raw["steps"]);
    }

    #[test]
    fn test_parse_plan_with_surrounding_text() {
        let plan = parse_plan("好的，计划如下：{\"summary\":\"s\",\"steps\":[]} 请执行").unwrap();
        assert_eq!(plan.summary, "s");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_parse_plan_accepts_null_fields() {
        let plan = parse_plan(
            r#"{"summary":"查询任务","steps":[{"agent":"task","action":"query","params":null,"description":"查询全部任务"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.steps[0].params.is_empty());
        assert_eq!(plan.steps[0].description, "查询全部任务");

        let plan = parse_plan(r#"{"summary":"无需操作","steps":null}"#).unwrap();
        assert_eq!(plan.summary, "无需操作");
        assert!(plan.is_empty());

        let plan = parse_plan(
            r#"{"summary":null,"steps":[{"agent":"note","action":null,"params":{},"description":null}]}"#,
        )
        .unwrap();
        assert_eq!(plan.summary, "");
        assert_eq!(plan.steps[0].agent, "note");
        assert_eq!(plan.steps[0].action, "");
        assert_eq!(plan.steps[0].description, "");
    }

    #[tokio::test]
    async fn test_null_steps_is_not_fallback() {
        let llm = Arc::new(MockLlmClient::new().with_text("{\"summary\":\"闲聊\",\"steps\":null}"));
        let planner = Planner::new(llm);
        let state = OrchestratorState::next_turn(None, "随便聊聊我的安排", None, 20);
        let outcome = planner.plan(&state).await.unwrap();
        assert!(!outcome.fallback);
        assert!(outcome.plan.is_empty());
    }

    #[test]
    fn test_parse_plan_errors() {
        assert!(matches!(parse_plan("   "), Err(PlanParseError::Empty)));
        assert!(matches!(parse_plan("I think you want a task"), Err(PlanParseError::Json(_))));
        assert!(parse_plan("{\"steps\": [{\"action\": \"create\"}]}").is_err());
    }

    #[tokio::test]
    async fn test_garbage_output_falls_back() {
        let llm = Arc::new(MockLlmClient::new().with_text("sorry, I cannot plan that"));
        let planner = Planner::new(llm);
        let state = OrchestratorState::next_turn(None, "添加任务", None, 20);
        let outcome = planner.plan(&state).await.unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.plan, ExecutionPlan::fallback());
    }

    #[tokio::test]
    async fn test_unavailable_is_error() {
        let llm = Arc::new(MockLlmClient::new().with_error(LlmError::Unavailable("401".into())));
        let planner = Planner::new(llm);
        let state = OrchestratorState::next_turn(None, "添加任务", None, 20);
        let err = planner.plan(&state).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_request_shape() {
        let llm = Arc::new(MockLlmClient::new().with_text("{\"summary\":\"s\",\"steps\":[]}"));
        let planner = Planner::new(llm.clone());
        let state = OrchestratorState::next_turn(None, "查看任务", None, 20);
        planner.plan(&state).await.unwrap();
        let requests = llm.requests();
        let req = &requests[0];
        assert_eq!(req.messages[0].content, PLAN_NODE_PROMPT);
        assert_eq!(req.messages.last().unwrap().content, plan_request("查看任务"));
        assert!(req.tools.is_empty());
    }
}
