//! Router：根据 plan 与 current_step 派发下一步，或进入汇总

use serde_json::Value;

use crate::core::{AgentKind, OrchestratorState};
use crate::memory::Message;

/// 路由结果（闭合枚举，未知 Agent 在此处已折叠为 Aggregate）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Dispatch(AgentKind),
    Aggregate,
}

/// 派发给子 Agent 的指令文本：步骤描述；描述为空时退回用户原始输入
pub fn instruction_text(description: &str, user_text: &str) -> String {
    if description.trim().is_empty() {
        user_text.to_string()
    } else {
        description.to_string()
    }
}

pub fn route(state: &mut OrchestratorState) -> RouteDecision {
    let Some(step) = state.current_plan_step().cloned() else {
        tracing::info!(
            current_step = state.current_step,
            total = state.step_count(),
            "all steps done, aggregating"
        );
        return finish(state);
    };

    let Some(kind) = step.kind() else {
        tracing::warn!(agent = %step.agent, step = state.current_step, "unknown agent in plan, aggregating");
        return finish(state);
    };

    let user_text = state.user_text().to_string();
    let instruction = instruction_text(&step.description, &user_text);

    state.agent_context.clear();
    state
        .agent_context
        .insert("action".into(), Value::String(step.action.clone()));
    state
        .agent_context
        .insert("params".into(), Value::Object(step.params.clone()));
    state
        .agent_context
        .insert("description".into(), Value::String(step.description.clone()));
    state
        .agent_context
        .insert("user_message".into(), Value::String(user_text));

    state.messages.push(Message::user(instruction).with_name("supervisor"));
    state.selected_agent = Some(kind);
    state.is_planning = false;
    state.is_executing = true;
    state.is_aggregating = false;
    state.should_continue = true;

    tracing::info!(step = state.current_step, agent = %kind, "dispatch");
    RouteDecision::Dispatch(kind)
}

fn finish(state: &mut OrchestratorState) -> RouteDecision {
    state.selected_agent = None;
    state.agent_context.clear();
    state.is_planning = false;
    state.is_executing = false;
    state.is_aggregating = true;
    state.should_continue = false;
    RouteDecision::Aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutionPlan, ExecutionStep};
    use serde_json::{json, Map};

    fn step(agent: &str, description: &str) -> ExecutionStep {
        ExecutionStep {
            agent: agent.into(),
            action: "create".into(),
            params: json!({"title": "买菜"}).as_object().cloned().unwrap_or_default(),
            description: description.into(),
        }
    }

    fn state_with(steps: Vec<ExecutionStep>) -> OrchestratorState {
        let mut state = OrchestratorState::next_turn(None, "添加任务：买菜", Some(1), 20);
        state.plan = Some(ExecutionPlan {
            summary: "s".into(),
            steps,
        });
        state
    }

    #[test]
    fn test_dispatch_sets_context_and_instruction() {
        let mut state = state_with(vec![step("task", "创建任务：买菜")]);
        assert_eq!(route(&mut state), RouteDecision::Dispatch(AgentKind::Task));
        assert_eq!(state.selected_agent, Some(AgentKind::Task));
        assert!(state.should_continue && state.is_executing);
        assert_eq!(state.agent_context["action"], "create");
        assert_eq!(state.agent_context["params"], json!({"title": "买菜"}));
        assert_eq!(state.agent_context["user_message"], "添加任务：买菜");

        let last = state.messages.last().unwrap();
        assert_eq!(last.name.as_deref(), Some("supervisor"));
        assert_eq!(last.content, "创建任务：买菜");
    }

    #[test]
    fn test_completion_signals() {
        let mut state = OrchestratorState::next_turn(None, "x", None, 20);
        assert_eq!(route(&mut state), RouteDecision::Aggregate);
        assert!(state.is_aggregating && !state.should_continue);

        let mut state = state_with(vec![]);
        assert_eq!(route(&mut state), RouteDecision::Aggregate);

        let mut state = state_with(vec![step("task", "d")]);
        state.current_step = 1;
        let before = state.messages.len();
        assert_eq!(route(&mut state), RouteDecision::Aggregate);
        assert_eq!(state.messages.len(), before);
        assert!(state.selected_agent.is_none());
    }

    #[test]
    fn test_unknown_agent_aggregates() {
        let mut state = state_with(vec![step("email", "发邮件")]);
        assert_eq!(route(&mut state), RouteDecision::Aggregate);
        assert_eq!(state.agent_context, Map::new());
    }

    #[test]
    fn test_empty_description_uses_user_text() {
        assert_eq!(instruction_text("  ", "查看任务"), "查看任务");
        assert_eq!(instruction_text("查询全部任务", "查看任务"), "查询全部任务");
    }
}
