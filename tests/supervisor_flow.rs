//! Supervisor 端到端集成测试：脚本化 LLM + 内存存储驱动完整的一轮对话

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use steward::config::AppConfig;
    use steward::core::{
        AgentKind, ExecutionPlan, Orchestrator, SupervisorBuilder, SupervisorContext, TurnStatus,
    };
    use steward::llm::{LlmError, MockLlmClient};
    use steward::memory::Role;
    use steward::store::{
        InMemoryCheckpointStore, InMemoryStore, ScheduleStore, SqliteCheckpointStore, TaskStore,
    };
    use steward::supervisor::prompts::{LLM_UNAVAILABLE_MESSAGE, STEP_BUDGET_MESSAGE};
    use steward::supervisor::SupervisorEvent;
    use tokio::sync::mpsc;

    const NEEDS_DATA: &str = r#"{"needs_business_data": true, "reason": "明确涉及数据操作"}"#;
    const USER: Option<i64> = Some(1);

    struct Harness {
        llm: Arc<MockLlmClient>,
        store: Arc<InMemoryStore>,
        orchestrator: Orchestrator,
    }

    async fn harness_with(llm: MockLlmClient, cfg: AppConfig) -> Harness {
        let llm = Arc::new(llm);
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = SupervisorBuilder::new(SupervisorContext::new(llm.clone(), cfg))
            .with_store(store.clone())
            .with_checkpoints(Arc::new(InMemoryCheckpointStore::new()))
            .build()
            .await
            .unwrap();
        Harness {
            llm,
            store,
            orchestrator,
        }
    }

    async fn harness(llm: MockLlmClient) -> Harness {
        harness_with(llm, AppConfig::default()).await
    }

    fn plan_json(steps: serde_json::Value) -> String {
        json!({"summary": "测试计划", "steps": steps}).to_string()
    }

    #[tokio::test]
    async fn test_greeting_gets_simple_reply() {
        let h = harness(MockLlmClient::new().with_text("你好！我可以帮你管理任务、日程和笔记。")).await;
        let outcome = h.orchestrator.handle_turn("t1", "hi", USER).await;

        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.reply, "你好！我可以帮你管理任务、日程和笔记。");
        assert!(outcome.state.plan.is_none());
        assert!(outcome.state.execution_results.is_empty());
        assert_eq!(outcome.state.needs_business_data, Some(false));
        // 问候不调用分类 LLM，只有一次闲聊回复
        assert_eq!(h.llm.request_count(), 1);
        assert!(h.llm.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_add_task_full_flow() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(format!(
                "```json\n{}\n```",
                plan_json(json!([{
                    "agent": "task",
                    "action": "create",
                    "params": {"title": "买菜"},
                    "description": "创建任务：买菜"
                }]))
            ))
            .with_tool_calls(vec![("create_task", json!({"title": "买菜"}))])
            .with_text("已成功创建任务「买菜」")
            .with_text("好的，已为您添加任务：买菜。");
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "添加任务：买菜", USER).await;
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.reply, "好的，已为您添加任务：买菜。");

        let tasks = h.store.list_tasks(USER).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "买菜");

        let state = &outcome.state;
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.steps[0].params["title"], "买菜");
        assert_eq!(state.current_step, 1);
        assert_eq!(state.execution_results.len(), 1);
        let r = &state.execution_results[0];
        assert_eq!(r.agent, AgentKind::Task);
        assert!(r.success && r.tools_ok);
        assert_eq!(r.result, "已成功创建任务「买菜」");

        let requests = h.llm.requests();
        assert_eq!(requests.len(), 5);
        assert!(requests[2].tools.contains(&"create_task".to_string()));
        assert!(requests[4].messages[1].content.contains("✓ [task] 已成功创建任务「买菜」"));

        // 本轮恰好一条面向用户的 assistant 回复
        let replies = state
            .turn_messages()
            .iter()
            .filter(|m| m.role == Role::Assistant && m.is_dialogue())
            .count();
        assert_eq!(replies, 1);
    }

    #[tokio::test]
    async fn test_garbage_plan_uses_fallback() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text("Sure! Here is what I would do: look at the tasks.")
            .with_text("没有找到任务。")
            .with_text("您目前还没有任务。");
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "帮我看看今天有哪些需要处理的事情", USER).await;
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.state.plan, Some(ExecutionPlan::fallback()));
        assert_eq!(outcome.state.execution_results.len(), 1);
        assert_eq!(outcome.state.execution_results[0].agent, AgentKind::Task);
        assert!(outcome.state.execution_results[0].success);
        assert_eq!(outcome.reply, "您目前还没有任务。");
    }

    #[tokio::test]
    async fn test_two_step_plan_runs_in_order() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(plan_json(json!([
                {"agent": "task", "action": "create", "params": {"title": "准备周会材料"}, "description": "创建任务：准备周会材料"},
                {"agent": "schedule", "action": "create", "params": {"title": "周会"}, "description": "创建日程：明天上午9点周会"}
            ])))
            .with_tool_calls(vec![("create_task", json!({"title": "准备周会材料"}))])
            .with_text("任务已创建")
            .with_tool_calls(vec![(
                "create_schedule",
                json!({
                    "title": "周会",
                    "start_time": "2024-01-02T09:00:00+08:00",
                    "end_time": "2024-01-02T10:00:00+08:00"
                }),
            )])
            .with_text("日程已创建")
            .with_text("已创建任务并安排周会。");
        let h = harness(llm).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = h
            .orchestrator
            .handle_turn_stream("t1", "创建任务准备周会材料，并安排明天9点周会", USER, tx)
            .await;
        assert_eq!(outcome.status, TurnStatus::Completed);

        let mut dispatched = Vec::new();
        let mut recorded = Vec::new();
        let mut frontend = Vec::new();
        let mut streamed = String::new();
        while let Ok(ev) = rx.try_recv() {
            match ev {
                SupervisorEvent::StepDispatched { step, agent, .. } => dispatched.push((step, agent)),
                SupervisorEvent::StepRecorded { step, success, .. } => recorded.push((step, success)),
                SupervisorEvent::FrontendTool { action } => frontend.push(action),
                SupervisorEvent::MessageChunk { text } => streamed.push_str(&text),
                _ => {}
            }
        }
        assert_eq!(
            dispatched,
            vec![(0, "task".to_string()), (1, "schedule".to_string())]
        );
        assert_eq!(recorded, vec![(0, true), (1, true)]);
        assert_eq!(frontend, vec!["refresh_schedule_list".to_string()]);
        assert_eq!(streamed, "已创建任务并安排周会。");

        assert_eq!(outcome.state.current_step, 2);
        assert_eq!(h.store.list_tasks(USER).await.unwrap().len(), 1);
        assert_eq!(h.store.list_schedules(USER).await.unwrap().len(), 1);

        // 日程 Agent 看不到任务 Agent 的工具轨迹，但能看到其最终回复
        let requests = h.llm.requests();
        let schedule_request = &requests[4];
        assert!(schedule_request.tools.contains(&"create_schedule".to_string()));
        assert!(schedule_request.messages.iter().all(|m| m.role != Role::Tool));
        assert!(schedule_request.messages.iter().any(|m| m.content == "任务已创建"));
        assert_eq!(
            schedule_request.messages.last().unwrap().content,
            "创建日程：明天上午9点周会"
        );
    }

    #[tokio::test]
    async fn test_step_budget_exhaustion() {
        let mut cfg = AppConfig::default();
        cfg.supervisor.step_budget = 3;
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(plan_json(json!([
                {"agent": "task", "action": "query", "params": {}, "description": "查询任务"}
            ])));
        let h = harness_with(llm, cfg).await;

        let outcome = h.orchestrator.handle_turn("t1", "查看我的任务", USER).await;
        assert_eq!(outcome.status, TurnStatus::Aborted);
        assert_eq!(outcome.reply, STEP_BUDGET_MESSAGE);
        assert!(outcome.state.execution_results.is_empty());
        assert_eq!(h.llm.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_llm_degrades_immediately() {
        let h = harness(MockLlmClient::unavailable()).await;
        let outcome = h.orchestrator.handle_turn("t1", "添加任务：买菜", USER).await;

        assert_eq!(outcome.status, TurnStatus::Aborted);
        assert_eq!(outcome.reply, LLM_UNAVAILABLE_MESSAGE);
        assert!(outcome.state.plan.is_none());
        assert_eq!(h.llm.request_count(), 0);
        assert!(h.store.list_tasks(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outage_mid_turn_aborts_without_plan() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_error(LlmError::Unavailable("401 Unauthorized".into()));
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "添加任务：买菜", USER).await;
        assert_eq!(outcome.status, TurnStatus::Aborted);
        assert_eq!(outcome.reply, LLM_UNAVAILABLE_MESSAGE);
        assert!(outcome.state.plan.is_none());
    }

    #[tokio::test]
    async fn test_worker_failure_is_surfaced_in_summary() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(plan_json(json!([
                {"agent": "task", "action": "create", "params": {"title": ""}, "description": "创建一个空标题任务"}
            ])))
            .with_tool_calls(vec![("create_task", json!({"title": "   "}))])
            .with_text("任务创建失败：标题不能为空")
            .with_text("抱歉，任务没有创建成功，请提供任务标题。");
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "帮我创建一个任务", USER).await;
        assert_eq!(outcome.status, TurnStatus::Completed);
        let r = &outcome.state.execution_results[0];
        assert!(!r.success);
        assert!(!r.tools_ok);
        assert_eq!(r.error.as_deref(), Some("任务创建失败：标题不能为空"));

        let aggregate_request = h.llm.requests().pop().unwrap();
        assert!(aggregate_request.messages[1]
            .content
            .contains("✗ [task] 任务创建失败：标题不能为空"));
        assert_eq!(outcome.reply, "抱歉，任务没有创建成功，请提供任务标题。");
    }

    #[tokio::test]
    async fn test_worker_llm_error_records_failed_step_and_continues() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(plan_json(json!([
                {"agent": "note", "action": "query", "params": {}, "description": "查询笔记"},
                {"agent": "task", "action": "query", "params": {}, "description": "查询任务"}
            ])))
            .with_error(LlmError::Api {
                status: Some(500),
                message: "internal".into(),
            })
            .with_text("没有找到任务。")
            .with_text("笔记查询失败，任务列表为空。");
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "查看笔记和任务", USER).await;
        assert_eq!(outcome.status, TurnStatus::Completed);
        let results = &outcome.state.execution_results;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].result.starts_with("子任务执行失败"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn test_unknown_agent_goes_to_aggregate() {
        let llm = MockLlmClient::new()
            .with_text(NEEDS_DATA)
            .with_text(plan_json(json!([
                {"agent": "email", "action": "send", "params": {}, "description": "发送邮件"}
            ])))
            .with_text("暂不支持发送邮件。");
        let h = harness(llm).await;

        let outcome = h.orchestrator.handle_turn("t1", "给老板发邮件说明任务进度", USER).await;
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert!(outcome.state.execution_results.is_empty());
        assert_eq!(outcome.reply, "暂不支持发送邮件。");
        assert_eq!(h.llm.request_count(), 3);
    }

    #[tokio::test]
    async fn test_history_carries_across_turns_per_thread() {
        let llm = MockLlmClient::new()
            .with_text("你好！")
            .with_text("不客气！")
            .with_text("你好，新朋友！");
        let h = harness(llm).await;

        h.orchestrator.handle_turn("t1", "hi", USER).await;
        let second = h.orchestrator.handle_turn("t1", "谢谢", USER).await;
        assert_eq!(second.state.turn_start, 2);
        assert_eq!(second.state.history()[1].content, "你好！");

        let requests = h.llm.requests();
        let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"hi"));
        assert!(contents.contains(&"你好！"));

        let other = h.orchestrator.handle_turn("t2", "hello", USER).await;
        assert_eq!(other.state.turn_start, 0);
    }

    #[tokio::test]
    async fn test_sqlite_checkpoint_survives_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let llm = Arc::new(MockLlmClient::new().with_text("你好！"));
            let orch = SupervisorBuilder::new(SupervisorContext::new(llm, AppConfig::default()))
                .with_checkpoints(Arc::new(SqliteCheckpointStore::open(&path).await.unwrap()))
                .build()
                .await
                .unwrap();
            orch.handle_turn("thread-a", "hi", USER).await;
        }

        let llm = Arc::new(MockLlmClient::new().with_text("再见！"));
        let orch = SupervisorBuilder::new(SupervisorContext::new(llm, AppConfig::default()))
            .with_checkpoints(Arc::new(SqliteCheckpointStore::open(&path).await.unwrap()))
            .build()
            .await
            .unwrap();
        let outcome = orch.handle_turn("thread-a", "再见", USER).await;
        assert_eq!(outcome.state.history().len(), 2);
        assert_eq!(outcome.reply, "再见！");
    }
}
