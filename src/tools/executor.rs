//! 工具执行器
//!
//! 持有 ToolRegistry 与超时，execute(tool_name, args, ctx) 在超时内调用工具，
//! 未知工具 / 超时 / 失败时转为 SupervisorError；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::SupervisorError;
use crate::llm::ToolSpec;
use crate::tools::{ToolContext, ToolRegistry};

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    /// 审计日志中的调用方（如 task_agent）
    agent: String,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            agent: String::new(),
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// 执行指定工具；未知工具返回 UnknownTool，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, SupervisorError> {
        let Some(tool) = self.registry.get(tool_name) else {
            self.audit(tool_name, false, "unknown_tool", 0, &args);
            return Err(SupervisorError::UnknownTool(tool_name.to_string()));
        };

        let start = Instant::now();
        let preview_args = args.clone();
        let result = timeout(self.timeout, tool.execute(args, ctx)).await;

        let (ok, outcome) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        self.audit(
            tool_name,
            ok,
            outcome,
            start.elapsed().as_millis() as u64,
            &preview_args,
        );

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(SupervisorError::ToolExecutionFailed(e)),
            Err(_) => Err(SupervisorError::ToolTimeout(tool_name.to_string())),
        }
    }

    fn audit(&self, tool_name: &str, ok: bool, outcome: &str, duration_ms: u64, args: &Value) {
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "agent": self.agent,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry.tool_specs()
    }

    pub fn tools_list(&self) -> String {
        self.registry.tools_list()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("done".into())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
            Err("boom".into())
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Slow);
        registry.register(Failing);
        ToolExecutor::new(registry, timeout_secs).with_agent("task_agent")
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = executor(1)
            .execute("slow", Value::Null, &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::ToolTimeout(name) if name == "slow"));
    }

    #[tokio::test]
    async fn test_failure_and_unknown_tool() {
        let exec = executor(5);
        let err = exec
            .execute("failing", Value::Null, &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::ToolExecutionFailed(msg) if msg == "boom"));

        let err = exec
            .execute("nope", Value::Null, &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownTool(_)));
    }

    #[test]
    fn test_args_preview_truncates_on_char_boundary() {
        let long = Value::String("任".repeat(300));
        let preview = args_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }
}
