//! 任务工具：创建 / 查询 / 更新 / 删除任务，以及通知前端刷新任务列表

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{args_schema, parse_args, Tool, ToolContext, ToolRegistry};
use crate::store::{NewTask, TaskStore, TaskUpdate};

pub const REFRESH_TASK_LIST: &str = "frontend_tool_call:refresh_task_list 正在为您刷新任务列表...";

/// 任务 Agent 的完整工具集（注册顺序即 prompt 中的列表顺序）
pub fn task_tools(store: Arc<dyn TaskStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CreateTaskTool(store.clone()));
    registry.register(GetTasksTool(store.clone()));
    registry.register(GetTaskTool(store.clone()));
    registry.register(UpdateTaskTool(store.clone()));
    registry.register(DeleteTaskTool(store.clone()));
    registry.register(DeleteLatestTaskTool(store));
    registry.register(RefreshTaskListTool);
    registry
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateTaskArgs {
    /// 任务标题
    title: String,
    /// 是否已完成（默认 false）
    #[serde(default, alias = "isComplete")]
    is_complete: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TaskIdArgs {
    /// 任务 ID
    id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateTaskArgs {
    /// 任务 ID
    id: i64,
    /// 新标题
    #[serde(default)]
    title: Option<String>,
    /// 是否已完成
    #[serde(default, alias = "isComplete")]
    is_complete: Option<bool>,
}

pub struct CreateTaskTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "创建新任务"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CreateTaskArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: CreateTaskArgs = parse_args(args)?;
        let task = self
            .0
            .create_task(
                ctx.user_id,
                NewTask {
                    title: args.title,
                    is_complete: args.is_complete,
                },
            )
            .await
            .map_err(|e| format!("任务创建失败: {}", e))?;
        Ok(format!("任务创建成功: \"{}\" (ID: {})", task.title, task.id))
    }
}

pub struct GetTasksTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for GetTasksTool {
    fn name(&self) -> &str {
        "get_tasks"
    }

    fn description(&self) -> &str {
        "获取所有任务"
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
        let tasks = self
            .0
            .list_tasks(ctx.user_id)
            .await
            .map_err(|e| format!("获取任务列表失败: {}", e))?;
        if tasks.is_empty() {
            return Ok("没有找到任务。".to_string());
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| format!("- {}: {} ({})", t.id, t.title, t.status_label()))
            .collect();
        Ok(format!("找到 {} 个任务:\n{}", tasks.len(), lines.join("\n")))
    }
}

pub struct GetTaskTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for GetTaskTool {
    fn name(&self) -> &str {
        "get_task"
    }

    fn description(&self) -> &str {
        "获取指定任务"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TaskIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: TaskIdArgs = parse_args(args)?;
        let task = self
            .0
            .get_task(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("获取任务失败: {}", e))?;
        Ok(match task {
            Some(t) => format!("任务 {}: \"{}\" - {}", t.id, t.title, t.status_label()),
            None => format!("未找到 ID 为 {} 的任务。", args.id),
        })
    }
}

pub struct UpdateTaskTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "更新任务（标题或完成状态）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<UpdateTaskArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: UpdateTaskArgs = parse_args(args)?;
        let store = &self.0;
        if store
            .get_task(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("更新任务失败: {}", e))?
            .is_none()
        {
            return Ok(format!("未找到 ID 为 {} 的任务。", args.id));
        }

        let update = TaskUpdate {
            title: args.title,
            is_complete: args.is_complete,
        };
        if update.is_empty() {
            return Ok("没有提供要更新的字段。".to_string());
        }

        match store
            .update_task(ctx.user_id, args.id, update)
            .await
            .map_err(|e| format!("更新任务失败: {}", e))?
        {
            Some(t) => Ok(format!(
                "任务 {} 更新成功: \"{}\" - {}",
                t.id,
                t.title,
                t.status_label()
            )),
            None => Err(format!("更新任务 {} 失败。", args.id)),
        }
    }
}

pub struct DeleteTaskTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "删除指定任务"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TaskIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: TaskIdArgs = parse_args(args)?;
        let store = &self.0;
        let Some(task) = store
            .get_task(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("删除任务失败: {}", e))?
        else {
            return Ok(format!("未找到 ID 为 {} 的任务。", args.id));
        };
        let deleted = store
            .delete_task(ctx.user_id, task.id)
            .await
            .map_err(|e| format!("删除任务失败: {}", e))?;
        if !deleted {
            return Err(format!("删除任务 {} 失败。", task.id));
        }
        Ok(format!("任务 {} (\"{}\") 删除成功。", task.id, task.title))
    }
}

pub struct DeleteLatestTaskTool(Arc<dyn TaskStore>);

#[async_trait]
impl Tool for DeleteLatestTaskTool {
    fn name(&self) -> &str {
        "delete_latest_task"
    }

    fn description(&self) -> &str {
        "删除最新的任务"
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
        let store = &self.0;
        let Some(task) = store
            .latest_task(ctx.user_id)
            .await
            .map_err(|e| format!("删除最新任务失败: {}", e))?
        else {
            return Ok("没有任务可以删除。".to_string());
        };
        let deleted = store
            .delete_task(ctx.user_id, task.id)
            .await
            .map_err(|e| format!("删除最新任务失败: {}", e))?;
        if !deleted {
            return Err("删除任务失败。".to_string());
        }
        Ok(format!("任务 {} (\"{}\") 删除成功。", task.id, task.title))
    }
}

pub struct RefreshTaskListTool;

#[async_trait]
impl Tool for RefreshTaskListTool {
    fn name(&self) -> &str {
        "refresh_task_list"
    }

    fn description(&self) -> &str {
        "刷新前端任务列表"
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
        Ok(REFRESH_TASK_LIST.to_string())
    }
}
