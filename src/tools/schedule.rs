//! 日程工具：创建 / 查询 / 更新 / 删除日程，按日期范围与即将到来查询，通知前端刷新
//!
//! 时间参数为 ISO-8601 字符串；缺少时区时按 UTC+8 解释。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{args_schema, parse_args, Tool, ToolContext, ToolRegistry};
use crate::store::{NewSchedule, Schedule, ScheduleStore, ScheduleUpdate, DEFAULT_SCHEDULE_COLOR};

pub const REFRESH_SCHEDULE_LIST: &str =
    "frontend_tool_call:refresh_schedule_list 正在为您刷新日程列表...";

/// 默认时区 UTC+8
pub fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

pub fn schedule_tools(store: Arc<dyn ScheduleStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CreateScheduleTool(store.clone()));
    registry.register(GetSchedulesTool(store.clone()));
    registry.register(GetScheduleTool(store.clone()));
    registry.register(UpdateScheduleTool(store.clone()));
    registry.register(DeleteScheduleTool(store.clone()));
    registry.register(SchedulesByDateRangeTool(store.clone()));
    registry.register(UpcomingSchedulesTool(store));
    registry.register(RefreshScheduleListTool);
    registry
}

/// 解析 ISO-8601 时间；无时区时视为 UTC+8
fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            if let Some(dt) = default_offset().from_local_datetime(&naive).single() {
                return Ok(dt);
            }
        }
    }
    Err(format!("无法解析时间: {}", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| format!("无法解析日期: {}", raw))
}

fn full_time(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

fn list_line(s: &Schedule) -> String {
    format!(
        "- {}: {} ({} - {})",
        s.id,
        s.title,
        s.start_time.format("%Y-%m-%d %H:%M"),
        s.end_time.format("%H:%M")
    )
}

fn list_lines(schedules: &[Schedule]) -> String {
    schedules.iter().map(list_line).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateScheduleArgs {
    /// 日程标题
    title: String,
    /// 开始时间，ISO 格式且包含时区，如 2024-01-02T09:00:00+08:00
    start_time: String,
    /// 结束时间，ISO 格式且包含时区，如 2024-01-02T10:00:00+08:00
    end_time: String,
    /// 日程描述
    #[serde(default)]
    description: Option<String>,
    /// 是否全天（默认 false）
    #[serde(default)]
    is_all_day: bool,
    /// 地点
    #[serde(default)]
    location: Option<String>,
    /// 颜色代码（默认 #1890ff）
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ScheduleIdArgs {
    /// 日程 ID
    id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateScheduleArgs {
    /// 日程 ID
    id: i64,
    #[serde(default)]
    title: Option<String>,
    /// ISO 格式开始时间
    #[serde(default)]
    start_time: Option<String>,
    /// ISO 格式结束时间
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_all_day: Option<bool>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DateRangeArgs {
    /// 开始日期（YYYY-MM-DD）
    start_date: String,
    /// 结束日期（YYYY-MM-DD）
    end_date: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpcomingArgs {
    /// 最多返回条数（默认 10）
    #[serde(default = "default_upcoming_limit")]
    limit: usize,
}

fn default_upcoming_limit() -> usize {
    10
}

pub struct CreateScheduleTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for CreateScheduleTool {
    fn name(&self) -> &str {
        "create_schedule"
    }

    fn description(&self) -> &str {
        "创建新日程（时间必须为带时区的 ISO 格式）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CreateScheduleArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: CreateScheduleArgs = parse_args(args)?;
        let start_time = parse_time(&args.start_time).map_err(|e| format!("日程创建失败: {}", e))?;
        let end_time = parse_time(&args.end_time).map_err(|e| format!("日程创建失败: {}", e))?;
        let schedule = self
            .0
            .create_schedule(
                ctx.user_id,
                NewSchedule {
                    title: args.title,
                    description: args.description,
                    start_time,
                    end_time,
                    is_all_day: args.is_all_day,
                    location: args.location,
                    color: args.color.unwrap_or_else(|| DEFAULT_SCHEDULE_COLOR.to_string()),
                },
            )
            .await
            .map_err(|e| format!("日程创建失败: {}", e))?;
        Ok(format!(
            "日程创建成功: \"{}\" (ID: {}, 时间: {} - {})\n{}",
            schedule.title,
            schedule.id,
            full_time(&schedule.start_time),
            full_time(&schedule.end_time),
            REFRESH_SCHEDULE_LIST
        ))
    }
}

pub struct GetSchedulesTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for GetSchedulesTool {
    fn name(&self) -> &str {
        "get_schedules"
    }

    fn description(&self) -> &str {
        "获取所有日程"
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
        let schedules = self
            .0
            .list_schedules(ctx.user_id)
            .await
            .map_err(|e| format!("获取日程列表失败: {}", e))?;
        if schedules.is_empty() {
            return Ok("没有找到日程。".to_string());
        }
        Ok(format!("找到 {} 个日程:\n{}", schedules.len(), list_lines(&schedules)))
    }
}

pub struct GetScheduleTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for GetScheduleTool {
    fn name(&self) -> &str {
        "get_schedule"
    }

    fn description(&self) -> &str {
        "获取指定日程"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ScheduleIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: ScheduleIdArgs = parse_args(args)?;
        let schedule = self
            .0
            .get_schedule(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("获取日程失败: {}", e))?;
        Ok(match schedule {
            Some(s) => format!(
                "日程 {}: \"{}\"\n时间: {} - {}\n描述: {}",
                s.id,
                s.title,
                full_time(&s.start_time),
                full_time(&s.end_time),
                s.description.as_deref().unwrap_or("无")
            ),
            None => format!("未找到 ID 为 {} 的日程。", args.id),
        })
    }
}

pub struct UpdateScheduleTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for UpdateScheduleTool {
    fn name(&self) -> &str {
        "update_schedule"
    }

    fn description(&self) -> &str {
        "更新日程"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<UpdateScheduleArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: UpdateScheduleArgs = parse_args(args)?;
        let start_time = args
            .start_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|e| format!("更新日程失败: {}", e))?;
        let end_time = args
            .end_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|e| format!("更新日程失败: {}", e))?;
        let update = ScheduleUpdate {
            title: args.title,
            description: args.description,
            start_time,
            end_time,
            is_all_day: args.is_all_day,
            location: args.location,
            color: args.color,
        };
        if update.is_empty() {
            return Ok("没有提供要更新的字段。".to_string());
        }

        match self
            .0
            .update_schedule(ctx.user_id, args.id, update)
            .await
            .map_err(|e| format!("更新日程失败: {}", e))?
        {
            Some(s) => Ok(format!(
                "日程 {} 更新成功: \"{}\"\n{}",
                s.id, s.title, REFRESH_SCHEDULE_LIST
            )),
            None => Err(format!("更新日程 {} 失败。", args.id)),
        }
    }
}

pub struct DeleteScheduleTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for DeleteScheduleTool {
    fn name(&self) -> &str {
        "delete_schedule"
    }

    fn description(&self) -> &str {
        "删除指定日程"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ScheduleIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: ScheduleIdArgs = parse_args(args)?;
        let store = &self.0;
        let Some(schedule) = store
            .get_schedule(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("删除日程失败: {}", e))?
        else {
            return Ok(format!("未找到 ID 为 {} 的日程。", args.id));
        };
        let deleted = store
            .delete_schedule(ctx.user_id, schedule.id)
            .await
            .map_err(|e| format!("删除日程失败: {}", e))?;
        if !deleted {
            return Err(format!("删除日程 {} 失败。", schedule.id));
        }
        Ok(format!(
            "日程 {} (\"{}\") 删除成功。\n{}",
            schedule.id, schedule.title, REFRESH_SCHEDULE_LIST
        ))
    }
}

pub struct SchedulesByDateRangeTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for SchedulesByDateRangeTool {
    fn name(&self) -> &str {
        "get_schedules_by_date_range"
    }

    fn description(&self) -> &str {
        "获取指定日期范围内的日程（日期格式 YYYY-MM-DD）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<DateRangeArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: DateRangeArgs = parse_args(args)?;
        let start = parse_date(&args.start_date).map_err(|e| format!("获取日程失败: {}", e))?;
        let end = parse_date(&args.end_date).map_err(|e| format!("获取日程失败: {}", e))?;
        let schedules = self
            .0
            .schedules_between(ctx.user_id, start, end)
            .await
            .map_err(|e| format!("获取日程失败: {}", e))?;
        if schedules.is_empty() {
            return Ok(format!(
                "在 {} 到 {} 之间没有找到日程。",
                args.start_date, args.end_date
            ));
        }
        Ok(format!("找到 {} 个日程:\n{}", schedules.len(), list_lines(&schedules)))
    }
}

pub struct UpcomingSchedulesTool(Arc<dyn ScheduleStore>);

#[async_trait]
impl Tool for UpcomingSchedulesTool {
    fn name(&self) -> &str {
        "get_upcoming_schedules"
    }

    fn description(&self) -> &str {
        "获取即将到来的日程"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<UpcomingArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: UpcomingArgs = parse_args(args)?;
        let schedules = self
            .0
            .upcoming_schedules(ctx.user_id, Utc::now(), args.limit)
            .await
            .map_err(|e| format!("获取即将到来的日程失败: {}", e))?;
        if schedules.is_empty() {
            return Ok("没有即将到来的日程。".to_string());
        }
        Ok(format!(
            "找到 {} 个即将到来的日程:\n{}",
            schedules.len(),
            list_lines(&schedules)
        ))
    }
}

pub struct RefreshScheduleListTool;

#[async_trait]
impl Tool for RefreshScheduleListTool {
    fn name(&self) -> &str {
        "refresh_schedule_list"
    }

    fn description(&self) -> &str {
        "刷新前端日程列表"
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
        Ok(REFRESH_SCHEDULE_LIST.to_string())
    }
}
