//! 工具箱：Tool trait、注册表、执行器，以及任务 / 日程 / 笔记三套业务工具

pub mod executor;
pub mod note;
pub mod registry;
pub mod schedule;
pub mod schema;
pub mod task;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use executor::ToolExecutor;
pub use note::note_tools;
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use schedule::schedule_tools;
pub use schema::args_schema;
pub use task::task_tools;

/// 工具结果中的该前缀表示请求前端执行动作（如刷新列表）
pub const FRONTEND_TOOL_PREFIX: &str = "frontend_tool_call:";

/// 将模型给出的参数反序列化为参数结构体；null 视为空对象
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| format!("参数错误: {}", e))
}

/// 取出工具结果中的前端动作名（如 refresh_schedule_list）
pub fn frontend_action(tool_output: &str) -> Option<&str> {
    tool_output
        .lines()
        .find_map(|line| line.trim().strip_prefix(FRONTEND_TOOL_PREFIX))
        .and_then(|rest| rest.split_whitespace().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_action() {
        let out = "日程创建成功: \"周会\"\nfrontend_tool_call:refresh_schedule_list 正在为您刷新日程列表...";
        assert_eq!(frontend_action(out), Some("refresh_schedule_list"));
        assert_eq!(frontend_action("任务创建成功"), None);
    }

    #[test]
    fn test_parse_args_null_as_empty() {
        #[derive(serde::Deserialize)]
        struct Limit {
            #[serde(default)]
            limit: Option<usize>,
        }
        let parsed: Limit = parse_args(Value::Null).unwrap();
        assert!(parsed.limit.is_none());
        let err = parse_args::<Limit>(serde_json::json!({"limit": "x"})).err().unwrap();
        assert!(err.starts_with("参数错误"));
    }
}
