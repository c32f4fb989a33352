//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按注册顺序保存，
//! 既可按名查找，也能导出绑定到 Completion Service 的 ToolSpec 列表。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolSpec;
use crate::store::UserId;

/// 工具调用上下文：当前用户（所有持久化操作都按其隔离）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub user_id: UserId,
}

impl ToolContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
///
/// 业务上的「未找到」「没有字段」等返回 Ok(说明文本)；参数错误或存储故障返回 Err(原因)。
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String>;
}

/// 工具注册表：保持注册顺序（prompt 中的工具列表与之一致）
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具后注册者覆盖先注册者，位置不变
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let tool = self.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args, ctx).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成 prompt 中的工具列表段落：每行 `- name: description`
    pub fn tools_list(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 绑定到 Completion Service 的工具描述
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            self.1
        }
        async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
            Ok(format!("{} for {:?}", self.1, ctx.user_id))
        }
    }

    #[tokio::test]
    async fn test_registry_keeps_order_and_overrides() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("b", "first b"));
        registry.register(Named("a", "a"));
        registry.register(Named("b", "second b"));

        assert_eq!(registry.tool_names(), vec!["b", "a"]);
        assert_eq!(registry.tools_list(), "- b: second b\n- a: a");
        let out = registry
            .execute("b", Value::Null, &ToolContext::new(Some(3)))
            .await
            .unwrap();
        assert_eq!(out, "second b for Some(3)");
        assert!(registry
            .execute("zzz", Value::Null, &ToolContext::default())
            .await
            .is_err());
        assert_eq!(registry.tool_specs()[1].parameters["type"], "object");
    }
}
