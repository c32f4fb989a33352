//! 工具参数 JSON Schema 生成（schemars 自动从参数结构体派生）
//!
//! 结果直接作为 OpenAI function 的 parameters 字段。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 由参数结构体生成 parameters schema；去掉 `$schema` / `title` 等模型无需的顶层字段
pub fn args_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {} })
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Sample {
        /// 标题
        title: String,
        done: Option<bool>,
    }

    #[test]
    fn test_args_schema_shape() {
        let schema = args_schema::<Sample>();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["description"], "标题");
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["title"]);
    }
}
