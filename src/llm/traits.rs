//! Completion Service 抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：
//! complete（纯文本，用于分类 / 规划 / 汇总）、complete_with_tools（绑定工具，用于子 Agent）、
//! complete_stream（流式 Token，默认退化为单段）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, ToolCall};

/// 暴露给模型的工具描述（OpenAI function 格式的 name / description / parameters）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次补全的结果：文本与可选的工具调用请求
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// LLM 调用错误；Unavailable 表示连通性 / 鉴权 / 端点不存在，整轮降级处理
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Completion service unavailable: {0}")]
    Unavailable(String),

    #[error("API error ({status:?}): {message}")]
    Api { status: Option<u16>, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LlmError::Unavailable(_))
    }
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 绑定工具的补全；tools 为空时即纯文本模式
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError>;

    /// 纯文本补全
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(self.complete_with_tools(messages, &[]).await?.content)
    }

    /// 流式完成，返回 Token 流；默认一次性返回完整文本
    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }

    /// 是否已配置可用（如缺少 API Key 时返回 false，整轮直接降级）
    fn is_available(&self) -> bool {
        true
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
