//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预先排好的补全结果（文本 / 工具调用 / 错误）；队列耗尽后回显最后一条 User 消息。
//! 每次请求的消息与可用工具名都会被记录，便于断言调用次数与上下文。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{Completion, LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Mock 客户端：脚本化响应
#[derive(Debug)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    available: bool,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// 未配置状态：is_available 返回 false，任何调用都返回 Unavailable
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.push(Ok(Completion::text(content)))
    }

    /// 追加一次工具调用响应；calls 为 (工具名, 参数)，id 依次为 mock_call_{n}
    pub fn with_tool_calls(self, calls: Vec<(&str, Value)>) -> Self {
        let offset = self.queued();
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall::new(format!("mock_call_{}_{}", offset, i), name, args))
            .collect();
        self.push(Ok(Completion::tool_calls(tool_calls)))
    }

    pub fn with_error(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    fn push(self, item: Result<Completion, LlmError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self
    }

    fn queued(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 已收到的全部请求（按时间顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 剩余未消费的脚本条目数
    pub fn remaining(&self) -> usize {
        self.queued()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });

        if !self.available {
            return Err(LlmError::Unavailable("mock client not configured".to_string()));
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(item) = next {
            return item;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(Completion::text(format!("Echo from Mock: {}", last_user)))
    }
}
