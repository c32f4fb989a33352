//! 意图分类：是否需要调用业务数据（任务 / 日程 / 笔记）
//!
//! 两层判断，默认保守（不确定时返回 false）：
//! 1. 问候 / 感谢 / 告别 / 询问功能等固定短语直接判定为 false，不调用 LLM
//! 2. 其余交给 LLM 输出 JSON；解析失败为 false；短消息且不含领域关键词时强制为 false

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::core::{OrchestratorState, SupervisorError};
use crate::llm::LlmClient;
use crate::memory::Message;

use super::planner::{json_object_slice, strip_code_fences};
use super::prompts::INTENT_CLASSIFY_PROMPT;

/// 无需业务数据的固定短语（比较时同样去掉标点与空白）
const CONVERSATIONAL_PHRASES: &[&str] = &[
    "hi", "hello", "hey", "yo", "你好", "您好", "嗨", "哈喽", "哈啰", "早", "早上好", "上午好",
    "中午好", "下午好", "晚上好", "早安", "午安", "晚安", "good morning", "good evening",
    "谢谢", "谢谢你", "多谢", "感谢", "thanks", "thank you", "thx", "不客气", "好的", "好",
    "ok", "okay", "嗯", "知道了", "收到", "明白了", "再见", "拜拜", "bye", "goodbye",
    "你能做什么", "你可以做什么", "你会什么", "有什么功能", "如何使用", "怎么用", "你是谁",
    "what can you do", "who are you", "help", "帮助",
];

/// 领域关键词：短消息只有包含其中之一才可能需要业务数据
const DOMAIN_KEYWORDS: &[&str] = &[
    "任务", "待办", "日程", "会议", "安排", "提醒", "笔记", "记录", "创建", "添加", "新建", "删除",
    "移除", "查看", "列出", "查询", "更新", "修改", "完成", "task", "todo", "schedule",
    "meeting", "note", "create", "add", "delete", "remove", "list", "view", "update",
];

#[derive(Debug, Error)]
pub enum ClassificationParseError {
    #[error("invalid classification JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassificationReply {
    pub needs_business_data: bool,
    #[serde(default)]
    pub reason: String,
}

pub fn parse_classification(text: &str) -> Result<ClassificationReply, ClassificationParseError> {
    let body = strip_code_fences(text);
    match serde_json::from_str(body) {
        Ok(reply) => Ok(reply),
        Err(e) => match json_object_slice(body) {
            Some(slice) if slice.len() < body.len() => Ok(serde_json::from_str(slice)?),
            _ => Err(e.into()),
        },
    }
}

/// 分类结果的来源（用于日志与测试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Conversational,
    Model,
    ShortMessageGuard,
    ParseFallback,
    LlmFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub needs_business_data: bool,
    pub reason: String,
    pub source: ClassificationSource,
}

impl Classification {
    fn no(reason: impl Into<String>, source: ClassificationSource) -> Self {
        Self {
            needs_business_data: false,
            reason: reason.into(),
            source,
        }
    }
}

fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// 小写匹配，或去掉标点与空白后匹配
pub fn is_conversational(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return true;
    }
    let stripped = strip_punctuation(&lowered);
    CONVERSATIONAL_PHRASES
        .iter()
        .any(|p| *p == lowered || (!stripped.is_empty() && strip_punctuation(p) == stripped))
}

pub fn has_domain_keyword(text: &str) -> bool {
    let lowered = text.to_lowercase();
    DOMAIN_KEYWORDS.iter().any(|k| lowered.contains(k))
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    short_message_chars: usize,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, short_message_chars: usize) -> Self {
        Self {
            llm,
            short_message_chars,
        }
    }

    /// 仅 Completion Service 不可用时返回错误
    pub async fn classify(&self, state: &OrchestratorState) -> Result<Classification, SupervisorError> {
        let text = state.user_text();
        if is_conversational(text) {
            return Ok(Classification::no("简单对话", ClassificationSource::Conversational));
        }

        let mut messages = vec![Message::system(INTENT_CLASSIFY_PROMPT)];
        messages.extend(state.history().iter().filter(|m| m.is_dialogue()).cloned());
        messages.push(Message::user(text));

        let raw = match self.llm.complete(&messages).await {
            Ok(raw) => raw,
            Err(e) if e.is_unavailable() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("intent classification failed, defaulting to false: {}", e);
                return Ok(Classification::no(e.to_string(), ClassificationSource::LlmFallback));
            }
        };
        tracing::debug!(raw = %raw, "intent classifier output");

        let reply = match parse_classification(&raw) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("意图分类结果解析失败: {}, 默认不需要业务数据", e);
                return Ok(Classification::no("解析失败", ClassificationSource::ParseFallback));
            }
        };

        if reply.needs_business_data
            && text.chars().count() < self.short_message_chars
            && !has_domain_keyword(text)
        {
            tracing::info!(text = %text, "short message without domain keyword, overriding to false");
            return Ok(Classification::no(
                "消息过短且不含业务关键词",
                ClassificationSource::ShortMessageGuard,
            ));
        }

        Ok(Classification {
            needs_business_data: reply.needs_business_data,
            reason: reply.reason,
            source: ClassificationSource::Model,
        })
    }
}
