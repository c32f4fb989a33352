//! 闲聊回复：不需要业务数据时直接由 LLM 生成简短回复（终止节点）
//!
//! 同时提供流式生成的公共逻辑：有事件通道时逐段推送 MessageChunk，最后推送 MessageDone。

use std::sync::Arc;

use futures_util::StreamExt;

use crate::core::{OrchestratorState, SupervisorError};
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

use super::events::{emit, EventSender, SupervisorEvent};
use super::prompts::SIMPLE_RESPONSE_PROMPT;

/// 生成最终回复文本；无事件通道时走非流式补全
pub(crate) async fn generate_reply(
    llm: &dyn LlmClient,
    messages: &[Message],
    events: Option<&EventSender>,
) -> Result<String, LlmError> {
    if events.is_none() {
        return llm.complete(messages).await;
    }

    let mut stream = llm.complete_stream(messages).await?;
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        emit(events, SupervisorEvent::MessageChunk { text: chunk.clone() });
        reply.push_str(&chunk);
    }
    emit(events, SupervisorEvent::MessageDone);
    Ok(reply)
}

pub struct SimpleResponder {
    llm: Arc<dyn LlmClient>,
}

impl SimpleResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 成功时向 state 追加一条 assistant 消息
    pub async fn respond(
        &self,
        state: &mut OrchestratorState,
        events: Option<&EventSender>,
    ) -> Result<(), SupervisorError> {
        let mut messages = vec![Message::system(SIMPLE_RESPONSE_PROMPT)];
        messages.extend(state.history().iter().filter(|m| m.is_dialogue()).cloned());
        messages.push(Message::user(state.user_text()));

        let reply = generate_reply(self.llm.as_ref(), &messages, events).await?;
        state.messages.push(Message::assistant(reply));
        state.is_planning = false;
        state.should_continue = false;
        Ok(())
    }
}
