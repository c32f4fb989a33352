//! 记忆层：对话消息类型与跨轮对话历史

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role, ToolCall};
