//! OpenAI 兼容 API 客户端
//!
//! 通过 reqwest 调用任意 OpenAI 兼容的 `/chat/completions` 端点（可配置 base_url）；
//! 支持 DeepSeek、OpenAI、自建代理等，并完整支持 tools / tool_calls 往返。
//! 最终回复走 `stream: true`，按 SSE `data:` 行逐段解析 delta.content。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{Completion, LlmClient, LlmError, TokenStream, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 HTTP Client、端点与模型名
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    /// api_key 为 None 时客户端标记为不可用，编排器会直接返回降级提示
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(String::from),
            temperature: 0.1,
            usage: TokenUsage::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        match reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
        {
            Ok(http) => self.http = http,
            Err(e) => tracing::warn!("Failed to build HTTP client with timeout ({}), using default", e),
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, messages: &[Message], tools: &[ToolSpec], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire_message).collect(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(to_wire_tool).collect())
            },
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            temperature: self.temperature,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    /// 发送请求并检查状态码；非 2xx 按状态分类为不可用或普通 API 错误
    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Unavailable("API key not configured".to_string()))?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(classify_transport)?;
            return Err(classify_status(status, body));
        }
        Ok(response)
    }
}

/// SSE 行解码：跨分片缓冲不完整的行，空行结束一个事件，返回各事件的 data 内容
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.feed_line(&line, &mut events);
        }
        events
    }

    /// 流结束：处理残留的最后一行并冲刷未以空行结尾的事件
    fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
            self.feed_line(&line, &mut events);
        }
        self.feed_line("", &mut events);
        events
    }

    fn feed_line(&mut self, line: &str, events: &mut Vec<String>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(std::mem::take(&mut self.data).join("\n"));
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // 注释行（: 开头）与 event / id / retry 字段忽略
    }
}

struct SseState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    usage: TokenUsage,
    done: bool,
}

impl<S> SseState<S> {
    fn handle_data(&mut self, data: &str) {
        if self.done {
            return;
        }
        if data.trim() == "[DONE]" {
            self.done = true;
            return;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => {
                if let Some(usage) = &chunk.usage {
                    self.usage.add(usage.prompt_tokens, usage.completion_tokens);
                }
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        self.pending.push_back(Ok(text));
                    }
                }
            }
            Err(e) => {
                self.pending
                    .push_back(Err(LlmError::InvalidResponse(format!("{}: {}", e, data))));
                self.done = true;
            }
        }
    }
}

/// 把字节流转换为文本增量流；遇到 `[DONE]`、解析错误或传输错误即结束
fn sse_text_stream<S, B>(bytes: S, usage: TokenUsage) -> impl Stream<Item = Result<String, LlmError>>
where
    S: Stream<Item = Result<B, LlmError>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        usage,
        done: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for data in st.decoder.push(chunk.as_ref()) {
                        st.handle_data(&data);
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    for data in st.decoder.finish() {
                        st.handle_data(&data);
                    }
                    st.done = true;
                }
            }
        }
    })
}

fn to_wire_message(m: &Message) -> WireMessage {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let tool_calls = if m.tool_calls.is_empty() {
        None
    } else {
        Some(
            m.tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.args.to_string(),
                    },
                })
                .collect(),
        )
    };
    // assistant 仅发起工具调用时 content 置空（null）
    let content = if m.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(m.content.clone())
    };
    WireMessage {
        role,
        content,
        tool_calls,
        tool_call_id: m.tool_call_id.clone(),
        name: match m.role {
            Role::Tool => None,
            _ => m.name.clone(),
        },
    }
}

fn to_wire_tool(spec: &ToolSpec) -> WireTool {
    WireTool {
        kind: "function",
        function: WireFunctionDef {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        },
    }
}

/// 连通性、鉴权与端点缺失（401/403/404）视为服务不可用，其余为普通 API 错误
fn classify_status(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 | 404 => LlmError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body)),
        code => LlmError::Api {
            status: Some(code),
            message: body,
        },
    }
}

fn classify_transport(e: reqwest::Error) -> LlmError {
    if e.is_connect() || e.is_timeout() {
        LlmError::Unavailable(format!("Connection error: {}", e))
    } else {
        LlmError::Api {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Tool call arguments are not valid JSON ({}): {}", e, raw);
        Value::String(raw.to_string())
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError> {
        let request = self.build_request(messages, tools, false);

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "chat completion request"
        );

        let response = self.send(&request).await?;
        let body = response.text().await.map_err(classify_transport)?;

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("{}: {}", e, body)))?;

        if let Some(usage) = &parsed.usage {
            self.usage.add(usage.prompt_tokens, usage.completion_tokens);
        }

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_arguments(&tc.function.arguments)))
            .collect();

        Ok(Completion {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let request = self.build_request(messages, &[], true);
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion stream request");

        let response = self.send(&request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(classify_transport));
        Ok(Box::pin(sse_text_stream(Box::pin(bytes), self.usage.clone())))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_api_key_is_unavailable() {
        let client = OpenAiClient::new(None, "gpt-4o-mini", None);
        assert!(!client.is_available());
        let client = OpenAiClient::new(None, "gpt-4o-mini", Some("  "));
        assert!(!client.is_available());
        let client = OpenAiClient::new(Some("https://example.com/v1/"), "m", Some("sk-x"));
        assert!(client.is_available());
        assert_eq!(client.endpoint(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn test_wire_message_for_tool_round_trip() {
        let call = ToolCall::new("call_1", "create_task", json!({"title": "买菜"}));
        let assistant = Message::assistant_with_tool_calls("", vec![call]).with_name("task_agent");
        let wire = serde_json::to_value(to_wire_message(&assistant)).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert!(wire["content"].is_null());
        assert_eq!(wire["name"], "task_agent");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "create_task");
        let args: Value =
            serde_json::from_str(wire["tool_calls"][0]["function"]["arguments"].as_str().unwrap())
                .unwrap();
        assert_eq!(args, json!({"title": "买菜"}));

        let tool = Message::tool("call_1", "任务创建成功").with_name("task_agent");
        let wire = serde_json::to_value(to_wire_message(&tool)).unwrap();
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert!(wire.get("name").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = r#"{
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_9", "type": "function", "function": {"name": "get_tasks", "arguments": ""}}
            ]}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let message = &parsed.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_tasks");
        assert_eq!(parse_arguments(&calls[0].function.arguments), json!({}));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(reqwest::StatusCode::UNAUTHORIZED, String::new()).is_unavailable());
        assert!(classify_status(reqwest::StatusCode::NOT_FOUND, String::new()).is_unavailable());
        assert!(!classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, String::new())
            .is_unavailable());
    }

    #[test]
    fn test_sse_decoder_buffers_partial_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(decoder.push(b":1}\r\n\r\n: keep-alive\n\ndata: [DONE]\n\n"), vec![
            "{\"a\":1}".to_string(),
            "[DONE]".to_string(),
        ]);
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec!["tail".to_string()]);
    }

    #[tokio::test]
    async fn test_sse_text_stream_yields_deltas() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"已为您\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"创建任务\"}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":4}}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"忽略\"}}]}\n\n",
        );
        // 在多字节字符中间切分，模拟网络分片
        let bytes = body.as_bytes();
        let split = body.find("创建").unwrap() + 1;
        let chunks: Vec<Result<Vec<u8>, LlmError>> =
            vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())];

        let usage = TokenUsage::new();
        let text: Vec<String> = sse_text_stream(stream::iter(chunks), usage.clone())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(text, vec!["已为您".to_string(), "创建任务".to_string()]);
        assert_eq!(usage.get(), (20, 4, 24));
    }

    #[tokio::test]
    async fn test_sse_text_stream_surfaces_errors() {
        let chunks: Vec<Result<&[u8], LlmError>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n".as_slice()),
            Err(LlmError::Unavailable("Connection error: reset".into())),
        ];
        let items: Vec<_> = sse_text_stream(stream::iter(chunks), TokenUsage::new())
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "hi");
        assert!(items[1].as_ref().unwrap_err().is_unavailable());

        let chunks: Vec<Result<&[u8], LlmError>> = vec![Ok(b"data: not json\n\n".as_slice())];
        let items: Vec<_> = sse_text_stream(stream::iter(chunks), TokenUsage::new())
            .collect()
            .await;
        assert!(matches!(items.as_slice(), [Err(LlmError::InvalidResponse(_))]));
    }

    #[test]
    fn test_stream_request_shape() {
        let client = OpenAiClient::new(None, "deepseek-chat", Some("sk-x"));
        let wire = serde_json::to_value(client.build_request(&[Message::user("hi")], &[], true)).unwrap();
        assert_eq!(wire["stream"], true);
        assert_eq!(wire["stream_options"]["include_usage"], true);
        assert!(wire.get("tools").is_none());
        let wire = serde_json::to_value(client.build_request(&[Message::user("hi")], &[], false)).unwrap();
        assert!(wire.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_fast() {
        let client = OpenAiClient::new(None, "gpt-4o-mini", None);
        let err = client.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(err.is_unavailable());
        let err = client.complete_stream(&[Message::user("hi")]).await.err().unwrap();
        assert!(err.is_unavailable());
    }
}
