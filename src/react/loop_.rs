//! 子 Agent 工具调用循环
//!
//! 指令 -> LLM（绑定本 Agent 工具集）-> 依次执行请求的工具并写回 tool 消息 -> 下一轮 LLM，
//! 直到模型不再请求工具或达到迭代上限。三个领域共用这一份循环。

use crate::core::SupervisorError;
use crate::memory::Message;
use crate::store::UserId;
use crate::supervisor::events::{emit, preview, EventSender, SupervisorEvent};
use crate::tools::{frontend_action, ToolContext};

use super::worker::{WorkerAgent, WorkerRun};

/// 工具结果预览最大字符数
const TOOL_PREVIEW_CHARS: usize = 200;

/// 执行一次子 Agent 调用；返回的 messages 只含本次新产生的轨迹（assistant / tool 消息）
pub(crate) async fn tool_calling_loop(
    agent: &WorkerAgent,
    instruction: &str,
    user_id: UserId,
    tail: &[Message],
    events: Option<&EventSender>,
) -> Result<WorkerRun, SupervisorError> {
    let name = agent.kind().agent_name();
    let system = Message::system(agent.system_prompt());
    let instruction = Message::user(instruction).with_name("supervisor");
    let specs = agent.executor().tool_specs();
    let ctx = ToolContext::new(user_id);

    let mut trace: Vec<Message> = Vec::new();
    let mut tools_ok = true;

    for iteration in 0..agent.max_iterations() {
        let mut request = Vec::with_capacity(tail.len() + trace.len() + 2);
        request.push(system.clone());
        request.extend_from_slice(tail);
        request.push(instruction.clone());
        request.extend(trace.iter().cloned());

        let completion = agent.llm().complete_with_tools(&request, &specs).await?;
        tracing::debug!(agent = %name, iteration, content = %completion.content, "worker completion");

        if completion.tool_calls.is_empty() {
            trace.push(Message::assistant(completion.content).with_name(name.as_str()));
            return Ok(WorkerRun {
                messages: trace,
                tools_ok,
                iterations: iteration + 1,
                hit_limit: false,
            });
        }

        let mut calls = completion.tool_calls;
        for (idx, call) in calls.iter_mut().enumerate() {
            if call.id.trim().is_empty() {
                call.id = format!("call_{}_{}", iteration, idx);
            }
        }
        trace.push(
            Message::assistant_with_tool_calls(completion.content, calls.clone())
                .with_name(name.as_str()),
        );

        // 严格按请求顺序执行，保证副作用有序
        for call in calls {
            emit(
                events,
                SupervisorEvent::ToolCall {
                    agent: name.clone(),
                    tool: call.name.clone(),
                    args: call.args.clone(),
                },
            );

            let (ok, output) = match agent.executor().execute(&call.name, call.args, &ctx).await {
                Ok(output) => (true, output),
                Err(SupervisorError::ToolExecutionFailed(msg)) => (false, msg),
                Err(e) => (false, format!("工具 {} 执行失败: {}", call.name, e)),
            };
            if !ok {
                tools_ok = false;
                tracing::warn!(agent = %name, tool = %call.name, "tool failed: {}", output);
            }

            emit(
                events,
                SupervisorEvent::ToolResult {
                    agent: name.clone(),
                    tool: call.name.clone(),
                    ok,
                    preview: preview(&output, TOOL_PREVIEW_CHARS),
                },
            );
            if let Some(action) = frontend_action(&output) {
                emit(
                    events,
                    SupervisorEvent::FrontendTool {
                        action: action.to_string(),
                    },
                );
            }

            trace.push(Message::tool(call.id, output).with_name(name.as_str()));
        }
    }

    tracing::warn!(
        agent = %name,
        max_iterations = agent.max_iterations(),
        "worker reached iteration limit"
    );
    Ok(WorkerRun {
        messages: trace,
        tools_ok: false,
        iterations: agent.max_iterations(),
        hit_limit: true,
    })
}
