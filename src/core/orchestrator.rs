//! Supervisor 编排器：主控状态机
//!
//! IntentClassify -> {SimpleResponse | Plan} -> Route -> {Dispatch -> Execute -> Route | Aggregate}
//!
//! 每个节点执行完毕才进入下一个；计划步骤严格串行。节点转移次数受 step_budget 限制，
//! 超出时以降级回复结束本轮。每轮开始从检查点恢复对话历史，结束时写回。

use std::sync::Arc;

use crate::core::{
    AgentKind, OrchestratorState, RecoveryAction, RecoveryEngine, SupervisorError,
};
use crate::llm::LlmClient;
use crate::memory::{Message, Role};
use crate::react::{WorkerRegistry, WorkerRun};
use crate::store::{CheckpointStore, UserId};
use crate::supervisor::events::{emit, EventSender, SupervisorEvent};
use crate::supervisor::{
    record_failure, record_result, route, Aggregator, IntentClassifier, Planner, RouteDecision,
    SimpleResponder,
};

/// 状态机节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    IntentClassify,
    SimpleResponse,
    Plan,
    Route,
    Dispatch(AgentKind),
    Execute,
    Aggregate,
    End,
}

impl Node {
    pub fn name(&self) -> String {
        match self {
            Node::IntentClassify => "intent_classify".to_string(),
            Node::SimpleResponse => "simple_response".to_string(),
            Node::Plan => "plan".to_string(),
            Node::Route => "route".to_string(),
            Node::Dispatch(kind) => kind.agent_name(),
            Node::Execute => "execute".to_string(),
            Node::Aggregate => "aggregate".to_string(),
            Node::End => "end".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    /// 本轮被终止，回复为降级文本
    Aborted,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub state: OrchestratorState,
    pub status: TurnStatus,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    classifier: IntentClassifier,
    planner: Planner,
    responder: SimpleResponder,
    aggregator: Aggregator,
    workers: WorkerRegistry,
    checkpoints: Arc<dyn CheckpointStore>,
    recovery: RecoveryEngine,
    step_budget: usize,
    max_context_turns: usize,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        workers: WorkerRegistry,
        checkpoints: Arc<dyn CheckpointStore>,
        step_budget: usize,
        short_message_chars: usize,
        max_context_turns: usize,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone(), short_message_chars),
            planner: Planner::new(llm.clone()),
            responder: SimpleResponder::new(llm.clone()),
            aggregator: Aggregator::new(llm.clone()),
            llm,
            workers,
            checkpoints,
            recovery: RecoveryEngine::new(),
            step_budget,
            max_context_turns,
        }
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 处理一轮用户输入，返回最终回复
    pub async fn handle_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        user_id: UserId,
    ) -> TurnOutcome {
        self.run_turn(thread_id, user_text, user_id, None).await
    }

    /// 同 handle_turn，并把过程事件推送到 events（仅用于展示）
    pub async fn handle_turn_stream(
        &self,
        thread_id: &str,
        user_text: &str,
        user_id: UserId,
        events: EventSender,
    ) -> TurnOutcome {
        self.run_turn(thread_id, user_text, user_id, Some(&events)).await
    }

    async fn run_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        user_id: UserId,
        events: Option<&EventSender>,
    ) -> TurnOutcome {
        let previous = match self.checkpoints.load(thread_id).await {
            Ok(prev) => prev,
            Err(e) => {
                tracing::warn!(thread_id, "checkpoint load failed, starting fresh: {}", e);
                None
            }
        };
        let mut state =
            OrchestratorState::next_turn(previous.as_ref(), user_text, user_id, self.max_context_turns);
        tracing::info!(thread_id, history = state.turn_start, "turn start");

        let status = if self.llm.is_available() {
            self.run_with_budget(&mut state, self.step_budget, events).await
        } else {
            let err = SupervisorError::CompletionUnavailable("LLM client not configured".to_string());
            self.abort(&mut state, &err, self.recovery.user_message(&err), events)
        };

        if let Err(e) = self.checkpoints.save(thread_id, &state).await {
            tracing::warn!(thread_id, "checkpoint save failed: {}", e);
        }

        TurnOutcome {
            reply: state.final_reply().unwrap_or_default().to_string(),
            state,
            status,
        }
    }

    /// 从 IntentClassify 开始驱动状态机，最多执行 budget 次节点转移
    pub async fn run_with_budget(
        &self,
        state: &mut OrchestratorState,
        budget: usize,
        events: Option<&EventSender>,
    ) -> TurnStatus {
        let mut node = Node::IntentClassify;
        let mut transitions = 0usize;
        let mut pending: Option<(AgentKind, WorkerRun)> = None;

        while node != Node::End {
            if transitions >= budget {
                let err = SupervisorError::StepBudgetExceeded { budget };
                tracing::warn!(budget, node = %node.name(), "step budget exhausted");
                return self.abort(state, &err, self.recovery.user_message(&err), events);
            }
            transitions += 1;
            emit(events, SupervisorEvent::NodeEnter { node: node.name() });

            node = match self.step(node, state, &mut pending, events).await {
                Ok(next) => next,
                Err(err) => match self.recovery.handle(&err, &node) {
                    RecoveryAction::RecordStepFailure(text) => {
                        tracing::warn!(node = %node.name(), "worker failed: {}", err);
                        if let Node::Dispatch(kind) = node {
                            let result = record_failure(state, kind, text);
                            emit(
                                events,
                                SupervisorEvent::StepRecorded {
                                    step: result.step_index,
                                    agent: kind.to_string(),
                                    success: result.success,
                                },
                            );
                        }
                        Node::Route
                    }
                    RecoveryAction::Abort(text) => return self.abort(state, &err, text, events),
                },
            };
        }

        tracing::info!(transitions, steps = state.execution_results.len(), "turn completed");
        TurnStatus::Completed
    }

    async fn step(
        &self,
        node: Node,
        state: &mut OrchestratorState,
        pending: &mut Option<(AgentKind, WorkerRun)>,
        events: Option<&EventSender>,
    ) -> Result<Node, SupervisorError> {
        match node {
            Node::IntentClassify => {
                let c = self.classifier.classify(state).await?;
                tracing::info!(
                    needs_business_data = c.needs_business_data,
                    source = ?c.source,
                    "intent classified"
                );
                state.needs_business_data = Some(c.needs_business_data);
                state.is_planning = c.needs_business_data;
                emit(
                    events,
                    SupervisorEvent::Classified {
                        needs_business_data: c.needs_business_data,
                        reason: c.reason,
                    },
                );
                Ok(if c.needs_business_data {
                    Node::Plan
                } else {
                    Node::SimpleResponse
                })
            }
            Node::SimpleResponse => {
                self.responder.respond(state, events).await?;
                Ok(Node::End)
            }
            Node::Plan => {
                let outcome = self.planner.plan(state).await?;
                emit(
                    events,
                    SupervisorEvent::PlanReady {
                        summary: outcome.plan.summary.clone(),
                        steps: outcome.plan.steps.len(),
                        fallback: outcome.fallback,
                    },
                );
                state.plan = Some(outcome.plan);
                state.current_step = 0;
                state.execution_results.clear();
                state.is_planning = false;
                Ok(Node::Route)
            }
            Node::Route => match route(state) {
                RouteDecision::Dispatch(kind) => {
                    let description = state
                        .current_plan_step()
                        .map(|s| s.description.clone())
                        .unwrap_or_default();
                    emit(
                        events,
                        SupervisorEvent::StepDispatched {
                            step: state.current_step,
                            agent: kind.to_string(),
                            description,
                        },
                    );
                    Ok(Node::Dispatch(kind))
                }
                RouteDecision::Aggregate => Ok(Node::Aggregate),
            },
            Node::Dispatch(kind) => {
                let worker = self.workers.get(kind).ok_or_else(|| {
                    SupervisorError::Config(format!("no worker registered for {}", kind))
                })?;
                let (instruction, tail) = worker_input(state);
                let run = worker.run(&instruction, state.user_id, &tail, events).await?;
                state.messages.extend(run.messages.iter().cloned());
                *pending = Some((kind, run));
                Ok(Node::Execute)
            }
            Node::Execute => {
                match pending.take() {
                    Some((kind, run)) => {
                        let result = record_result(state, kind, &run);
                        emit(
                            events,
                            SupervisorEvent::StepRecorded {
                                step: result.step_index,
                                agent: kind.to_string(),
                                success: result.success,
                            },
                        );
                    }
                    None => tracing::warn!("execute reached without a worker run"),
                }
                Ok(Node::Route)
            }
            Node::Aggregate => {
                self.aggregator.aggregate(state, events).await?;
                Ok(Node::End)
            }
            Node::End => Ok(Node::End),
        }
    }

    /// 终止本轮：追加降级回复作为本轮唯一的最终 assistant 消息
    fn abort(
        &self,
        state: &mut OrchestratorState,
        err: &SupervisorError,
        text: String,
        events: Option<&EventSender>,
    ) -> TurnStatus {
        tracing::warn!("turn aborted: {}", err);
        emit(events, SupervisorEvent::Error { text: text.clone() });
        state.messages.push(Message::assistant(text));
        state.selected_agent = None;
        state.agent_context.clear();
        state.is_planning = false;
        state.is_executing = false;
        state.is_aggregating = false;
        state.should_continue = false;
        TurnStatus::Aborted
    }
}

/// 子 Agent 的输入：最后一条消息为路由追加的指令，之前的对话去掉工具轨迹后作为上下文
fn worker_input(state: &OrchestratorState) -> (String, Vec<Message>) {
    let Some((instruction, before)) = state.messages.split_last() else {
        return (String::new(), Vec::new());
    };
    let tail = before
        .iter()
        .filter(|m| m.role != Role::Tool && !m.has_tool_calls())
        .cloned()
        .collect();
    (instruction.content.clone(), tail)
}
