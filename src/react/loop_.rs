//! PLAN / ACT 主循环
//!
//! Plan（调用模型）-> 有工具调用则 Act（执行整批调用 + 更新焦点）-> 下一轮 Plan；
//! 模型给出无工具调用的回复即 Done。支持 Cancel（每次 Plan 前检查，已开始的 Act 会执行完）与最大步数限制。
//! 循环只在会话状态的副本上工作，出错时调用方手里的状态保持不变；
//! 已经执行过 Act 的 turn 被取消时返回 Cancelled 与截至当时的状态。
//! 可选 event_tx：向前端推送 StepUpdate / Thinking / ToolCall / Observation / MessageDone。

use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{tracker, AgentError, SessionState, TurnOutput, TurnStatus};
use crate::memory::{AssistantMessage, Message, ToolResult};
use crate::react::{Planner, ReactEvent};
use crate::tools::ToolExecutor;

/// 单次 turn 内最大 PLAN 次数，防止模型无限调用工具
pub const DEFAULT_MAX_STEPS: usize = 20;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 单次 turn 的执行配置
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub cancel_token: CancellationToken,
    pub max_steps: usize,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(planner: &'a Planner, executor: &'a ToolExecutor, cancel_token: CancellationToken) -> Self {
        Self {
            planner,
            executor,
            cancel_token,
            max_steps: DEFAULT_MAX_STEPS,
            event_tx: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: ReactEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

enum Phase {
    Plan,
    Act(AssistantMessage),
    Done,
}

/// 执行一次用户 turn
///
/// 追加 Human 消息 -> 循环 Plan / Act 直到模型不再调用工具或达到最大步数。
/// 返回本轮产生的 Assistant 消息与新的会话状态。
pub async fn react_loop(
    session: &ReactSession<'_>,
    state: &SessionState,
    user_input: &str,
) -> Result<TurnOutput, AgentError> {
    let input = user_input.trim();
    if input.is_empty() {
        return Err(AgentError::InvalidInput("user message is empty".to_string()));
    }

    let tools = session.executor.specs();
    let mut state = state.clone();
    state.conversation.push(Message::human(input));

    let mut produced: Vec<AssistantMessage> = Vec::new();
    let mut steps = 0usize;
    let mut phase = Phase::Plan;

    loop {
        phase = match phase {
            Phase::Plan => {
                if steps >= session.max_steps {
                    tracing::warn!(steps, "turn stopped: max steps exceeded");
                    session.send(ReactEvent::Error {
                        text: format!("stopped after {steps} steps"),
                    });
                    return Ok(TurnOutput {
                        status: TurnStatus::MaxStepsExceeded { steps },
                        assistant_messages: produced,
                        state,
                    });
                }
                if session.cancel_token.is_cancelled() {
                    tracing::info!(steps, "turn cancelled");
                    if steps == 0 {
                        return Err(AgentError::Cancelled);
                    }
                    return Ok(TurnOutput {
                        status: TurnStatus::Cancelled { steps },
                        assistant_messages: produced,
                        state,
                    });
                }

                steps += 1;
                session.send(ReactEvent::StepUpdate {
                    step: steps,
                    max_steps: session.max_steps,
                });
                session.send(ReactEvent::Thinking);

                let mut reply = match session.planner.plan(&state.conversation, &state.focus, &tools).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::error!(error = %e, steps, "planning failed");
                        session.send(ReactEvent::Error { text: e.to_string() });
                        return Err(e.into());
                    }
                };

                ensure_unique_call_ids(&state.conversation, &mut reply);
                state.conversation.push(Message::Assistant(reply.clone()));
                produced.push(reply.clone());
                if reply.has_calls() {
                    Phase::Act(reply)
                } else {
                    session.send(ReactEvent::MessageDone {
                        text: reply.text.clone(),
                    });
                    Phase::Done
                }
            }
            Phase::Act(reply) => {
                for call in &reply.calls {
                    session.send(ReactEvent::ToolCall {
                        id: call.id.clone(),
                        tool: call.name.clone(),
                        args: call.arguments.clone(),
                    });
                }

                let results = session.executor.execute_batch(&reply.calls).await;
                for result in &results {
                    session.send(observation_event(result));
                }

                let focus = tracker::apply(&state.focus, &results);
                if focus != state.focus {
                    tracing::debug!(?focus, "focus changed");
                    session.send(ReactEvent::FocusChanged {
                        current_slide: focus.current_slide,
                        current_presentation: focus.current_presentation.clone(),
                    });
                    state.focus = focus;
                }
                state
                    .conversation
                    .extend(results.into_iter().map(Message::ToolResult));
                Phase::Plan
            }
            Phase::Done => {
                tracing::info!(steps, "turn done");
                return Ok(TurnOutput {
                    status: TurnStatus::Done,
                    assistant_messages: produced,
                    state,
                });
            }
        };
    }
}

/// 调用 ID 在对话内必须唯一：与历史或同一回复内重复（或为空）的 ID 换成新生成的 ID
fn ensure_unique_call_ids(history: &[Message], reply: &mut AssistantMessage) {
    let mut seen: HashSet<String> = history
        .iter()
        .filter_map(Message::as_assistant)
        .flat_map(|a| a.calls.iter().map(|c| c.id.clone()))
        .collect();
    for call in &mut reply.calls {
        if call.id.is_empty() || !seen.insert(call.id.clone()) {
            let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
            tracing::warn!(old = %call.id, new = %fresh, tool = %call.name, "reissued duplicate tool call id");
            call.id = fresh.clone();
            seen.insert(fresh);
        }
    }
}

fn observation_event(result: &ToolResult) -> ReactEvent {
    if result.is_ok() {
        let text = result.payload.to_string();
        let preview = if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
            format!("{}...", text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
        } else {
            text
        };
        ReactEvent::Observation {
            tool: result.name.clone(),
            preview,
        }
    } else {
        let reason = result
            .payload
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        ReactEvent::ToolFailure {
            tool: result.name.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm::{LlmClient, LlmError, MockLlmClient, RetryConfig, RetryingLlmClient};
    use crate::memory::{has_no_orphans, is_adjacent, ToolCall};
    use crate::tools::{DeckController, InMemoryLibrary, LoggingViewer, ToolRegistry, ToolSpec};

    fn fixture(llm: Arc<dyn LlmClient>) -> (Planner, ToolExecutor) {
        let retry = RetryConfig {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            request_timeout: None,
        };
        let planner = Planner::new(RetryingLlmClient::new(llm, retry), "test prompt", 10_000);
        let deck = DeckController::new(
            InMemoryLibrary::new().with_deck("deck.pptx", ["Intro", "Agenda", "Results"]),
            LoggingViewer::new(),
        );
        (planner, ToolExecutor::new(ToolRegistry::slide_tools(), deck))
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> AssistantMessage {
        AssistantMessage::with_calls("", vec![ToolCall::new(id, name, args)])
    }

    #[tokio::test]
    async fn test_plain_reply_is_single_step() {
        let mock = Arc::new(MockLlmClient::scripted([AssistantMessage::reply("Hello")]));
        let (planner, executor) = fixture(mock.clone());
        let session = ReactSession::new(&planner, &executor, CancellationToken::new());

        let out = react_loop(&session, &SessionState::new(), "hi").await.unwrap();
        assert_eq!(out.status, TurnStatus::Done);
        assert_eq!(out.reply(), Some("Hello"));
        assert_eq!(out.state.conversation.len(), 2);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_calls_update_focus_and_history() {
        let mock = Arc::new(MockLlmClient::scripted([
            call("c1", "open_presentation", json!({"query": "deck.pptx"})),
            call("c2", "open_slide", json!({"slide_number": 3})),
            AssistantMessage::reply("Showing slide 3"),
        ]));
        let (planner, executor) = fixture(mock.clone());
        let session = ReactSession::new(&planner, &executor, CancellationToken::new());

        let out = react_loop(&session, &SessionState::new(), "open deck, slide 3").await.unwrap();
        assert_eq!(out.status, TurnStatus::Done);
        assert_eq!(out.state.current_presentation(), Some("deck.pptx"));
        assert_eq!(out.state.current_slide(), Some(3));
        assert_eq!(out.assistant_messages.len(), 3);
        assert_eq!(out.state.conversation.len(), 6);
        assert!(is_adjacent(&out.state.conversation));
        assert!(has_no_orphans(&out.state.conversation));
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let mock = Arc::new(MockLlmClient::scripted([
            call("c1", "open_presentation", json!({"query": "missing.pptx"})),
            AssistantMessage::reply("not found"),
        ]));
        let (planner, executor) = fixture(mock);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = ReactSession::new(&planner, &executor, CancellationToken::new()).with_event_tx(&tx);

        react_loop(&session, &SessionState::new(), "open missing").await.unwrap();
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert!(matches!(events[0], ReactEvent::StepUpdate { step: 1, .. }));
        assert_eq!(events[1], ReactEvent::Thinking);
        assert!(matches!(&events[2], ReactEvent::ToolCall { tool, .. } if tool == "open_presentation"));
        assert!(matches!(&events[3], ReactEvent::ToolFailure { reason, .. } if reason.contains("missing.pptx")));
        assert_eq!(
            events.last(),
            Some(&ReactEvent::MessageDone { text: "not found".into() })
        );
    }

    #[tokio::test]
    async fn test_max_steps_exceeded() {
        let mock = Arc::new(MockLlmClient::new());
        for i in 0..5 {
            mock.push_reply(call(&format!("c{i}"), "list_presentations", json!({})));
        }
        let (planner, executor) = fixture(mock.clone());
        let session = ReactSession::new(&planner, &executor, CancellationToken::new()).with_max_steps(3);

        let out = react_loop(&session, &SessionState::new(), "loop").await.unwrap();
        assert_eq!(out.status, TurnStatus::MaxStepsExceeded { steps: 3 });
        assert_eq!(out.reply(), None);
        assert_eq!(mock.request_count(), 3);
        assert!(is_adjacent(&out.state.conversation));
    }

    #[tokio::test]
    async fn test_cancelled_before_plan() {
        let mock = Arc::new(MockLlmClient::new());
        let (planner, executor) = fixture(mock.clone());
        let token = CancellationToken::new();
        token.cancel();
        let session = ReactSession::new(&planner, &executor, token);

        let err = react_loop(&session, &SessionState::new(), "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let (planner, executor) = fixture(Arc::new(MockLlmClient::new()));
        let session = ReactSession::new(&planner, &executor, CancellationToken::new());
        let err = react_loop(&session, &SessionState::new(), "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_llm_failure_leaves_state_untouched() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Auth("bad key".into()));
        let (planner, executor) = fixture(mock);
        let session = ReactSession::new(&planner, &executor, CancellationToken::new());

        let before = SessionState::new();
        let err = react_loop(&session, &before, "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Auth(_))));
        assert!(before.conversation.is_empty());
    }

    /// 每次调用都先触发取消，再按脚本回复
    struct CancelOnCall {
        inner: MockLlmClient,
        token: CancellationToken,
    }

    #[async_trait]
    impl LlmClient for CancelOnCall {
        async fn complete(
            &self,
            messages: &[Message],
            tools: &[ToolSpec],
        ) -> Result<AssistantMessage, LlmError> {
            self.token.cancel();
            self.inner.complete(messages, tools).await
        }
    }

    #[tokio::test]
    async fn test_cancel_after_act_keeps_completed_work() {
        let token = CancellationToken::new();
        let llm = Arc::new(CancelOnCall {
            inner: MockLlmClient::scripted([call("c1", "open_presentation", json!({"query": "deck.pptx"}))]),
            token: token.clone(),
        });
        let (planner, executor) = fixture(llm);
        let session = ReactSession::new(&planner, &executor, token);

        let out = react_loop(&session, &SessionState::new(), "open deck").await.unwrap();
        assert_eq!(out.status, TurnStatus::Cancelled { steps: 1 });
        assert_eq!(out.reply(), None);
        assert_eq!(out.state.current_presentation(), Some("deck.pptx"));
        assert_eq!(out.state.current_slide(), Some(1));
        assert_eq!(out.state.conversation.len(), 3);
        assert!(is_adjacent(&out.state.conversation));
        assert_eq!(executor.current().await, Some(("deck.pptx".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_reused_call_ids_are_reissued() {
        let mock = Arc::new(MockLlmClient::scripted([
            call("call_0", "list_presentations", json!({})),
            call("call_0", "open_presentation", json!({"query": "deck.pptx"})),
            AssistantMessage::with_calls(
                "",
                vec![
                    ToolCall::new("dup", "next_slide", json!({})),
                    ToolCall::new("dup", "next_slide", json!({})),
                ],
            ),
            AssistantMessage::reply("done"),
        ]));
        let (planner, executor) = fixture(mock.clone());
        let session = ReactSession::new(&planner, &executor, CancellationToken::new());

        let out = react_loop(&session, &SessionState::new(), "go").await.unwrap();
        let ids: Vec<&str> = out
            .assistant_messages
            .iter()
            .flat_map(|a| a.calls.iter().map(|c| c.id.as_str()))
            .collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], "call_0");
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
        assert_eq!(out.state.current_slide(), Some(3));

        let last_prompt = mock.requests().pop().unwrap();
        assert!(is_adjacent(&last_prompt[1..]));
        assert_eq!(last_prompt.iter().filter(|m| m.as_tool_result().is_some()).count(), 4);
    }
}
