//! 会话监管：多会话状态、串行 turn 与中断管理
//!
//! 每个会话的状态放在各自的 tokio Mutex 后面，同一会话同一时刻只跑一个 turn；
//! 不同会话可并发（共享同一个 Agent 与演示文稿句柄，ACT 步骤由 ToolExecutor 串行化）。
//! 每个 turn 使用根 token 的子 token：cancel(id) 只中断该会话当前 turn，shutdown() 中断全部。
//! 取消在下一次 PLAN 前生效；被取消的 turn 已完成的 ACT 结果照常写回会话状态。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc::UnboundedSender, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::core::{AgentError, SessionState, TurnOutput};
use crate::react::ReactEvent;

pub type SessionId = String;

#[derive(Debug, Default)]
struct SessionSlot {
    state: Mutex<SessionState>,
    /// 当前（或最近一次）turn 的取消令牌
    turn_token: std::sync::Mutex<Option<CancellationToken>>,
}

impl SessionSlot {
    fn set_turn_token(&self, token: Option<CancellationToken>) {
        let mut guard = self.turn_token.lock().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }
}

/// 进程内会话表
#[derive(Debug)]
pub struct SessionSupervisor {
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
    /// 关闭进程时触发
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cancel_token: CancellationToken::new(),
        }
    }

    /// 新建空会话，返回其 id
    pub async fn create(&self) -> SessionId {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(SessionSlot::default()));
        tracing::info!(session = %id, "session created");
        id
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 会话状态快照（turn 进行中时等待其结束）
    pub async fn snapshot(&self, id: &str) -> Result<SessionState, AgentError> {
        let slot = self.slot(id).await?;
        let state = slot.state.lock().await;
        Ok(state.clone())
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if let Some(slot) = &removed {
            if let Ok(guard) = slot.turn_token.lock() {
                if let Some(token) = guard.as_ref() {
                    token.cancel();
                }
            }
        }
        removed.is_some()
    }

    /// 中断该会话正在进行的 turn（在下一次 PLAN 前生效）；没有进行中的 turn 时返回 false
    pub async fn cancel(&self, id: &str) -> Result<bool, AgentError> {
        let slot = self.slot(id).await?;
        let guard = slot.turn_token.lock().unwrap_or_else(|e| e.into_inner());
        let cancelled = match guard.as_ref() {
            Some(token) => {
                token.cancel();
                tracing::info!(session = %id, "turn cancel requested");
                true
            }
            None => false,
        };
        Ok(cancelled)
    }

    /// 中断所有会话的 turn，之后的 turn 一开始即被取消
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub async fn run_turn(&self, agent: &Agent, id: &str, user_text: &str) -> Result<TurnOutput, AgentError> {
        self.run_turn_with(agent, id, user_text, None).await
    }

    /// 在会话上跑一个 turn：返回 Ok（含 Cancelled / MaxStepsExceeded）时替换会话状态，失败时状态保持不变
    pub async fn run_turn_with(
        &self,
        agent: &Agent,
        id: &str,
        user_text: &str,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> Result<TurnOutput, AgentError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;

        let token = self.cancel_token.child_token();
        slot.set_turn_token(Some(token.clone()));
        let result = agent.run_turn_with(&state, user_text, token, event_tx).await;
        slot.set_turn_token(None);

        let out = result?;
        *state = out.state.clone();
        Ok(out)
    }

    async fn slot(&self, id: &str) -> Result<Arc<SessionSlot>, AgentError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::UnknownSession(id.to_string()))
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
