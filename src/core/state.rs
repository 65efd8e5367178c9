//! 会话状态：对话历史 + 当前幻灯片焦点
//!
//! SlideFocus 只由 tracker 在工具执行后更新；模型和用户都不能直接改它。

use serde::{Deserialize, Serialize};

use crate::memory::{AssistantMessage, Message};

/// 对外可见的派生事实：当前幻灯片（从 1 开始）与当前演示文稿
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideFocus {
    pub current_slide: Option<u32>,
    pub current_presentation: Option<String>,
}

impl SlideFocus {
    pub fn new(current_slide: Option<u32>, current_presentation: Option<&str>) -> Self {
        Self {
            current_slide,
            current_presentation: current_presentation.map(String::from),
        }
    }
}

/// 单个会话的完整状态，进程内存活
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub conversation: Vec<Message>,
    #[serde(flatten)]
    pub focus: SlideFocus,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_slide(&self) -> Option<u32> {
        self.focus.current_slide
    }

    pub fn current_presentation(&self) -> Option<&str> {
        self.focus.current_presentation.as_deref()
    }
}

/// turn 的终止方式
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnStatus {
    /// 模型给出了不含工具调用的回复
    Done,
    /// 达到单次 turn 的最大步数，模型仍在调用工具
    MaxStepsExceeded { steps: usize },
    /// 调用方在某次 PLAN 前取消；已执行的 ACT 结果保留在状态中
    Cancelled { steps: usize },
}

/// run_turn 的返回：本轮新产生的 Assistant 消息与新的会话状态
#[derive(Clone, Debug)]
pub struct TurnOutput {
    pub status: TurnStatus,
    pub assistant_messages: Vec<AssistantMessage>,
    pub state: SessionState,
}

impl TurnOutput {
    /// 本轮产生的非空助手文本（供前端展示）
    pub fn assistant_texts(&self) -> Vec<&str> {
        self.assistant_messages
            .iter()
            .map(|a| a.text.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// 最终回复（status 为 Done 时为最后一条 Assistant 的文本）
    pub fn reply(&self) -> Option<&str> {
        match self.status {
            TurnStatus::Done => self.assistant_messages.last().map(|a| a.text.as_str()),
            TurnStatus::MaxStepsExceeded { .. } | TurnStatus::Cancelled { .. } => None,
        }
    }
}
