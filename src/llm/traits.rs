//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：给定对话与可用工具，返回一条 Assistant 消息。
//! LlmError 区分可重试（网络、超时、限流、5xx）与不可重试（鉴权、4xx、请求构造失败、服务端业务错误、响应格式错误）。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{AssistantMessage, Message};
use crate::tools::ToolSpec;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 是否属于瞬时故障，可由 RetryingLlmClient 重试
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::Timeout(_) | LlmError::RateLimited { .. } => true,
            LlmError::Provider { status, .. } => *status >= 500 || *status == 408,
            LlmError::Auth(_)
            | LlmError::InvalidRequest(_)
            | LlmError::Api(_)
            | LlmError::InvalidResponse(_) => false,
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 单次调用：messages 已是最终发送序列（System 在首位），tools 为可调用的函数定义
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Transport("reset".into()).is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(LlmError::RateLimited { retry_after_ms: Some(1000) }.is_retryable());
        assert!(LlmError::Provider { status: 503, message: "busy".into() }.is_retryable());
        assert!(!LlmError::Provider { status: 400, message: "bad".into() }.is_retryable());
        assert!(!LlmError::Auth("401".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("no choices".into()).is_retryable());
        assert!(!LlmError::InvalidRequest("missing model".into()).is_retryable());
        assert!(!LlmError::Api("quota exceeded".into()).is_retryable());
    }
}
