//! 带指数退避的模型调用
//!
//! 最多 max_attempts 次；第 k 次失败后等待 `base * 2^(k-1)` 再以完全相同的输入重试，
//! 第一次调用前不等待。不可重试的错误立即返回，重试耗尽时返回最后一次的错误。

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{AssistantMessage, Message};
use crate::tools::ToolSpec;

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 单次调用超时，超时按可重试错误处理
    pub request_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            request_timeout: None,
        }
    }
}

impl RetryConfig {
    /// 第 attempt 次（从 1 开始）失败后的等待时长
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// 包装任意 LlmClient，提供有界重试
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }

    pub async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(messages, tools).await {
                Ok(msg) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "LLM call succeeded after retry");
                    }
                    return Ok(msg);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "LLM call failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError> {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(messages, tools))
                .await
                .unwrap_or(Err(LlmError::Timeout(limit))),
            None => self.inner.complete(messages, tools).await,
        }
    }
}
