//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预置的回复或错误，并记录每次收到的完整消息序列；
//! 脚本用尽后回显最后一条 Human 消息作为最终回复，便于本地跑通 PLAN/ACT 流程。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{AssistantMessage, Message};
use crate::tools::ToolSpec;

/// 脚本化 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<AssistantMessage, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定的回复序列构造
    pub fn scripted(replies: impl IntoIterator<Item = AssistantMessage>) -> Self {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: AssistantMessage) {
        self.lock_script().push_back(Ok(reply));
    }

    pub fn push_error(&self, err: LlmError) {
        self.lock_script().push_back(Err(err));
    }

    /// 已收到的请求（每次调用的完整消息序列）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<AssistantMessage, LlmError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        if let Some(next) = self.lock_script().pop_front() {
            return next;
        }
        let last_human = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::Human { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("(no input)");
        Ok(AssistantMessage::reply(format!("Echo from Mock: {last_human}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_echo() {
        let mock = MockLlmClient::scripted([AssistantMessage::reply("first")]);
        let msgs = [Message::human("hello")];
        assert_eq!(mock.complete(&msgs, &[]).await.unwrap().text, "first");
        assert_eq!(
            mock.complete(&msgs, &[]).await.unwrap().text,
            "Echo from Mock: hello"
        );
        assert_eq!(mock.request_count(), 2);
    }
}
