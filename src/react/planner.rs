//! Planner：拼装发送给模型的对话并调用模型
//!
//! 发送序列 = System（基础 prompt + 当前演示文稿信息）+ reconcile(trim(历史))。
//! 历史先重整一次再裁剪，裁剪后再重整一次以修复新边界上的孤儿结果。

use std::sync::Arc;

use crate::core::SlideFocus;
use crate::llm::{LlmError, RetryingLlmClient};
use crate::memory::{reconcile, trim, AssistantMessage, Message, TokenCounter, TokenEstimator};
use crate::tools::ToolSpec;

/// 未配置 prompt 文件时使用的系统提示词
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a presentation assistant. You control a slide viewer \
with the available tools: list presentations, open a presentation, open a slide by number, go to the \
next or previous slide, list slides with their text and close the presentation. Call tools when the \
user asks to show something, use slide texts to answer questions about the content, and reply briefly \
once the request is fulfilled.";

/// Planner：持有带重试的 LLM、基础 system prompt 与上下文预算
pub struct Planner {
    llm: RetryingLlmClient,
    system_prompt: String,
    token_budget: usize,
    counter: Arc<dyn TokenCounter>,
}

impl Planner {
    pub fn new(llm: RetryingLlmClient, system_prompt: impl Into<String>, token_budget: usize) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            token_budget,
            counter: Arc::new(TokenEstimator),
        }
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 基础 prompt + 当前演示文稿 / 幻灯片信息
    pub fn system_message(&self, focus: &SlideFocus) -> Message {
        let presentation = focus.current_presentation.as_deref().unwrap_or("none");
        let slide = focus
            .current_slide
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string());
        Message::system(format!(
            "{}\n\nCurrent presentation: {}\nCurrent slide: {}",
            self.system_prompt, presentation, slide
        ))
    }

    /// 构造本次 PLAN 实际发送的消息序列
    pub fn build_prompt(&self, history: &[Message], focus: &SlideFocus) -> Vec<Message> {
        let mut conversation = vec![self.system_message(focus)];
        conversation.extend(reconcile(history));
        let window = trim(&conversation, self.token_budget, self.counter.as_ref());
        reconcile(&window)
    }

    pub async fn plan(
        &self,
        history: &[Message],
        focus: &SlideFocus,
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError> {
        let prompt = self.build_prompt(history, focus);
        tracing::debug!(messages = prompt.len(), "planning");
        self.llm.invoke(&prompt, tools).await
    }
}
