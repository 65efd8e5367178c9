//! Token 计数
//!
//! 裁剪器只依赖 TokenCounter trait；默认实现 TokenEstimator 用字符数近似，
//! 工具参数与结果按 JSON 文本计数，并为每条消息 / 每个工具调用加固定开销。

use crate::memory::Message;

/// 每条消息的角色与格式开销
const MESSAGE_OVERHEAD_TOKENS: usize = 4;
/// 每个工具调用的结构开销（id / type / function 包装）
const TOOL_CALL_OVERHEAD_TOKENS: usize = 10;

/// 消息 token 计数器
pub trait TokenCounter: Send + Sync {
    fn count(&self, message: &Message) -> usize;

    fn count_all(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count(m)).sum()
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&Message) -> usize + Send + Sync,
{
    fn count(&self, message: &Message) -> usize {
        self(message)
    }
}

/// Token 估算器（简单的字符计数近似）
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量
    /// 英文约 4 字符/token，西里尔 / 中文等非 ASCII 约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let (ascii, non_ascii) = text.chars().fold((0usize, 0usize), |(a, n), c| {
            if c.is_ascii() {
                (a + 1, n)
            } else {
                (a, n + 1)
            }
        });
        let tokens = ascii.div_ceil(4) + (non_ascii as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

impl TokenCounter for TokenEstimator {
    fn count(&self, message: &Message) -> usize {
        let body = match message {
            Message::System { text } | Message::Human { text } => Self::estimate(text),
            Message::Assistant(a) => {
                Self::estimate(&a.text)
                    + a.calls
                        .iter()
                        .map(|c| {
                            TOOL_CALL_OVERHEAD_TOKENS
                                + Self::estimate(&c.name)
                                + Self::estimate(&c.arguments.to_string())
                        })
                        .sum::<usize>()
            }
            Message::ToolResult(r) => Self::estimate(&r.payload.to_string()),
        };
        MESSAGE_OVERHEAD_TOKENS + body
    }
}
