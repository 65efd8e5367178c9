//! 记忆层：对话消息模型、消息重整、上下文裁剪与 token 计数

pub mod conversation;
pub mod reconcile;
pub mod token_budget;
pub mod trim;

pub use conversation::{AssistantMessage, Message, ToolCall, ToolResult};
pub use reconcile::{has_no_orphans, is_adjacent, reconcile, results_follow_calls};
pub use token_budget::{TokenCounter, TokenEstimator};
pub use trim::trim;
