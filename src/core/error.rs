//! Agent 错误类型
//!
//! 只有模型调用重试耗尽、入口参数非法、取消与配置错误会作为错误返回；
//! 工具失败与孤儿结果都在对话内部消化（错误结果 / 静默丢弃）。

use thiserror::Error;

use crate::llm::LlmError;

/// 一次 turn 中可能向调用方抛出的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 模型调用失败（重试耗尽或不可重试）
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}
