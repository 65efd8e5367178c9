//! Deckhand - 幻灯片放映智能体
//!
//! 模块划分：
//! - **agent**: Agent 组装与 run_turn 入口
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、会话状态、状态追踪、多会话监管
//! - **llm**: LLM 客户端抽象、退避重试与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息模型、消息重整、上下文裁剪
//! - **react**: Planner、PLAN / ACT 主循环、过程事件
//! - **tools**: 幻灯片工具、注册表、演示文稿句柄与执行器
//! - **observability**: 日志初始化

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::Agent;
pub use core::{AgentError, SessionState, TurnOutput, TurnStatus};
