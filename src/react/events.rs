//! PLAN/ACT 过程事件：用于流式展示思考、工具调用、观察与回复

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 步数更新（当前第几次 PLAN）
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用 LLM
    Thinking,
    /// 调用工具
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具返回 status=error
    ToolFailure { tool: String, reason: String },
    /// 当前幻灯片 / 演示文稿发生变化
    FocusChanged {
        current_slide: Option<u32>,
        current_presentation: Option<String>,
    },
    /// 最终回复
    MessageDone { text: String },
    /// 错误
    Error { text: String },
}
