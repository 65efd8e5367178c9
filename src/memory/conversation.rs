//! 对话消息模型
//!
//! 四种消息：System（指令）、Human（用户输入）、Assistant（文本 + 有序工具调用）、
//! ToolResult（按 call_id 关联到某次工具调用的结构化结果）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 模型发起的一次工具调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 对话内唯一的调用 ID
    pub id: String,
    /// 工具名（需在 ToolRegistry 中注册）
    pub name: String,
    /// 结构化参数
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 助手消息：calls 为空表示最终回复
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub calls: Vec<ToolCall>,
}

impl AssistantMessage {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: Vec::new(),
        }
    }

    pub fn with_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            calls,
        }
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

/// 工具执行结果，payload 至少包含 `status` 字段（"ok" | "error"）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub payload: Value,
}

impl ToolResult {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            payload,
        }
    }

    /// 构造错误结果：`{"status": "error", "message": ...}`
    pub fn error(call_id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            call_id,
            name,
            serde_json::json!({ "status": "error", "message": message.into() }),
        )
    }

    pub fn status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status() == Some("ok")
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { text: String },
    Human { text: String },
    Assistant(AssistantMessage),
    ToolResult(ToolResult),
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::Human { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage::reply(text))
    }

    pub fn assistant_with_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self::Assistant(AssistantMessage::with_calls(text, calls))
    }

    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self::ToolResult(ToolResult::new(call_id, name, payload))
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Message::Human { .. })
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Message::Assistant(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Message::ToolResult(r) => Some(r),
            _ => None,
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(a: AssistantMessage) -> Self {
        Message::Assistant(a)
    }
}

impl From<ToolResult> for Message {
    fn from(r: ToolResult) -> Self {
        Message::ToolResult(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serde_tagged_by_role() {
        let msg = Message::assistant_with_calls(
            "",
            vec![ToolCall::new("c1", "open_slide", json!({"slide_number": 2}))],
        );
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["calls"][0]["name"], "open_slide");

        let back: Message = serde_json::from_value(v).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_tool_result_status() {
        let ok = ToolResult::new("c1", "next_slide", json!({"status": "ok", "slide_number": 2}));
        assert!(ok.is_ok());
        let err = ToolResult::error("c2", "next_slide", "no presentation is open");
        assert!(!err.is_ok());
        assert_eq!(err.status(), Some("error"));
    }
}
