//! 会话状态追踪：按顺序折叠一次 ACT 产生的工具结果，得到新的 SlideFocus
//!
//! 纯函数，同一批次内后写覆盖先写；非 ok 状态、无关工具、缺字段的结果都不改变状态。

use serde_json::Value;

use crate::core::SlideFocus;
use crate::memory::ToolResult;
use crate::tools::SlideTool;

pub fn apply(prior: &SlideFocus, results: &[ToolResult]) -> SlideFocus {
    results.iter().fold(prior.clone(), |mut focus, result| {
        if !result.is_ok() {
            return focus;
        }
        match SlideTool::from_name(&result.name) {
            Some(SlideTool::OpenPresentation) => {
                if let Some(name) = result.payload.get("presentation_name").and_then(Value::as_str) {
                    focus.current_presentation = Some(name.to_string());
                    focus.current_slide = Some(1);
                }
            }
            Some(SlideTool::ClosePresentation) => {
                focus.current_presentation = None;
                focus.current_slide = None;
            }
            Some(SlideTool::OpenSlide | SlideTool::NextSlide | SlideTool::PreviousSlide) => {
                if let Some(n) = slide_number(&result.payload) {
                    focus.current_slide = Some(n);
                }
            }
            _ => {}
        }
        focus
    })
}

fn slide_number(payload: &Value) -> Option<u32> {
    payload
        .get("slide_number")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n >= 1)
}
