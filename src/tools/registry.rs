//! 工具注册表
//!
//! 名称 -> SlideTool 的固定映射；invoke 按名称分发，未知工具也返回 status=error 的结果，永不抛错。

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::tools::{DeckController, SlideTool, ToolSpec};

/// 工具注册表
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, SlideTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部幻灯片工具
    pub fn slide_tools() -> Self {
        let mut registry = Self::new();
        for tool in SlideTool::ALL {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: SlideTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<SlideTool> {
        self.tools.get(name).copied()
    }

    pub fn invoke(&self, deck: &mut DeckController, name: &str, args: Value) -> Value {
        match self.get(name) {
            Some(tool) => tool.invoke(deck, args),
            None => json!({ "status": "error", "message": format!("Unknown tool: {name}") }),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 发给模型的 function 定义
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(SlideTool::spec).collect()
    }

    /// 工具定义的 JSON（便于日志与调试）
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.specs()).unwrap_or_else(|_| "[]".to_string())
    }
}
