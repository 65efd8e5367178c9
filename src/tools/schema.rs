//! 工具参数 JSON Schema 生成（schemars）
//!
//! 参数结构体派生 JsonSchema，生成的 schema 作为 function 定义发给模型；
//! 同一结构体派生 Deserialize，用于执行前的参数校验。

use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::{json, Value};

/// 发给模型的工具定义
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 生成参数 schema，去掉 `$schema` / `title` 元信息，并保证存在 properties
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    value
}
