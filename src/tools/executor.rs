//! 工具执行器
//!
//! 持有 ToolRegistry 与唯一的 DeckController。一次 ACT 的整批调用在同一把锁内、
//! 于阻塞线程上按声明顺序执行，每个调用恰好产生一个 ToolResult；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::memory::{ToolCall, ToolResult};
use crate::tools::{DeckController, ToolRegistry, ToolSpec};

/// 工具执行器：串行化对演示文稿句柄的访问
pub struct ToolExecutor {
    registry: ToolRegistry,
    deck: Arc<Mutex<DeckController>>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, deck: DeckController) -> Self {
        Self {
            registry,
            deck: Arc::new(Mutex::new(deck)),
        }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 当前打开的文稿名与页码（从 1 开始）
    pub async fn current(&self) -> Option<(String, usize)> {
        let deck = self.deck.lock().await;
        deck.current().map(|(name, slide)| (name.to_string(), slide))
    }

    /// 按声明顺序执行整批调用；执行线程异常时，整批调用都得到错误结果
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut deck = Arc::clone(&self.deck).lock_owned().await;
        let registry = self.registry.clone();
        let batch = calls.to_vec();
        let handle = tokio::task::spawn_blocking(move || {
            batch
                .iter()
                .map(|call| execute_one(&registry, &mut deck, call))
                .collect::<Vec<_>>()
        });
        match handle.await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "tool batch aborted");
                calls
                    .iter()
                    .map(|c| ToolResult::error(&c.id, &c.name, format!("tool execution aborted: {e}")))
                    .collect()
            }
        }
    }
}

fn execute_one(registry: &ToolRegistry, deck: &mut DeckController, call: &ToolCall) -> ToolResult {
    let start = Instant::now();
    let payload = registry.invoke(deck, &call.name, call.arguments.clone());
    let result = ToolResult::new(&call.id, &call.name, payload);

    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": call.name,
        "call_id": call.id,
        "ok": result.is_ok(),
        "outcome": result.status().unwrap_or("unknown"),
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(&call.arguments),
    });
    tracing::info!(audit = %audit.to_string(), "tool");
    result
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
