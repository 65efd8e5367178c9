//! 消息重整（Reconcile）
//!
//! 将乱序 / 交错的历史恢复为因果有效的序列：
//! - 每条带工具调用的 Assistant 之后紧跟其全部 ToolResult，顺序与调用声明顺序一致；
//! - call_id 找不到对应调用的 ToolResult（孤儿）直接丢弃，不再插回任何位置。
//!
//! 幂等：`reconcile(&reconcile(x)) == reconcile(x)`。

use std::collections::{HashMap, HashSet};

use crate::memory::{Message, ToolResult};

/// 重整历史，输出满足「调用-结果相邻」与「无孤儿结果」两条不变式
pub fn reconcile(history: &[Message]) -> Vec<Message> {
    // 1) 记录所有出现过的调用 ID
    let known: HashSet<&str> = history
        .iter()
        .filter_map(Message::as_assistant)
        .flat_map(|a| a.calls.iter().map(|c| c.id.as_str()))
        .collect();

    // 2) 从主序列摘出 ToolResult，按 call_id 分桶；同一 call_id 只保留最先出现的一条
    let mut pending: HashMap<&str, &ToolResult> = HashMap::new();
    let mut linear: Vec<&Message> = Vec::with_capacity(history.len());
    for msg in history {
        match msg {
            Message::ToolResult(r) => {
                if !known.contains(r.call_id.as_str()) {
                    tracing::debug!(call_id = %r.call_id, tool = %r.name, "dropping orphan tool result");
                } else if pending.contains_key(r.call_id.as_str()) {
                    tracing::debug!(call_id = %r.call_id, tool = %r.name, "dropping duplicate tool result");
                } else {
                    pending.insert(r.call_id.as_str(), r);
                }
            }
            other => linear.push(other),
        }
    }

    // 3) 按原顺序回放，Assistant 之后立即接上其结果
    let mut out = Vec::with_capacity(history.len());
    for msg in linear {
        out.push(msg.clone());
        if let Message::Assistant(a) = msg {
            for call in &a.calls {
                if let Some(r) = pending.remove(call.id.as_str()) {
                    out.push(Message::ToolResult(r.clone()));
                }
            }
        }
    }

    // 4) pending 中剩余项（所属 Assistant 已不在序列中）直接丢弃
    out
}

/// 检查「调用-结果相邻」不变式：每条带 n 个调用的 Assistant 之后紧跟恰好 n 条 ToolResult，
/// call_id 与调用声明顺序一一对应；其它位置不得出现 ToolResult
pub fn is_adjacent(conversation: &[Message]) -> bool {
    let mut i = 0;
    while i < conversation.len() {
        match &conversation[i] {
            Message::Assistant(a) => {
                let mut j = i + 1;
                for call in &a.calls {
                    match conversation.get(j) {
                        Some(Message::ToolResult(r)) if r.call_id == call.id => j += 1,
                        _ => return false,
                    }
                }
                i = j;
            }
            Message::ToolResult(_) => return false,
            _ => i += 1,
        }
    }
    true
}

/// 放宽的相邻检查：允许 Assistant 的部分调用没有结果（结果在裁剪窗口之外），
/// 但出现的结果仍须紧跟所属 Assistant 且按声明顺序，不得错序或多余
pub fn results_follow_calls(conversation: &[Message]) -> bool {
    let mut i = 0;
    while i < conversation.len() {
        match &conversation[i] {
            Message::Assistant(a) => {
                let mut j = i + 1;
                let mut calls = a.calls.iter();
                while let Some(Message::ToolResult(r)) = conversation.get(j) {
                    if !calls.by_ref().any(|c| c.id == r.call_id) {
                        return false;
                    }
                    j += 1;
                }
                i = j;
            }
            Message::ToolResult(_) => return false,
            _ => i += 1,
        }
    }
    true
}

/// 检查「无孤儿」不变式：每条 ToolResult 之前都出现过对应的调用
pub fn has_no_orphans(conversation: &[Message]) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    for msg in conversation {
        match msg {
            Message::Assistant(a) => seen.extend(a.calls.iter().map(|c| c.id.as_str())),
            Message::ToolResult(r) if !seen.contains(r.call_id.as_str()) => return false,
            _ => {}
        }
    }
    true
}
