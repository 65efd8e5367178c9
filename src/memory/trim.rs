//! 上下文窗口裁剪
//!
//! 保留最近的消息直到 token 预算用尽：窗口总是从 Human 消息开始，不会拆开任何消息；
//! System 消息只要单独放得下就保留在首位。若最新一轮本身已超预算，仍保留最新一轮（fail open），
//! 由更大窗口的后续调用决定是否可用，不在此层报错。
//!
//! 裁剪可能留下失去调用方的 ToolResult，调用方需对结果再做一次 reconcile。

use crate::memory::{Message, TokenCounter};

/// 按 token 预算裁剪对话，返回后缀偏向的子序列
pub fn trim(conversation: &[Message], budget: usize, counter: &dyn TokenCounter) -> Vec<Message> {
    let (system, rest) = match conversation.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, conversation),
    };
    // System 只允许出现在首位
    let rest: Vec<&Message> = rest.iter().filter(|m| !m.is_system()).collect();

    let system_tokens = system.map(|s| counter.count(s)).unwrap_or(0);
    let keep_system = system.is_some() && system_tokens <= budget;
    let remaining = if keep_system {
        budget - system_tokens
    } else {
        budget
    };

    let mut total = 0usize;
    let mut start = None;
    for (i, msg) in rest.iter().enumerate().rev() {
        total += counter.count(msg);
        if total > remaining {
            break;
        }
        if msg.is_human() {
            start = Some(i);
        }
    }

    let start = match start {
        Some(i) => Some(i),
        None => {
            let newest = rest.iter().rposition(|m| m.is_human());
            if newest.is_some() {
                tracing::warn!(budget, "newest turn exceeds token budget, keeping it anyway");
            }
            newest
        }
    };

    let mut out = Vec::with_capacity(rest.len() + 1);
    if keep_system {
        if let Some(s) = system {
            out.push(s.clone());
        }
    }
    if let Some(i) = start {
        out.extend(rest[i..].iter().map(|m| (*m).clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{has_no_orphans, is_adjacent, reconcile, results_follow_calls, ToolCall};
    use serde_json::json;

    fn ten(_: &Message) -> usize {
        10
    }

    fn turn(i: usize) -> Vec<Message> {
        let id = format!("c{i}");
        vec![
            Message::human(format!("q{i}")),
            Message::assistant_with_calls("", vec![ToolCall::new(id.clone(), "next_slide", json!({}))]),
            Message::tool_result(id, "next_slide", json!({"status": "ok", "slide_number": i})),
            Message::assistant(format!("a{i}")),
        ]
    }

    fn conversation(turns: usize) -> Vec<Message> {
        let mut c = vec![Message::system("sys")];
        for i in 0..turns {
            c.extend(turn(i));
        }
        c
    }

    #[test]
    fn test_everything_fits() {
        let c = conversation(2);
        assert_eq!(trim(&c, 1000, &ten), c);
    }

    #[test]
    fn test_keeps_system_and_starts_on_human() {
        let c = conversation(3);
        // system 10 + 一轮 40 = 50；预算 75 只够最后一轮
        let out = trim(&c, 75, &ten);
        assert_eq!(out.len(), 5);
        assert!(out[0].is_system());
        assert_eq!(out[1], Message::human("q2"));
        assert!(ten.count_all(&out) <= 75);
    }

    #[test]
    fn test_fails_open_on_oversized_newest_turn() {
        let c = conversation(2);
        let out = trim(&c, 25, &ten);
        assert!(out[0].is_system());
        assert_eq!(out[1], Message::human("q1"));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_system_dropped_when_it_alone_exceeds() {
        let c = vec![Message::system("a very long system prompt"), Message::human("hi")];
        let counter = |m: &Message| if m.is_system() { 100usize } else { 5 };
        let out = trim(&c, 50, &counter);
        assert_eq!(out, vec![Message::human("hi")]);
    }

    #[test]
    fn test_stray_system_messages_removed() {
        let c = vec![
            Message::system("sys"),
            Message::human("a"),
            Message::system("late"),
            Message::assistant("b"),
        ];
        let out = trim(&c, 1000, &ten);
        assert_eq!(out.iter().filter(|m| m.is_system()).count(), 1);
        assert!(out[0].is_system());
    }

    #[test]
    fn test_trim_then_reconcile_keeps_invariants() {
        // 交错历史：结果落在后续 Human 之后，裁剪边界切在调用与结果之间
        let mut c = conversation(1);
        c.push(Message::assistant_with_calls(
            "",
            vec![ToolCall::new("late", "open_slide", json!({"slide_number": 2}))],
        ));
        c.push(Message::human("then"));
        c.push(Message::tool_result("late", "open_slide", json!({"status": "ok"})));
        c.push(Message::tool_result("c0", "next_slide", json!({"status": "ok"})));

        for budget in [0, 10, 20, 30, 45, 60, 80, 1000] {
            let out = reconcile(&trim(&c, budget, &ten));
            assert!(is_adjacent(&out), "budget {budget}");
            assert!(has_no_orphans(&out), "budget {budget}");
            assert!(out.iter().skip(1).all(|m| !m.is_system()));
        }
    }

    fn permutations(items: &[Message]) -> Vec<Vec<Message>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_every_interleaving_and_budget() {
        let items = vec![
            Message::human("a"),
            Message::human("b"),
            Message::assistant_with_calls(
                "",
                vec![
                    ToolCall::new("x", "open_slide", json!({"slide_number": 1})),
                    ToolCall::new("y", "next_slide", json!({})),
                ],
            ),
            Message::tool_result("x", "open_slide", json!({"status": "ok", "slide_number": 1})),
            Message::tool_result("y", "next_slide", json!({"status": "ok", "slide_number": 2})),
            Message::tool_result("z", "next_slide", json!({"status": "ok"})),
        ];

        for perm in permutations(&items) {
            let mut c = vec![Message::system("sys")];
            c.extend(perm.iter().cloned());
            let newest_human = perm.iter().rposition(|m| m.is_human()).unwrap();

            for budget in (0..=80).step_by(5) {
                let out = trim(&c, budget, &ten);

                // 只能整条保留：除 System 外是输入的一个后缀，且从 Human 开始
                let body = if out.first().is_some_and(|m| m.is_system()) { &out[1..] } else { &out[..] };
                assert!(perm.ends_with(body), "not a suffix: {perm:?} @ {budget}");
                assert!(body.first().is_some_and(|m| m.is_human()), "{perm:?} @ {budget}");
                if ten.count_all(&out) > budget {
                    assert_eq!(body, &perm[newest_human..], "fail-open window: {perm:?} @ {budget}");
                }

                let window = reconcile(&out);
                assert!(results_follow_calls(&window), "{perm:?} @ {budget}");
                assert!(has_no_orphans(&window), "{perm:?} @ {budget}");
                assert!(window.iter().skip(1).all(|m| !m.is_system()));

                // 先重整再裁剪（Planner 的顺序）时，窗口满足严格相邻
                let planned = reconcile(&trim(&reconcile(&c), budget, &ten));
                assert!(is_adjacent(&planned), "{perm:?} @ {budget}");
                assert!(has_no_orphans(&planned), "{perm:?} @ {budget}");
            }
        }
    }
}
