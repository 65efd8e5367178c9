//! Deckhand - 幻灯片放映智能体
//!
//! 入口：初始化日志、按配置创建 Agent，并运行命令行对话循环（exit / quit 退出，Ctrl+C 中断当前 turn）。

use std::path::PathBuf;

use anyhow::Context;
use deckhand::{
    agent::create_agent,
    core::{SessionState, SessionSupervisor, TurnStatus},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    deckhand::observability::init();

    // 可选：第一个参数为额外的配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let agent = create_agent(config_path).context("Failed to create agent")?;

    let supervisor = SessionSupervisor::new();
    let session = supervisor.create().await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        // Ctrl+C 只请求取消：正在执行的工具批次跑完并写回状态，下一次 PLAN 前停止
        let turn = supervisor.run_turn(&agent, &session, input);
        tokio::pin!(turn);
        let output = loop {
            tokio::select! {
                res = &mut turn => break res,
                _ = tokio::signal::ctrl_c() => {
                    match supervisor.cancel(&session).await {
                        Ok(true) => println!("(cancelling after the current step)"),
                        Ok(false) => {}
                        Err(e) => tracing::warn!(error = %e, "cancel failed"),
                    }
                }
            }
        };

        match output {
            Ok(out) => {
                for text in out.assistant_texts() {
                    println!("{text}");
                }
                match out.status {
                    TurnStatus::MaxStepsExceeded { steps } => {
                        println!("(stopped after {steps} steps without a final answer)")
                    }
                    TurnStatus::Cancelled { steps } => println!("(cancelled after {steps} steps)"),
                    TurnStatus::Done => {}
                }
                print_focus(&out.state);
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("Error: {e}");
            }
        }
    }

    supervisor.shutdown();
    let (prompt, completion, total) = agent.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}

fn print_focus(state: &SessionState) {
    println!(
        "[presentation: {} | slide: {}]",
        state.current_presentation().unwrap_or("none"),
        state
            .current_slide()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
}
