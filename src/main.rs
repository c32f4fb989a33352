//! Steward - 个人效率助手命令行
//!
//! 入口：初始化日志、加载配置、构建 Supervisor 编排器；标准输入每行即一轮对话，
//! 过程事件实时打印，最终回复流式输出。
//!
//! 用法：steward [--config <path>] [--thread <id>] [--user <id>]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use steward::config::{load_config, AppConfig};
use steward::core::{SupervisorBuilder, SupervisorContext};
use steward::observability;
use steward::store::InMemoryStore;
use steward::supervisor::SupervisorEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    thread: Option<String>,
    user: Option<i64>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = CliArgs::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(it.next().context("--config 需要路径")?)),
            "--thread" => args.thread = Some(it.next().context("--thread 需要会话 ID")?),
            "--user" => {
                let raw = it.next().context("--user 需要用户 ID")?;
                args.user = Some(raw.parse().with_context(|| format!("无效的用户 ID: {}", raw))?);
            }
            other => bail!("未知参数: {}（用法: steward [--config <path>] [--thread <id>] [--user <id>]）", other),
        }
    }
    Ok(args)
}

fn print_event(ev: SupervisorEvent) {
    match ev {
        SupervisorEvent::NodeEnter { node } => eprintln!("  · {}", node),
        SupervisorEvent::Classified {
            needs_business_data,
            reason,
        } => eprintln!("  意图: 需要业务数据={} ({})", needs_business_data, reason),
        SupervisorEvent::PlanReady {
            summary,
            steps,
            fallback,
        } => eprintln!(
            "  计划: {} ({} 步{})",
            summary,
            steps,
            if fallback { "，默认计划" } else { "" }
        ),
        SupervisorEvent::StepDispatched {
            step,
            agent,
            description,
        } => eprintln!("  → #{} [{}] {}", step + 1, agent, description),
        SupervisorEvent::ToolCall { tool, args, .. } => eprintln!("    🔧 {} {}", tool, args),
        SupervisorEvent::ToolResult { ok, preview, .. } => {
            eprintln!("    {} {}", if ok { "✓" } else { "✗" }, preview)
        }
        SupervisorEvent::FrontendTool { action } => eprintln!("    ↻ {}", action),
        SupervisorEvent::StepRecorded {
            step,
            agent,
            success,
        } => eprintln!("  {} #{} [{}]", if success { "✓" } else { "✗" }, step + 1, agent),
        SupervisorEvent::MessageChunk { text } => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        SupervisorEvent::MessageDone => println!(),
        SupervisorEvent::Error { text } => println!("{}", text),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = parse_args()?;
    let cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let context = SupervisorContext::from_config(cfg);
    let orchestrator = SupervisorBuilder::new(context)
        .with_store(Arc::new(InMemoryStore::new()))
        .build()
        .await
        .context("Failed to build supervisor")?;

    let mut thread_id = args
        .thread
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("Steward 已就绪（会话 {}）。输入 /new 开始新会话，/quit 退出。", thread_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let text = line.trim();
        match text {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                thread_id = uuid::Uuid::new_v4().to_string();
                println!("已开始新会话 {}", thread_id);
                continue;
            }
            _ => {}
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                print_event(ev);
            }
        });
        let outcome = orchestrator
            .handle_turn_stream(&thread_id, text, args.user, tx)
            .await;
        let _ = printer.await;
        tracing::debug!(status = ?outcome.status, steps = outcome.state.execution_results.len(), "turn finished");
    }

    let (prompt, completion, total) = orchestrator.llm().token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
