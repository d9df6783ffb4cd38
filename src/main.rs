//! Fiesta - 派对策划助理 CLI
//!
//! 入口：初始化日志与组件，进入对话循环。
//! 命令：quit/exit/q 退出，history 查看最近对话，thread:ID 切换线程，
//! resume:文本 在挂起后恢复。

use std::io::{BufRead, Write};

use fiesta::agent::create_agent_components;
use fiesta::config::load_config;
use fiesta::core::AgentError;
use fiesta::store::{is_suspended, recent_messages, Message};
use fiesta::turn::TurnOutcome;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HISTORY_MAX_MESSAGES: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_default();
    let components = create_agent_components(&cfg).await;
    let controller = components.controller.clone();

    println!("Party Planning Assistant");
    println!("Commands: quit | history | thread:ID | resume:your response");

    let mut current_thread = "1".to_string();
    let stdin = std::io::stdin();

    loop {
        print!("\nYou (Thread {}): ", current_thread);
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => {
                println!("Please enter a message or command.");
                continue;
            }
            "quit" | "exit" | "q" => {
                println!("Goodbye!");
                break;
            }
            "history" => {
                show_history(controller.store().as_ref(), &current_thread).await;
                continue;
            }
            _ => {}
        }

        if let Some(id) = input.strip_prefix("thread:") {
            let id = id.trim();
            if id.is_empty() {
                println!("Please provide a thread ID (e.g. 'thread:party1').");
            } else {
                current_thread = id.to_string();
                println!("Switched to thread: {}", current_thread);
            }
            continue;
        }

        if let Some(answer) = input.strip_prefix("resume:") {
            let answer = answer.trim();
            if answer.is_empty() {
                println!("Please provide your response (e.g. 'resume:I think we should invite John').");
                continue;
            }
            match controller.resume(&current_thread, answer).await {
                Ok(TurnOutcome::Completed { reply }) => println!("Assistant: {}", reply),
                Ok(TurnOutcome::WaitingForInput { query }) => {
                    println!("Human assistance requested again: {}", query);
                    println!("Use 'resume:your response' to continue.");
                }
                Err(AgentError::NoPendingInterrupt(_)) => {
                    println!("No interruption detected. Please continue with normal conversation.");
                }
                Err(e) => println!("Error during resume: {}", e),
            }
            continue;
        }

        // 挂起中的线程不接受普通输入
        if is_suspended(controller.store().as_ref(), &current_thread).await {
            println!("This conversation is waiting for human input.");
            println!("Use 'resume:your response' to continue, or start a new thread.");
            continue;
        }

        match controller.run_turn(&current_thread, input).await {
            Ok(TurnOutcome::Completed { reply }) => println!("Assistant: {}", reply),
            Ok(TurnOutcome::WaitingForInput { query }) => {
                println!("Human assistance requested: {}", query);
                println!("Use 'resume:your response' to continue.");
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(())
}

async fn show_history(store: &dyn fiesta::store::ThreadStore, thread_id: &str) {
    let messages = recent_messages(store, thread_id, HISTORY_MAX_MESSAGES).await;
    if messages.is_empty() {
        println!("No conversation history found for thread {}", thread_id);
        return;
    }
    println!("Recent conversation (Thread {}):", thread_id);
    for (i, msg) in messages.iter().enumerate() {
        match msg {
            Message::System { .. } => println!("{}. System: [System prompt configured]", i + 1),
            Message::Human { content } => println!("{}. You: {}", i + 1, content),
            Message::Assistant { content, .. } => {
                let preview: String = content.chars().take(100).collect();
                if content.chars().count() > 100 {
                    println!("{}. Assistant: {}...", i + 1, preview);
                } else {
                    println!("{}. Assistant: {}", i + 1, preview);
                }
            }
            Message::ToolResult { tool, .. } => {
                println!("{}. Tool ({}): [Tool execution completed]", i + 1, tool)
            }
        }
    }
}
