//! `careers ask`: Stream a chat run in the terminal.
//!
//! Answer text goes to stdout as it arrives; tool activity and errors go
//! to stderr. Without `--message` the command keeps a conversation going
//! across lines read from stdin.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use careers_agent::{SessionEvent, SessionLoop, SessionOutcome};
use careers_config::AppConfig;
use careers_core::message::{Conversation, Message};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    max_steps: Option<u32>,
    raw_events: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    tracing::debug!(path = %AppConfig::config_path().display(), "Loaded config");

    if !config.has_api_key() && config.default_provider != "ollama" {
        anyhow::bail!(
            "No API key configured. Set OPENAI_API_KEY or CAREERS_API_KEY, \
             or add api_key to {}",
            AppConfig::config_path().display()
        );
    }

    let router = careers_providers::router::build_from_config(&config);
    let provider = router
        .default_provider()
        .context("No default provider configured")?;
    let tools = Arc::new(careers_tools::default_registry()?);

    let mut session = SessionLoop::from_config(provider, tools, &config);
    if let Some(max) = max_steps {
        session = session.with_max_steps(max);
    }

    if let Some(msg) = message {
        let conversation = Conversation::from_messages(vec![Message::user(msg)]);
        let outcome = stream_run(&session, conversation, raw_events).await?;
        outcome.result?;
        return Ok(());
    }

    println!();
    println!("  Careers: Interactive Mode");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Type your question and press Enter. Type 'exit' to quit.");
    println!();

    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let mut attempt = conversation.clone();
        attempt.push(Message::user(line));

        match stream_run(&session, attempt, raw_events).await {
            // A failed run leaves the conversation as it was before the question.
            Ok(outcome) if outcome.result.is_ok() => conversation = outcome.conversation,
            Ok(_) => {}
            Err(e) => eprintln!("  [Error] {e:#}"),
        }
        prompt()?;
    }

    println!("\n  Goodbye!\n");
    Ok(())
}

fn prompt() -> anyhow::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Run one conversation, rendering events as they arrive. Ctrl+C cancels
/// the run instead of killing the process.
async fn stream_run(
    session: &SessionLoop,
    conversation: Conversation,
    raw_events: bool,
) -> anyhow::Result<SessionOutcome> {
    let mut run = session.run(conversation)?;
    let mut stdout = std::io::stdout();

    loop {
        let event = tokio::select! {
            event = run.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                run.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };

        if raw_events {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }

        match &event {
            SessionEvent::TextDelta { delta } => {
                print!("{delta}");
                stdout.flush()?;
            }
            other => {
                if let Some(line) = describe(other) {
                    eprintln!("{line}");
                }
            }
        }
    }
    if !raw_events {
        println!();
    }

    let (_, outcome) = run.collect().await;
    outcome.context("Session ended without reporting an outcome")
}

/// A one-line summary for non-text events, or `None` when there is
/// nothing worth printing.
fn describe(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::TextDelta { .. } => None,
        SessionEvent::ToolCall {
            tool_name, input, ..
        } => Some(format!("  [tool] {tool_name}({input})")),
        SessionEvent::ToolResult {
            tool_name, output, ..
        } => Some(format!("  [tool] {tool_name} -> {output}")),
        SessionEvent::Error {
            kind,
            message,
            retryable,
        } => Some(format!(
            "  [error: {kind:?}] {message}{}",
            if *retryable { " (retryable)" } else { "" }
        )),
        SessionEvent::Finish {
            steps, truncated, ..
        } => truncated.then(|| format!("  [stopped after {steps} tool steps]")),
    }
}
