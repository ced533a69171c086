//! Chatflow CLI - line-oriented chat surface
//!
//! Reads user input a line at a time, streams the assistant's reply
//! incrementally to stdout, and cancels the in-flight turn on Ctrl+C.
//! All orchestration lives in chatflow-core; this binary is a renderer
//! and input loop.

use std::io::Write as _;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatflow_core::{
    chat_endpoint, ChatError, HttpChatClient, RenderSink, SessionConfig, SessionController,
    TurnOutcome, WireFraming,
};

#[derive(Parser, Debug)]
#[command(name = "chatflow", version, about = "Terminal chat surface for chatflow")]
struct Cli {
    /// Backend origin (usually the dev proxy)
    #[arg(long, env = "CHATFLOW_BACKEND_URL", default_value = chatflow_core::config::DEFAULT_BACKEND_ORIGIN)]
    backend: String,

    /// Model identifier sent with every request
    #[arg(long, env = "CHATFLOW_MODEL", default_value = "gpt-4.1-mini")]
    model: String,

    /// Per-turn timeout in seconds (0 disables the deadline)
    #[arg(long, env = "CHATFLOW_TIMEOUT_SECS", default_value_t = 0)]
    timeout_secs: u64,

    /// Wire framing of the backend stream (ndjson or sse)
    #[arg(long, env = "CHATFLOW_FRAMING", default_value = "ndjson")]
    framing: String,
}

/// Renders the in-progress reply incrementally to stdout
///
/// The sink receives the full accumulated content on every delta, so it
/// only prints the suffix it has not written yet.
#[derive(Debug, Default)]
struct StdoutSink {
    printed: usize,
}

impl RenderSink for StdoutSink {
    fn on_delta(&mut self, partial: &str) {
        if self.printed > partial.len() {
            // A fresh reply started after a cancelled one; start over
            self.printed = 0;
        }
        let suffix = &partial[self.printed..];
        print!("{suffix}");
        let _ = std::io::stdout().flush();
        self.printed = partial.len();
    }

    fn on_complete(&mut self, _final_content: &str) {
        println!();
        self.printed = 0;
    }

    fn on_error(&mut self, error: &ChatError) {
        println!();
        eprintln!("error: {error} (partial reply kept above)");
        self.printed = 0;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let framing = WireFraming::parse(&cli.framing)
        .ok_or_else(|| anyhow::anyhow!("unknown framing: {}", cli.framing))?;

    let mut config = SessionConfig::default()
        .with_model(&cli.model);
    config.framing = framing;
    if cli.timeout_secs > 0 {
        config = config.with_timeout(Duration::from_secs(cli.timeout_secs));
    }

    let client = HttpChatClient::new(chat_endpoint(&cli.backend))?;
    let mut controller = SessionController::new(client, config, StdoutSink::default());
    let cancel = controller.cancel_handle();

    println!("chatflow - talking to {} (model {})", cli.backend, cli.model);
    println!("Type /help for commands, Ctrl+C cancels a streaming reply.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            match command {
                "help" => {
                    println!("Available commands: /help, /clear, /quit");
                }
                "clear" => {
                    controller.clear_history()?;
                    println!("Conversation cleared");
                }
                "quit" | "exit" => break,
                _ => println!("Unknown command: /{command}"),
            }
            continue;
        }

        let turn = controller.submit(input);
        tokio::pin!(turn);

        let outcome = loop {
            tokio::select! {
                result = &mut turn => break result,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    cancel.cancel();
                }
            }
        };

        match outcome {
            Ok(TurnOutcome::Completed(_)) => {}
            Ok(TurnOutcome::Cancelled) => println!("\n[cancelled]"),
            // The sink already reported the failure
            Ok(TurnOutcome::Errored(_)) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("bye");
    Ok(())
}
