//! CLI entry and dispatch.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sked_core::events::{AssistantEvent, EventSender, create_event_channel};
use sked_core::provider::dashscope::{AssistantClient, DashScopeConfig};
use sked_core::schedule::{DISPLAY_FORMAT, MemoryScheduleStore};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sked")]
#[command(version)]
#[command(about = "Streaming calendar-assistant chat")]
struct Cli {
    /// One-shot prompt; omit for an interactive session
    prompt: Option<String>,

    /// DashScope application id (falls back to DASHSCOPE_APP_ID)
    #[arg(long)]
    app_id: Option<String>,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(chat(cli.prompt, cli.app_id))
}

async fn chat(prompt: Option<String>, app_id: Option<String>) -> Result<()> {
    let app_id = match app_id {
        Some(id) => id,
        None => std::env::var("DASHSCOPE_APP_ID")
            .context("No app id. Pass --app-id or set DASHSCOPE_APP_ID.")?,
    };
    let config = DashScopeConfig::from_env(app_id, None, None)?;
    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(config, Arc::clone(&store));

    if let Some(prompt) = prompt {
        send_and_render(&mut client, &prompt).await?;
        if !store.all().is_empty() {
            println!();
            print_schedules(&store);
        }
        return Ok(());
    }

    println!("sked chat (:q to quit, :schedules to list entries)");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            ":q" => {
                println!("Goodbye!");
                break;
            }
            ":schedules" => print_schedules(&store),
            _ => send_and_render(&mut client, input).await?,
        }
    }
    Ok(())
}

/// Runs one streaming turn, rendering events as they arrive.
///
/// Ctrl+C cancels the in-flight turn without quitting the session.
async fn send_and_render(
    client: &mut AssistantClient<MemoryScheduleStore>,
    prompt: &str,
) -> Result<()> {
    let (tx, mut rx) = create_event_channel();
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
                () = cancel.cancelled() => {}
            }
        })
    };

    let events = EventSender::new(tx);
    let send = async {
        client.send_message_stream(prompt, &events, &cancel).await;
        drop(events);
    };
    let render = async {
        while let Some(event) = rx.recv().await {
            render_event(&event);
        }
    };
    tokio::join!(send, render);

    cancel.cancel();
    let _ = watcher.await;
    Ok(())
}

fn render_event(event: &AssistantEvent) {
    match event {
        AssistantEvent::Loading { .. } => {}
        AssistantEvent::TextDelta { text } => {
            print!("{text}");
            let _ = io::stdout().flush();
        }
        AssistantEvent::Completed { .. } => println!(),
        AssistantEvent::Failed { kind, message } => {
            println!();
            eprintln!("error ({kind}): {message}");
        }
    }
}

fn print_schedules(store: &MemoryScheduleStore) {
    let entries = store.all();
    if entries.is_empty() {
        println!("No schedules.");
        return;
    }
    for schedule in entries {
        println!(
            "{}: {} to {}",
            schedule.title,
            schedule.start.format(DISPLAY_FORMAT),
            schedule.end.format(DISPLAY_FORMAT)
        );
    }
}
