mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use client::{ClientConfig, EventStream, HttpClient};
use futures::StreamExt;
use serde_json::Value;
use skills::{SessionApi, SkillsConfig, WaitOptions, Waiter};
use tokio_util::sync::CancellationToken;
use wire::{AppServerSignal, PendingToolCall, SendMessage, pending_rows};

use config::Config;
use error::Result;

const CONFIG_FILE: &str = "codex-skills.toml";

#[derive(Parser)]
#[command(name = "codex-skills")]
#[command(about = "Inspect remote skill sessions on a codex-manager service", long_about = None)]
#[command(version)]
struct Cli {
    /// Profile config file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Profile to use instead of current_profile
    #[arg(long, global = true)]
    profile: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a session, or one turn's status
    Status {
        session: String,
        #[arg(short, long)]
        turn: Option<String>,
    },
    /// Wait for the assistant reply of a turn
    Wait {
        session: String,
        turn: String,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Send a message to a session
    Send {
        session: String,
        text: String,
        /// Wait for the assistant reply
        #[arg(short, long)]
        wait: bool,
    },
    /// List tool calls waiting for a response
    Pending { session: String },
    /// Print stream events until interrupted
    Watch {
        #[arg(short, long)]
        thread: Option<String>,
    },
}

/// Resolved settings for one invocation.
struct Context {
    client: ClientConfig,
    skills: SkillsConfig,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let config = Config::load_or_default(&cli.config)?;
        let client = config.client_config(cli.profile.as_deref(), ClientConfig::from_env())?;
        let skills = config.skills_config()?;
        tracing::debug!(base_url = %client.base_url, api_prefix = %client.api_prefix, "resolved config");
        Ok(Self { client, skills })
    }

    fn api(&self) -> Result<Arc<HttpClient>> {
        Ok(Arc::new(HttpClient::new(self.client.clone())?))
    }

    fn wait_options(&self, timeout_ms: Option<u64>) -> WaitOptions {
        let timeout = timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(self.skills.timeout);
        WaitOptions::new(timeout, self.skills.poll_interval)
    }
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::load(&cli)?;

    match cli.command {
        Commands::Status { session, turn } => cmd_status(&ctx, &session, turn.as_deref()).await,
        Commands::Wait {
            session,
            turn,
            timeout_ms,
        } => cmd_wait(&ctx, &session, &turn, timeout_ms).await,
        Commands::Send {
            session,
            text,
            wait,
        } => cmd_send(&ctx, &session, text, wait).await,
        Commands::Pending { session } => cmd_pending(&ctx, &session).await,
        Commands::Watch { thread } => cmd_watch(&ctx, thread).await,
    }
}

async fn cmd_status(ctx: &Context, session_id: &str, turn: Option<&str>) -> Result<()> {
    let api = ctx.api()?;
    match turn {
        Some(turn_id) => {
            let status = Waiter::new(api)
                .turn_status(session_id, turn_id, None, &WaitOptions::default())
                .await?;
            println!("{}", status.as_deref().unwrap_or("unknown"));
        }
        None => print_json(&api.get_session(session_id).await?)?,
    }
    Ok(())
}

async fn cmd_wait(ctx: &Context, session_id: &str, turn_id: &str, timeout_ms: Option<u64>) -> Result<()> {
    let reply = Waiter::new(ctx.api()?)
        .assistant_reply(session_id, turn_id, &ctx.wait_options(timeout_ms))
        .await?;
    println!("{}", reply.assistant_reply);
    Ok(())
}

async fn cmd_send(ctx: &Context, session_id: &str, text: String, wait: bool) -> Result<()> {
    let api = ctx.api()?;
    let message = SendMessage::new(text);
    if !wait {
        print_json(&api.send_message(session_id, &message).await?)?;
        return Ok(());
    }

    let reply = Waiter::new(api)
        .send_message_and_wait_reply(session_id, &message, &ctx.wait_options(None))
        .await?;
    println!("[{}] {}", reply.turn_id, reply.assistant_reply);
    Ok(())
}

async fn cmd_pending(ctx: &Context, session_id: &str) -> Result<()> {
    let listing = ctx.api()?.list_tool_calls(session_id).await?;
    let rows = pending_rows(&listing)?;
    if rows.is_empty() {
        println!("No pending tool calls.");
        return Ok(());
    }

    println!("{:<38}  {:<24}  ARGUMENTS", "REQUEST ID", "TOOL");
    println!("{}", "-".repeat(80));
    for row in &rows {
        let call = PendingToolCall::from_value(row);
        let request_id = call
            .request_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        let arguments = call
            .arguments
            .map(|args| args.to_string())
            .unwrap_or_default();
        println!(
            "{request_id:<38}  {:<24}  {arguments}",
            call.tool.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_watch(ctx: &Context, thread: Option<String>) -> Result<()> {
    let mut stream = EventStream::new(ctx.client.clone());
    if let Some(thread_id) = thread {
        stream = stream.thread(thread_id);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let events = stream.events(cancel)?;
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        let signal = AppServerSignal::from_stream_event(&event);
        if signal.is_tool_call() {
            tracing::info!(
                session_id = signal.session_id().unwrap_or("-"),
                request_id = ?signal.request_id,
                "tool call requested"
            );
        }
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
