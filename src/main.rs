//! Claude Bridge - Run the Claude Code CLI and stream its output.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_bridge::cli::{ProcessRequest, ThinkingIntensity};
use claude_bridge::config::ConfigLoader;
use claude_bridge::display;
use claude_bridge::environment::ConfigResolver;
use claude_bridge::supervisor::{ChannelCallbacks, ProcessSupervisor, SupervisorEvent};

#[derive(Parser)]
#[command(
    name = "claude-bridge",
    about = "Run Claude Code and stream its output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (defaults to the standard search paths).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message to Claude Code.
    Run {
        /// The message to send.
        message: String,
        /// Model (default, opus, sonnet, haiku, opusplan).
        #[arg(short, long)]
        model: Option<String>,
        /// Session id to resume.
        #[arg(short, long)]
        resume: Option<String>,
        /// Thinking intensity (off, think, think-hard, think-harder, ultrathink).
        #[arg(short, long)]
        thinking: Option<ThinkingIntensity>,
        /// Working directory for the agent.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Print events without truncation.
        #[arg(long)]
        raw: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Run {
            message,
            model,
            resume,
            thinking,
            cwd,
            raw,
        } => {
            let mut request = config.request(message);
            if let Some(model) = model {
                request = request.model(model);
            }
            if let Some(id) = resume {
                request = request.resume_from(id);
            }
            if let Some(thinking) = thinking {
                request = request.thinking(thinking);
            }
            if let Some(dir) = cwd {
                request = request.working_dir(dir);
            }

            let supervisor = ProcessSupervisor::new(Arc::new(ConfigResolver::new(config)));
            run(&supervisor, request, raw).await
        }
    }
}

async fn run(
    supervisor: &ProcessSupervisor,
    request: ProcessRequest,
    raw: bool,
) -> ExitCode {
    let (callbacks, mut events) = ChannelCallbacks::stream();
    if let Err(e) = supervisor.start(request, Arc::new(callbacks)).await {
        display::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }
    tracing::info!(pid = ?supervisor.pid(), "Agent started");

    let mut exit_code = None;
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(SupervisorEvent::Data(event)) => display::print_event(&event, raw),
                Some(SupervisorEvent::Error(event)) => display::print_error_event(&event),
                Some(SupervisorEvent::Closed(code)) => {
                    exit_code = code;
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Some(outcome) = supervisor.stop() {
                    display::print_stopped(&outcome);
                }
            }
        }
    }

    display::print_close(exit_code, &supervisor.totals());
    match exit_code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from),
        None if interrupted => ExitCode::from(130),
        None => ExitCode::FAILURE,
    }
}
