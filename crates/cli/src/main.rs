use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use common::fsutil::fix_dir;
use mirrorshell::state::{AppState, LOG_DIR_NAME, LOG_FILE_NAME};

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::{Cat, Configure, Init, RunScript, ShowTable, SyncPaths, Version};

crate::command_enum! {
    (Init, Init),
    (Version, Version),
    (Sync, SyncPaths),
    (Cat, Cat),
    (Table, ShowTable),
    (Configure, Configure),
    (Script, RunScript),
}

#[derive(Parser, Debug)]
#[command(name = "mirrorshell", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// App directory holding config.toml (default: ~/.mirrorshell)
    #[arg(long, global = true, env = "MIRRORSHELL_DIR")]
    config_path: Option<PathBuf>,

    /// Debug logging and echoed answers
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Stderr plus a plain-text file in the log directory.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(cli: &Cli) -> anyhow::Result<WorkerGuard> {
    let configured = match AppState::load(cli.config_path.clone()) {
        Ok(state) => state.log_dir(),
        Err(_) => AppState::app_dir(cli.config_path.clone())
            .map(|dir| AppState::default_log_dir(&dir))
            .unwrap_or_else(|_| PathBuf::from(LOG_DIR_NAME)),
    };
    let log_dir = fix_dir(&configured, Path::new(LOG_DIR_NAME))
        .with_context(|| format!("no writable log directory at {}", configured.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match init_tracing(&cli) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging disabled: {:#}", "Warning:".yellow().bold(), e);
            None
        }
    };

    let ctx = OpContext::new(cli.config_path.clone(), cli.verbose);
    let result = cli.command.execute(&ctx).await;

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
