//! Sysdebug CLI - File, process and state operations with structured call logging

mod commands;
mod log_format;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.sysdebug/state.db";

#[derive(Parser)]
#[command(name = "sysdebug")]
#[command(about = "Run file, process and state operations with structured logging", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Persistent state database
    #[arg(long, global = true, env = "SYSDEBUG_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Log format: pretty or json
    #[arg(long, global = true, env = "SYSDEBUG_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Log every filesystem, process and state call
    #[arg(long, global = true, env = "SYSDEBUG_DEBUG")]
    debug: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, env = "SYSDEBUG_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Resolve every path below this directory
    #[arg(long, global = true, env = "SYSDEBUG_ROOT")]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file
    Cat { path: PathBuf },

    /// Write --data (or stdin) to a file
    Write {
        path: PathBuf,

        /// Contents to write; read from stdin when absent
        #[arg(long)]
        data: Option<String>,

        /// Permission bits (octal)
        #[arg(long, default_value = "644", value_parser = commands::parse_mode)]
        mode: u32,
    },

    /// List a directory
    Ls { path: PathBuf },

    /// Show file metadata
    Stat {
        path: PathBuf,

        /// Do not follow a trailing symlink
        #[arg(long)]
        no_follow: bool,
    },

    /// List paths matching a pattern
    Glob { pattern: String },

    /// Create a directory
    Mkdir {
        path: PathBuf,

        /// Permission bits (octal)
        #[arg(long, default_value = "755", value_parser = commands::parse_mode)]
        mode: u32,
    },

    /// Remove a file or empty directory
    Rm {
        path: PathBuf,

        /// Remove recursively, ignoring missing paths
        #[arg(short, long)]
        all: bool,
    },

    /// Rename a path
    Mv { from: PathBuf, to: PathBuf },

    /// Create a link
    Ln {
        target: String,
        link: PathBuf,

        /// Create (or replace with) a symlink instead of a hard link
        #[arg(short, long)]
        symbolic: bool,
    },

    /// Print a symlink target
    Readlink { path: PathBuf },

    /// Change permission bits
    Chmod {
        #[arg(value_parser = commands::parse_mode)]
        mode: u32,
        path: PathBuf,
    },

    /// Create a file if missing and set its times
    Touch {
        path: PathBuf,

        /// RFC 3339 timestamp (default: now)
        #[arg(long)]
        time: Option<String>,
    },

    /// Run a command
    Run {
        /// Capture and print stdout
        #[arg(long)]
        capture: bool,

        /// Capture and print stdout and stderr together
        #[arg(long, conflicts_with = "capture")]
        combined: bool,

        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Run a script file
    Script {
        file: PathBuf,

        /// Working directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Interpreter program (default: execute the script directly)
        #[arg(long, env = "SYSDEBUG_INTERPRETER")]
        interpreter: Option<String>,

        /// Interpreter argument, placed before the script path (repeatable)
        #[arg(long = "interpreter-arg", allow_hyphen_values = true)]
        interpreter_args: Vec<String>,

        /// When the script is meant to run: always, once or onchange
        #[arg(long, value_parser = commands::parse_condition)]
        condition: Option<sysdebug_core::domain::ScriptCondition>,
    },

    /// Inspect and modify persistent state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Fetch a URL and print the body
    Fetch { url: String },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Print a value
    Get { bucket: String, key: String },

    /// Set a value
    Set {
        bucket: String,
        key: String,
        value: String,
    },

    /// Delete a key
    Delete { bucket: String, key: String },

    /// Delete a bucket and all its keys
    DeleteBucket { bucket: String },

    /// List the entries of a bucket
    List { bucket: String },

    /// Print the whole state as JSON
    Dump,

    /// Copy every entry into another database
    Copy { dest: String },
}

/// Install the process-wide tracing subscriber
///
/// The returned guard flushes the log file on drop.
fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let default_directive = if cli.debug { "sysdebug=info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("Failed to create env filter")?;

    let (writer, guard) = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    match cli.log_format.as_str() {
        "json" => {
            // Machine-readable structured logging, attrs as a nested object
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .event_format(log_format::JsonRecordFormat)
                        .with_writer(writer),
                )
                .init();
        }
        _ => {
            // Pretty formatting, colored on a terminal
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_ansi(cli.log_file.is_none())
                        .with_writer(writer),
                )
                .init();
        }
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    let _guard = init_tracing(&cli)?;
    debug!("sysdebug v{} starting", VERSION);

    // 2. Wire adapters (instrumented in debug mode)
    let ctx = commands::Context::new(
        cli.root.clone(),
        shellexpand::tilde(&cli.db_path).into_owned(),
        cli.debug,
    );

    // 3. Dispatch
    match cli.command {
        Commands::Cat { path } => commands::cat(&ctx, &path).await,
        Commands::Write { path, data, mode } => commands::write(&ctx, &path, data, mode).await,
        Commands::Ls { path } => commands::ls(&ctx, &path).await,
        Commands::Stat { path, no_follow } => commands::stat(&ctx, &path, no_follow).await,
        Commands::Glob { pattern } => commands::glob(&ctx, &pattern).await,
        Commands::Mkdir { path, mode } => commands::mkdir(&ctx, &path, mode).await,
        Commands::Rm { path, all } => commands::rm(&ctx, &path, all).await,
        Commands::Mv { from, to } => commands::mv(&ctx, &from, &to).await,
        Commands::Ln {
            target,
            link,
            symbolic,
        } => commands::ln(&ctx, &target, &link, symbolic).await,
        Commands::Readlink { path } => commands::readlink(&ctx, &path).await,
        Commands::Chmod { mode, path } => commands::chmod(&ctx, &path, mode).await,
        Commands::Touch { path, time } => commands::touch(&ctx, &path, time.as_deref()).await,
        Commands::Run {
            capture,
            combined,
            command,
        } => commands::run(&ctx, &command, capture, combined).await,
        Commands::Script {
            file,
            dir,
            interpreter,
            interpreter_args,
            condition,
        } => {
            let interpreter = interpreter
                .map(|command| sysdebug_core::domain::Interpreter::new(command, interpreter_args));
            commands::script(&ctx, &file, &dir, interpreter, condition.unwrap_or_default())
                .await
        }
        Commands::State { command } => match command {
            StateCommands::Get { bucket, key } => commands::state_get(&ctx, &bucket, &key).await,
            StateCommands::Set { bucket, key, value } => {
                commands::state_set(&ctx, &bucket, &key, &value).await
            }
            StateCommands::Delete { bucket, key } => {
                commands::state_delete(&ctx, &bucket, &key).await
            }
            StateCommands::DeleteBucket { bucket } => {
                commands::state_delete_bucket(&ctx, &bucket).await
            }
            StateCommands::List { bucket } => commands::state_list(&ctx, &bucket).await,
            StateCommands::Dump => commands::state_dump(&ctx).await,
            StateCommands::Copy { dest } => {
                commands::state_copy(&ctx, &shellexpand::tilde(&dest)).await
            }
        },
        Commands::Fetch { url } => commands::fetch(&ctx, &url).await,
    }
}
