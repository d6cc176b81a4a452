// Subcommand handlers

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use sysdebug_core::domain::{FileInfo, Interpreter, RunScriptOptions, ScriptCondition};
use sysdebug_core::port::{Logger, PersistentState, System, TracingLogger};
use sysdebug_core::{InstrumentedPersistentState, InstrumentedSystem, StateError};
use sysdebug_infra_sqlite::SqliteState;
use sysdebug_infra_system::{
    log_cmd_combined_output, log_cmd_output, log_http_request, OsSystem,
};

/// Adapters shared by every subcommand
pub struct Context {
    system: Arc<dyn System>,
    logger: Arc<dyn Logger>,
    db_path: String,
    debug: bool,
}

impl Context {
    pub fn new(root: Option<PathBuf>, db_path: String, debug: bool) -> Self {
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
        let os: Arc<dyn System> = Arc::new(match root {
            Some(root) => OsSystem::with_root(root),
            None => OsSystem::new(),
        });
        let system: Arc<dyn System> = if debug {
            Arc::new(InstrumentedSystem::new(os, logger.clone()))
        } else {
            os
        };
        Self {
            system,
            logger,
            db_path,
            debug,
        }
    }

    async fn open_state(&self, db_path: &str) -> Result<Arc<dyn PersistentState>> {
        if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let state = SqliteState::open(&format!("sqlite://{}", db_path))
            .await
            .with_context(|| format!("Failed to open state database {}", db_path))?;
        let state: Arc<dyn PersistentState> = Arc::new(state);
        if self.debug {
            return Ok(Arc::new(InstrumentedPersistentState::new(
                state,
                self.logger.clone(),
            )));
        }
        Ok(state)
    }

    async fn state(&self) -> Result<Arc<dyn PersistentState>> {
        self.open_state(&self.db_path).await
    }
}

/// Parses octal permission bits such as `644` or `0o755`
pub fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {:?}: {}", s, e))
}

pub fn parse_condition(s: &str) -> std::result::Result<ScriptCondition, String> {
    match s {
        "always" => Ok(ScriptCondition::Always),
        "once" => Ok(ScriptCondition::Once),
        "onchange" => Ok(ScriptCondition::OnChange),
        _ => Err(format!("unknown condition {:?} (expected always, once or onchange)", s)),
    }
}

fn print_bytes(data: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(data)?;
    stdout.flush()?;
    Ok(())
}

#[derive(Tabled)]
struct FileRow {
    name: String,
    kind: String,
    size: u64,
    mode: String,
    modified: String,
}

impl From<FileInfo> for FileRow {
    fn from(info: FileInfo) -> Self {
        Self {
            name: info.name,
            kind: info.kind.to_string(),
            size: info.size,
            mode: format!("{:04o}", info.mode),
            modified: info
                .modified
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
struct EntryRow {
    key: String,
    value: String,
}

pub async fn cat(ctx: &Context, path: &Path) -> Result<()> {
    let data = ctx.system.read_file(path).await?;
    print_bytes(&data)
}

pub async fn write(ctx: &Context, path: &Path, data: Option<String>, mode: u32) -> Result<()> {
    let data = match data {
        Some(data) => data.into_bytes(),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };
    ctx.system.write_file(path, &data, mode).await?;
    Ok(())
}

pub async fn ls(ctx: &Context, path: &Path) -> Result<()> {
    for entry in ctx.system.read_dir(path).await? {
        match entry.kind {
            sysdebug_core::domain::FileKind::Dir => println!("{}/", entry.name.blue().bold()),
            sysdebug_core::domain::FileKind::Symlink => println!("{}", entry.name.cyan()),
            _ => println!("{}", entry.name),
        }
    }
    Ok(())
}

pub async fn stat(ctx: &Context, path: &Path, no_follow: bool) -> Result<()> {
    let info = if no_follow {
        ctx.system.lstat(path).await?
    } else {
        ctx.system.stat(path).await?
    };
    println!("{}", Table::new(vec![FileRow::from(info)]));
    Ok(())
}

pub async fn glob(ctx: &Context, pattern: &str) -> Result<()> {
    for path in ctx.system.glob(pattern).await? {
        println!("{}", path);
    }
    Ok(())
}

pub async fn mkdir(ctx: &Context, path: &Path, mode: u32) -> Result<()> {
    ctx.system.mkdir(path, mode).await?;
    Ok(())
}

pub async fn rm(ctx: &Context, path: &Path, all: bool) -> Result<()> {
    if all {
        ctx.system.remove_all(path).await?;
    } else {
        ctx.system.remove(path).await?;
    }
    Ok(())
}

pub async fn mv(ctx: &Context, from: &Path, to: &Path) -> Result<()> {
    ctx.system.rename(from, to).await?;
    Ok(())
}

pub async fn ln(ctx: &Context, target: &str, link: &Path, symbolic: bool) -> Result<()> {
    if symbolic {
        ctx.system.write_symlink(target, link).await?;
    } else {
        ctx.system.link(Path::new(target), link).await?;
    }
    Ok(())
}

pub async fn readlink(ctx: &Context, path: &Path) -> Result<()> {
    println!("{}", ctx.system.readlink(path).await?.display());
    Ok(())
}

pub async fn chmod(ctx: &Context, path: &Path, mode: u32) -> Result<()> {
    ctx.system.chmod(path, mode).await?;
    Ok(())
}

pub async fn touch(ctx: &Context, path: &Path, time: Option<&str>) -> Result<()> {
    let time = match time {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid timestamp {:?}", s))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    match ctx.system.stat(path).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => ctx.system.write_file(path, b"", 0o644).await?,
        Err(e) => return Err(e.into()),
    }
    ctx.system.chtimes(path, time, time).await?;
    Ok(())
}

pub async fn run(ctx: &Context, command: &[String], capture: bool, combined: bool) -> Result<()> {
    let (program, args) = command.split_first().context("Missing command")?;
    let mut cmd = Command::new(program);
    cmd.args(args);

    if capture {
        let stdout = log_cmd_output(ctx.logger.as_ref(), &mut cmd).await?;
        print_bytes(&stdout)
    } else if combined {
        let output = log_cmd_combined_output(ctx.logger.as_ref(), &mut cmd).await?;
        print_bytes(&output)
    } else {
        ctx.system.run_cmd(&mut cmd).await?;
        Ok(())
    }
}

pub async fn script(
    ctx: &Context,
    file: &Path,
    dir: &Path,
    interpreter: Option<Interpreter>,
    condition: ScriptCondition,
) -> Result<()> {
    let data = ctx.system.read_file(file).await?;
    let options = RunScriptOptions {
        interpreter,
        condition,
    };
    ctx.system.run_script(file, dir, &data, &options).await?;
    Ok(())
}

pub async fn state_get(ctx: &Context, bucket: &str, key: &str) -> Result<()> {
    let state = ctx.state().await?;
    let value = state.get(bucket.as_bytes(), key.as_bytes()).await;
    state.close().await?;
    match value? {
        Some(value) => {
            print_bytes(&value)?;
            println!();
            Ok(())
        }
        None => bail!("{}: {}: not found", bucket, key),
    }
}

pub async fn state_set(ctx: &Context, bucket: &str, key: &str, value: &str) -> Result<()> {
    let state = ctx.state().await?;
    let result = state
        .set(bucket.as_bytes(), key.as_bytes(), value.as_bytes())
        .await;
    state.close().await?;
    Ok(result?)
}

pub async fn state_delete(ctx: &Context, bucket: &str, key: &str) -> Result<()> {
    let state = ctx.state().await?;
    let result = state.delete(bucket.as_bytes(), key.as_bytes()).await;
    state.close().await?;
    Ok(result?)
}

pub async fn state_delete_bucket(ctx: &Context, bucket: &str) -> Result<()> {
    let state = ctx.state().await?;
    let result = state.delete_bucket(bucket.as_bytes()).await;
    state.close().await?;
    Ok(result?)
}

pub async fn state_list(ctx: &Context, bucket: &str) -> Result<()> {
    let state = ctx.state().await?;
    let mut rows = Vec::new();
    let result = state
        .for_each(bucket.as_bytes(), &mut |key: &[u8], value: &[u8]| {
            rows.push(EntryRow {
                key: String::from_utf8_lossy(key).into_owned(),
                value: String::from_utf8_lossy(value).into_owned(),
            });
            Ok::<(), StateError>(())
        })
        .await;
    state.close().await?;
    result?;

    if rows.is_empty() {
        println!("{}", format!("Bucket {} is empty", bucket).yellow());
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

pub async fn state_dump(ctx: &Context) -> Result<()> {
    let state = ctx.state().await?;
    let data = state.data().await;
    state.close().await?;
    println!("{}", serde_json::to_string_pretty(&data?)?);
    Ok(())
}

pub async fn state_copy(ctx: &Context, dest: &str) -> Result<()> {
    let state = ctx.state().await?;
    let dest_state = ctx.open_state(dest).await?;
    let result = state.copy_to(dest_state.as_ref()).await;
    state.close().await?;
    dest_state.close().await?;
    result?;

    println!("{}", format!("✓ State copied to {}", dest).green().bold());
    Ok(())
}

pub async fn fetch(ctx: &Context, url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let request = client.get(url).build().context("Invalid URL")?;
    let response = log_http_request(ctx.logger.as_ref(), &client, request)
        .await
        .context("Request failed")?;

    let status = response.status();
    let body = response.bytes().await.context("Failed to read response body")?;
    if !status.is_success() {
        bail!("{} returned {}", url, status);
    }
    print_bytes(&body)
}
