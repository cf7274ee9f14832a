mod config;
mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use canvas::autosave::SaveStatus;
use canvas::engine::{Action, Command};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::profile::{FileProfileStore, ProfileStore, StoreError, validate_name};
use crate::services::session::{Session, SessionError};

const COMMAND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("script line {line}: {source}")]
    Script { line: usize, source: serde_json::Error },
    #[error("import rejected: {0}")]
    ImportRejected(String),
    #[error("changes not saved after {attempts} attempts: {message}")]
    SaveFailed { attempts: u32, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("snapshot export failed: {0}")]
    Export(#[from] canvas::snapshot::SnapshotError),
}

#[derive(Parser, Debug)]
#[command(name = "widgetboard", about = "Widget board canvas engine host")]
struct Cli {
    /// Profile to open.
    #[arg(long, env = "WIDGETBOARD_PROFILE", default_value = "default")]
    profile: String,

    /// Directory holding profile snapshots. Overrides WIDGETBOARD_PROFILE_DIR.
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Feed a JSON-lines command script through the engine and save the result.
    Replay {
        #[arg(long)]
        script: PathBuf,
        /// Print every emitted action as a JSON line.
        #[arg(long)]
        actions: bool,
    },
    /// Write the profile's snapshot document to a file, or stdout with `-`.
    Export {
        #[arg(long, default_value = "-")]
        out: PathBuf,
    },
    /// Replace the profile's canvas with a snapshot document.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print entity counts and viewport for the profile.
    Stats,
    /// List stored profiles.
    Profiles,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.profile_dir {
        config.profile_dir = dir;
    }
    validate_name(&cli.profile)?;
    let files = FileProfileStore::new(config.profile_dir.clone());
    info!(dir = %files.dir().display(), profile = %cli.profile, "profile store ready");
    let store: Arc<dyn ProfileStore> = Arc::new(files);

    match cli.command {
        CliCommand::Replay { script, actions } => run_replay(store, &cli.profile, &config, &script, actions).await,
        CliCommand::Export { out } => run_export(store, &cli.profile, &config, &out).await,
        CliCommand::Import { file } => run_import(store, &cli.profile, &config, &file).await,
        CliCommand::Stats => run_stats(store, &cli.profile, &config).await,
        CliCommand::Profiles => {
            print_json(&json!(store.list().await?))?;
            Ok(())
        }
    }
}

async fn run_replay(
    store: Arc<dyn ProfileStore>,
    profile: &str,
    config: &AppConfig,
    script: &Path,
    print_actions: bool,
) -> Result<(), CliError> {
    let text = read_file(script).await?;
    let commands = parse_script(&text)?;
    let count = commands.len();

    let mut session = Session::open(store, profile, config.engine).await?;
    let mut observed = session.subscribe();
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let feeder = tokio::spawn(async move {
        for command in commands {
            if tx.send(command).await.is_err() {
                break;
            }
        }
    });
    let (status, _) = tokio::join!(session.run(rx), feeder);
    info!(profile, commands = count, "script replayed");

    if print_actions {
        while let Ok(action) = observed.try_recv() {
            println!("{}", serde_json::to_string(&action)?);
        }
    }
    ensure_saved(status)?;
    print_json(&stats(&session))
}

async fn run_export(store: Arc<dyn ProfileStore>, profile: &str, config: &AppConfig, out: &Path) -> Result<(), CliError> {
    let session = Session::open(store, profile, config.engine).await?;
    let text = session.core().export_snapshot(session.now_ms()).to_json()?;
    if out == Path::new("-") {
        println!("{text}");
    } else {
        tokio::fs::write(out, text)
            .await
            .map_err(|source| CliError::Write { path: out.to_path_buf(), source })?;
        info!(profile, path = %out.display(), "snapshot exported");
    }
    Ok(())
}

async fn run_import(store: Arc<dyn ProfileStore>, profile: &str, config: &AppConfig, file: &Path) -> Result<(), CliError> {
    let text = read_file(file).await?;
    let mut session = Session::open(store, profile, config.engine).await?;
    let actions = session.apply(Command::Import { text });
    if let Some(reason) = actions.iter().find_map(|a| match a {
        Action::ImportRejected { reason } => Some(reason.clone()),
        _ => None,
    }) {
        return Err(CliError::ImportRejected(reason));
    }
    ensure_saved(session.flush().await)?;
    print_json(&stats(&session))
}

async fn run_stats(store: Arc<dyn ProfileStore>, profile: &str, config: &AppConfig) -> Result<(), CliError> {
    let session = Session::open(store, profile, config.engine).await?;
    print_json(&stats(&session))
}

/// Split a JSON-lines script into commands. Blank lines and `#` comments are skipped.
fn parse_script(text: &str) -> Result<Vec<Command>, CliError> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, body)| serde_json::from_str(body).map_err(|source| CliError::Script { line, source }))
        .collect()
}

fn stats(session: &Session) -> Value {
    let core = session.core();
    let canvas = core.canvas();
    json!({
        "profile": session.profile(),
        "widgets": canvas.widgets.len(),
        "nests": canvas.nests.len(),
        "nested": canvas.nested.len(),
        "total": canvas.total_count(),
        "grid_size": canvas.grid_size,
        "viewport": core.viewport(),
        "history": { "index": core.history().index(), "len": core.history().len() },
        "save_status": core.save_status(),
    })
}

fn ensure_saved(status: SaveStatus) -> Result<(), CliError> {
    match status {
        SaveStatus::Failed { attempts, message } => Err(CliError::SaveFailed { attempts, message }),
        _ => Ok(()),
    }
}

async fn read_file(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Read { path: path.to_path_buf(), source })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;
