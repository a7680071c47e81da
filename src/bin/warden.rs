use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use window_warden::actor::warden::{EngineError, EngineHandle, Warden};
use window_warden::common::config::{Config, desktop_file, restore_file};
use window_warden::common::log;
use window_warden::model::app::WindowHandle;
use window_warden::sys::headless::HeadlessDesktop;
use window_warden::sys::store::FileStore;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Arrange windows of a recorded desktop by preset or saved layout")]
struct Cli {
    /// Desktop description to arrange. Moved frames are written back to it.
    #[arg(long)]
    desktop: Option<PathBuf>,
    /// File holding saved layouts.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Config file to use instead of ~/.warden.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a built-in preset
    Preset { name: String },
    /// Apply a preset or saved layout
    Apply { name: String },
    /// Save the current arrangement as a layout
    Save { name: String },
    /// Delete a saved layout
    Delete { name: String },
    /// List presets and saved layouts
    List,
    /// Snap every window to a grid
    Snap {
        /// Grid cell size in points; defaults to the configured size.
        grid: Option<u32>,
    },
    /// Move every window to the configured reset region
    Reset,
    /// Auto-arrangement commands
    Auto {
        #[command(subcommand)]
        auto_cmd: AutoCommands,
    },
    /// Bring a window's app to the foreground with auto-arrangement on
    Focus { window: u64 },
}

#[derive(Subcommand)]
enum AutoCommands {
    Enable,
    Disable,
    Status,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<serde_json::Value>,
}

fn main() {
    let cli = Cli::parse();
    log::init_logging();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::read(path)?,
        None => Config::load()?,
    };
    for issue in config.validate() {
        warn!("config: {issue}");
    }
    config.auto_fix_values();

    let desktop_path = cli.desktop.unwrap_or_else(desktop_file);
    let desktop = Arc::new(
        HeadlessDesktop::load(&desktop_path)
            .with_context(|| format!("could not load desktop from {}", desktop_path.display()))?,
    );
    let store = Arc::new(FileStore::new(cli.store.unwrap_or_else(restore_file)));

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    let output = runtime.block_on(async {
        let handle = Warden::spawn(config.clone(), desktop.clone(), store);
        let output = execute(&handle, &desktop, &config, cli.command).await;
        _ = handle.shutdown().await;
        output
    });

    desktop.save(&desktop_path)?;

    match output {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        Err(e) => {
            let outcome = e.outcome().map(serde_json::to_value).transpose()?;
            let error = ErrorOutput { error: e.to_string(), outcome };
            println!("{}", serde_json::to_string_pretty(&error)?);
            Ok(1)
        }
    }
}

async fn execute(
    handle: &EngineHandle,
    desktop: &HeadlessDesktop,
    config: &Config,
    command: Commands,
) -> Result<serde_json::Value, EngineError> {
    let value = match command {
        Commands::Preset { name } => json(handle.apply_preset(&name).await?),
        Commands::Apply { name } => json(handle.apply_layout(&name).await?),
        Commands::Save { name } => json(handle.save(&name).await?),
        Commands::Delete { name } => {
            handle.delete(&name).await?;
            serde_json::json!({ "deleted": name })
        }
        Commands::List => json(handle.list().await?),
        Commands::Snap { grid } => {
            json(handle.snap_to_grid(grid.unwrap_or(config.settings.grid_size)).await?)
        }
        Commands::Reset => json(handle.reset_windows().await?),
        Commands::Auto { auto_cmd } => match auto_cmd {
            AutoCommands::Enable => json(handle.enable_auto().await?),
            AutoCommands::Disable => json(handle.disable_auto().await?),
            AutoCommands::Status => json(handle.auto_state().await?),
        },
        Commands::Focus { window } => {
            handle.enable_auto().await?;
            let focused = desktop.focus(WindowHandle(window));
            // Give the watcher a chance to queue the change before asking.
            tokio::time::sleep(Duration::from_millis(10)).await;
            let state = handle.auto_state().await?;
            serde_json::json!({ "focused": focused, "auto": state })
        }
    };
    Ok(value)
}

fn json<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
