mod app;
mod cache;
mod config;
mod db;
mod error;
mod net;
mod rates;
mod reconcile;
mod store;
#[cfg(test)]
mod testing;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "convter")]
#[command(about = "An offline-first currency converter")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/convter/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<app::Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Log to a file so output stays clean; the guard flushes on exit
  let _guard = init_logging(&config.data_dir()?)?;

  let app = app::App::new(config)?;
  app.run(args.command.unwrap_or(app::Command::List)).await?;

  Ok(())
}

fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(data_dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", data_dir.display(), e))?;

  let appender = RollingFileAppender::builder()
    .rotation(Rotation::NEVER)
    .filename_prefix("convter.log")
    .build(data_dir)
    .map_err(|e| eyre!("Failed to open log file: {}", e))?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_env("CONVTER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
