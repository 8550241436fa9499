mod commands;
mod config;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use staffcache::cache::{EmployeeCache, EmployeeMapper, FilePreferences, SqliteRecordStore};

#[derive(Parser, Debug)]
#[command(name = "staffcache")]
#[command(about = "Inspect and populate the local employee cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/staffcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config)?;

  let store = match &config.database_path {
    Some(path) => SqliteRecordStore::open_at(path)?,
    None => SqliteRecordStore::open()?,
  };
  let prefs = match &config.preferences_path {
    Some(path) => FilePreferences::open_at(path)?,
    None => FilePreferences::open()?,
  };

  let cache = EmployeeCache::new(
    Arc::new(store),
    EmployeeMapper,
    Arc::new(prefs),
    Handle::current(),
  )
  .with_expiration(config.expiration());

  let mut stdout = std::io::stdout().lock();
  commands::run(args.command, &cache, &mut stdout).await?;

  Ok(())
}

/// Install the tracing subscriber. Logs go to `log_file` when configured.
fn init_logging(config: &config::Config) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("staffcache=info"));

  match &config.log_file {
    Some(path) => {
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
      let dir = dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| color_eyre::eyre::eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}
