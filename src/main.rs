use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ringlog::app::App;
use ringlog::appender::NetworkConfig;
use ringlog::config::{self, Config};
use ringlog::logging;

/// Watch a command's output in a filterable, bounded log console
#[derive(Parser, Debug)]
#[command(name = "ringlog", version, about)]
struct Cli {
    /// Config file (default: ~/.ringlog/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logger name
    #[arg(long)]
    name: Option<String>,

    /// Number of entries to keep
    #[arg(long)]
    capacity: Option<usize>,

    /// Forward entries to this URL
    #[arg(long)]
    url: Option<String>,

    /// Command to run, followed by its arguments
    #[arg(last = true, required = true, num_args = 1..)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure config directory exists (creates logs dir too)
    config::ensure_directories()?;

    // Initialize file logging BEFORE any tracing calls
    let (log_file_info, _guard) = logging::init_file_logging(&config::logs_dir())?;
    tracing::info!("Logging to: {}", log_file_info.path.display());

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(name) = cli.name {
        config.logger_name = name;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(url) = cli.url {
        config.network.get_or_insert_with(NetworkConfig::default).url = url;
    }

    let (program, args) = match cli.command.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => anyhow::bail!("No command given"),
    };

    // Run the application
    let mut app = App::new(config, &program, &args).await?;
    app.run().await
}
