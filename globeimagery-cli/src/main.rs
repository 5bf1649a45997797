//! globeimagery CLI - Command-line interface
//!
//! Fetches imagery tiles from Google Earth Enterprise servers using the
//! globeimagery library.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use globeimagery::config::{config_file_path, ConfigFile};
use globeimagery::logging::{default_log_dir, default_log_file, init_logging};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::locate::LocateArgs;
use commands::url::UrlArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "globeimagery")]
#[command(version, long_about = None)]
#[command(about = "Fetch globe imagery tiles from Google Earth Enterprise servers")]
struct Cli {
    /// Configuration file (default: ~/.globeimagery/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for log files (default: ~/.globeimagery/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a tile and save it as an image
    Fetch(FetchArgs),

    /// Print the URL of a tile
    Url(UrlArgs),

    /// Find the tile containing a longitude/latitude
    Locate(LocateArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let level = if cli.verbose { "debug" } else { "info" };
    let _logging_guard = init_logging(&log_dir, default_log_file(), level)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let config_path = cli.config.unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&config_path)?;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &config).await,
        Commands::Url(args) => commands::url::run(args, &config).await,
        Commands::Locate(args) => commands::locate::run(args, &config).await,
        Commands::Config { command } => commands::config::run(command, &config_path, &config),
    }
}
