//! Configuration management CLI commands.

use std::fmt::Write;
use std::path::Path;

use clap::Subcommand;
use globeimagery::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,
}

/// Run a config subcommand against the file the CLI loaded.
pub fn run(command: ConfigCommands, path: &Path, config: &ConfigFile) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Show => print!("{}", render(config)),
    }
    Ok(())
}

/// Formats `config` in config.ini layout, marking unset values.
fn render(config: &ConfigFile) -> String {
    let unset = || "(not set)".to_string();
    let mut out = String::new();

    let _ = writeln!(out, "[provider]");
    let _ = writeln!(out, "url = {}", config.provider.url.clone().unwrap_or_else(unset));
    let _ = writeln!(
        out,
        "channel = {}",
        config
            .provider
            .channel
            .map(|c| c.to_string())
            .unwrap_or_else(unset)
    );
    let _ = writeln!(out, "path = {}", config.provider.path.clone().unwrap_or_else(unset));
    let _ = writeln!(out, "proxy = {}", config.provider.proxy.clone().unwrap_or_else(unset));
    let _ = writeln!(out);
    let _ = writeln!(out, "[http]");
    let _ = writeln!(out, "timeout = {}", config.http.timeout);
    out
}
