//! CLI entry point: logging, configuration and command dispatch.

mod args;
mod page;

use std::path::PathBuf;

use clap::Parser;
use draion_core::Config;

use args::{Cli, Commands};

/// Resolved settings shared by every command.
pub struct Context {
    pub config: Config,
    pub store_dir: PathBuf,
}

pub fn run_cli() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let store_dir = cli.store.clone().unwrap_or_else(|| config.store_dir());
    log::debug!("[CLI] Using store at {}", store_dir.display());
    let ctx = Context { config, store_dir };

    let ok = match cli.command {
        Commands::Open { name } => page::handle_open(&ctx, &name),
        Commands::List => page::handle_list(&ctx),
        Commands::Show { name } => page::handle_show(&ctx, &name),
        Commands::Sanitize { name } => page::handle_sanitize(&name),
    };

    if !ok {
        std::process::exit(1);
    }
}
