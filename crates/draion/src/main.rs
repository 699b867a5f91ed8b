//! `draion` - edit shared pages from the command line.

/// CLI module - argument parsing and command handlers
mod cli;

fn main() {
    cli::run_cli();
}
