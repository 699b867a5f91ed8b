//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Edit shared pages; changes sync to every open client.
#[derive(Parser, Debug)]
#[command(name = "draion", version, about)]
pub struct Cli {
    /// Config file (default: <config dir>/draion/config.toml)
    #[arg(long, global = true, env = "DRAION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Page store directory (overrides `store_dir` from the config)
    #[arg(long, global = true, env = "DRAION_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open (or create) a page and edit it interactively
    ///
    /// Changes are saved to the store as you type. The file store only
    /// notifies sessions in the same process, so edits from another `draion`
    /// process show up after reopening the page, not live.
    Open {
        /// Page name as you would type it, e.g. "Shopping List"
        name: String,
    },

    /// List every page
    List,

    /// Print a page's text and preview
    Show {
        /// Page name
        name: String,
    },

    /// Print the identifier a page name maps to
    Sanitize {
        /// Page name
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_with_global_flags() {
        let cli = Cli::try_parse_from(["draion", "open", "Shopping List", "--store", "/tmp/s"])
            .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert!(matches!(cli.command, Commands::Open { ref name } if name == "Shopping List"));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["draion"]).is_err());
    }
}
