//! CLI module for tidalfetch

use clap::{Parser, Subcommand};

use crate::tidal::QueryKind;

pub mod auth;
pub mod commands;

pub use auth::AuthManager;

#[derive(Parser, Debug)]
#[command(name = "tidalfetch", about = "Browse and search the TIDAL catalog")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure TIDAL credentials
    Auth {
        /// Username
        #[arg(short, long, env = "TIDAL_USER")]
        username: Option<String>,

        /// Password
        #[arg(short, long, env = "TIDAL_PASS")]
        password: Option<String>,

        /// Application token sent on login
        #[arg(long, env = "TIDAL_TOKEN")]
        token: Option<String>,

        /// Force re-authentication (ignore stored credentials)
        #[arg(long)]
        force: bool,
    },

    /// Remove stored credentials
    Logout,

    /// List songs from your favorite artists, albums or tracks
    Favorites {
        /// What to start from
        #[arg(value_enum)]
        kind: QueryKind,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search the catalog and list matching songs
    Search {
        /// What to search for
        #[arg(value_enum)]
        kind: QueryKind,

        /// Search text
        #[arg(value_name = "TEXT")]
        text: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show or reset the fetch settings
    Config {
        /// Write the default settings back to disk
        #[arg(long)]
        reset: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Options shared by the listing commands
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct OutputArgs {
    /// Do not download album covers
    #[arg(long)]
    pub no_covers: bool,

    /// Print songs as JSON
    #[arg(long)]
    pub json: bool,
}
