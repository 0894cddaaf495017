//! tidalfetch - Browse and search the TIDAL catalog from the command line

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod request;
mod tidal;
mod utils;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tidalfetch=debug,reqwest=debug"
    } else {
        "tidalfetch=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Auth {
            username,
            password,
            token,
            force,
        } => {
            cli::commands::auth(username, password, token, force).await?;
        }
        Commands::Logout => {
            cli::commands::logout()?;
        }
        Commands::Favorites { kind, output } => {
            cli::commands::favorites(kind, output).await?;
        }
        Commands::Search { kind, text, output } => {
            cli::commands::search(kind, text, output).await?;
        }
        Commands::Config { reset } => {
            cli::commands::config(reset)?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}
