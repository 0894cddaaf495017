//! CLI command handlers

use anyhow::{Context, Result};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{AuthManager, OutputArgs};
use crate::config::FetchSettings;
use crate::request::{
    CoverFetcher, DiskCoverCache, LogicalRequest, Outcome, RequestEvent, RequestOrchestrator,
};
use crate::tidal::{QueryKind, SongRecord, TidalClient};

/// Handle the `auth` command
pub async fn auth(
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    force: bool,
) -> Result<()> {
    println!("{}", "Configuring TIDAL credentials...".cyan());

    let settings = FetchSettings::load()?;
    let creds = AuthManager::authenticate(username, password, token, force, &settings).await?;

    println!();
    println!("{}", "Authentication successful!".green().bold());
    println!("  Server: {}", settings.api_url);
    println!("  User: {}", creds.username);
    println!();
    println!("Credentials stored securely in system keyring.");

    Ok(())
}

/// Handle the `logout` command
pub fn logout() -> Result<()> {
    AuthManager::clear()?;
    println!("{}", "Credentials removed.".green());
    Ok(())
}

/// Handle the `favorites` command
pub async fn favorites(kind: QueryKind, output: OutputArgs) -> Result<()> {
    run_request(LogicalRequest::favorites(kind), output).await
}

/// Handle the `search` command
pub async fn search(kind: QueryKind, text: String, output: OutputArgs) -> Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("Search text is empty");
    }
    // One search per process, so any id will do
    run_request(LogicalRequest::search(kind, 1, text.trim()), output).await
}

async fn run_request(request: LogicalRequest, output: OutputArgs) -> Result<()> {
    let mut settings = FetchSettings::load()?;
    if output.no_covers {
        settings.cache_album_covers = false;
    }

    let creds = AuthManager::load().map_err(|_| {
        anyhow::anyhow!("No credentials found. Run 'tidalfetch auth' first to configure.")
    })?;
    let session = creds.session(&settings)?;
    let client = Arc::new(TidalClient::new(Arc::clone(&session)));

    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator =
        RequestOrchestrator::new(request, settings.clone(), client.clone(), session).with_events(tx);

    if settings.cache_album_covers {
        let dir = settings.cover_cache_dir()?;
        debug!("Caching covers in {}", dir.display());
        let cache = Arc::new(DiskCoverCache::new(dir));
        orchestrator = orchestrator.with_covers(CoverFetcher::new(client, cache));
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    let reporter = tokio::spawn(report_progress(rx, progress.clone()));

    let stop = async {
        // Without a signal handler the request just runs to completion
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = orchestrator.run_until(stop).await;
    let partial_failures = match &outcome {
        Some(Outcome::Success(_)) => orchestrator.errors().entries().to_vec(),
        _ => Vec::new(),
    };

    // The orchestrator owns the only sender; dropping it ends the reporter
    drop(orchestrator);
    let _ = reporter.await;
    progress.finish_and_clear();

    match outcome {
        None => println!("{}", "Cancelled.".yellow()),
        Some(Outcome::NoMatch) => println!("{}", "No match.".yellow()),
        Some(Outcome::Error(message)) => {
            eprintln!("{}", "Request failed:".red().bold());
            for line in message.lines() {
                eprintln!("  {}", line);
            }
            anyhow::bail!("TIDAL request failed");
        }
        Some(Outcome::Success(songs)) if output.json => {
            let json = serde_json::to_string_pretty(&songs).context("Failed to serialize songs")?;
            println!("{}", json);
        }
        Some(Outcome::Success(songs)) => print_songs(&songs),
    }

    if !partial_failures.is_empty() {
        eprintln!("{}", format!("{} fetch(es) failed:", partial_failures.len()).yellow());
        for failure in &partial_failures {
            eprintln!("  {}", failure);
        }
    }

    Ok(())
}

/// Mirror request events onto the progress bar until the request ends
async fn report_progress(mut events: mpsc::UnboundedReceiver<RequestEvent>, progress: ProgressBar) {
    while let Some(event) = events.recv().await {
        match event {
            RequestEvent::Status(text) => progress.set_message(text),
            RequestEvent::ProgressMax(max) => progress.set_length(max as u64),
            RequestEvent::Progress(position) => progress.set_position(position as u64),
            RequestEvent::Finished { .. } => break,
        }
    }
}

fn print_songs(songs: &[SongRecord]) {
    let mut current_album: Option<(u64, &str)> = None;

    for song in songs {
        let artist = song.album_artist.as_deref().unwrap_or(&song.artist);
        if current_album != Some((song.album_id, artist)) {
            println!();
            println!("{} - {}", artist.green().bold(), song.album.bold());
            if song.has_cached_art() {
                println!("  {}", song.art.dimmed());
            }
            current_album = Some((song.album_id, artist));
        }

        let seconds = song.duration().as_secs();
        let mut line = format!(
            "  {:>2}. {} ({}:{:02})",
            song.track,
            song.title,
            seconds / 60,
            seconds % 60
        );
        if song.compilation {
            line.push_str(&format!(" [{}]", song.artist));
        }
        println!("{}  {}", line, song.url.dimmed());
    }

    println!();
    println!("{} song(s)", songs.len().to_string().cyan());
}

/// Handle the `config` command
pub fn config(reset: bool) -> Result<()> {
    let settings = if reset {
        let defaults = FetchSettings::default();
        let path = defaults.save()?;
        println!("{} {}", "Settings reset:".green(), path.display());
        defaults
    } else {
        FetchSettings::load()?
    };

    println!("{}", "Fetch settings:".bold());
    println!("  API:              {}", settings.api_url);
    println!("  Resources:        {}", settings.resources_url);
    println!("  Cover size:       {}", settings.cover_size);
    println!("  Page size:        {}", settings.page_size);
    for kind in [QueryKind::Artists, QueryKind::Albums, QueryKind::Songs] {
        println!("  Max {:<13} {}", format!("{}:", kind), settings.limit_for(kind));
    }
    println!("  Fetch albums:     {}", settings.fetch_albums);
    println!("  Cache covers:     {}", settings.cache_album_covers);
    println!("  Timeout:          {}s", settings.timeout_secs);
    match settings.cover_cache_dir() {
        Ok(dir) => println!("  Cover cache:      {}", dir.display()),
        Err(e) => println!("  Cover cache:      {}", e.to_string().red()),
    }
    println!();
    println!("Edit {} to change them.", FetchSettings::config_path()?.display().to_string().cyan());

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = super::Cli::command();
    generate(shell, &mut cmd, "tidalfetch", &mut io::stdout());
}

impl super::Cli {
    fn command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }
}
