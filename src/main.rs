mod config;
mod lyrics;
mod playlist;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lyrics::{LrcDocument, LyricsResolver, LyricsResult, Song};
use playlist::{PersistStatus, PlaylistManager, PlaylistStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "harmony", version, about = "Playlists and lyrics for the Harmony music player")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage playlists.
    Playlist {
        #[command(subcommand)]
        cmd: PlaylistCommand,
    },
    /// Look up, import or save lyrics.
    Lyrics {
        #[command(subcommand)]
        cmd: LyricsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum PlaylistCommand {
    /// List all playlists.
    List,
    /// Print one playlist's songs in playback order.
    Show { id: i64 },
    /// Create an empty playlist.
    Create { name: String },
    /// Delete a playlist.
    Delete { id: i64 },
    /// Rename a playlist.
    Rename { id: i64, name: String },
    /// Append a song (ignored if already present).
    Add { id: i64, song_id: i64 },
    /// Remove a song.
    Remove { id: i64, song_id: i64 },
    /// List playlists that contain a song.
    Containing { song_id: i64 },
}

#[derive(Debug, Subcommand)]
enum LyricsCommand {
    /// Resolve lyrics from the cache or LRCLIB.
    Get {
        #[arg(long)]
        song_id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        #[arg(long)]
        duration_ms: u64,
        /// Print parsed lines with timestamps instead of the raw text.
        #[arg(long)]
        lines: bool,
        /// Mark the line active at this playback position (implies --lines).
        #[arg(long)]
        at_ms: Option<u64>,
    },
    /// Import an LRC file for a song.
    Import {
        song_id: i64,
        file: std::path::PathBuf,
    },
    /// Save a text file as a song's lyrics without validation.
    Save {
        song_id: i64,
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Command::Playlist { cmd } => {
            let manager =
                PlaylistManager::open(PlaylistStore::new(cfg.paths.playlists_file())).await;
            run_playlist(&manager, cmd).await?;
        }
        Command::Lyrics { cmd } => {
            let resolver = LyricsResolver::from_config(&cfg).context("init lyrics")?;
            run_lyrics(&resolver, cmd).await?;
        }
    }

    Ok(())
}

async fn run_playlist(manager: &PlaylistManager, cmd: PlaylistCommand) -> anyhow::Result<()> {
    let mutated = !matches!(
        cmd,
        PlaylistCommand::List | PlaylistCommand::Show { .. } | PlaylistCommand::Containing { .. }
    );
    let mut changes = manager.subscribe();

    match cmd {
        PlaylistCommand::List => {
            for p in manager.snapshot().iter() {
                println!("{:>20}  {}  ({} songs)", p.id, p.name, p.len());
            }
        }
        PlaylistCommand::Show { id } => {
            let p = manager
                .get(id)
                .with_context(|| format!("no playlist with id {id}"))?;
            println!("{}", p.name);
            if p.is_empty() {
                println!("(no songs)");
            }
            for (i, song_id) in p.song_ids.iter().enumerate() {
                println!("{:02}. {}", i + 1, song_id);
            }
        }
        PlaylistCommand::Create { name } => {
            if name.trim().is_empty() {
                anyhow::bail!("playlist name must not be empty");
            }
            let p = manager.create(name).await;
            println!("Created playlist {} ({}).", p.name, p.id);
        }
        PlaylistCommand::Delete { id } => manager.delete(id).await,
        PlaylistCommand::Rename { id, name } => {
            if name.trim().is_empty() {
                anyhow::bail!("playlist name must not be empty");
            }
            manager.rename(id, name).await;
        }
        PlaylistCommand::Add { id, song_id } => manager.add_song(id, song_id).await,
        PlaylistCommand::Remove { id, song_id } => manager.remove_song(id, song_id).await,
        PlaylistCommand::Containing { song_id } => {
            for id in manager.containing(song_id) {
                println!("{id}");
            }
        }
    }

    if mutated {
        if changes.has_changed().unwrap_or(false) {
            println!("{} playlists.", changes.borrow_and_update().len());
        }
        let status = manager.persist_status().borrow().clone();
        if let PersistStatus::Failed(e) = status {
            eprintln!("Warning: changes were not saved: {e}");
        }
    }
    Ok(())
}

async fn run_lyrics(resolver: &LyricsResolver, cmd: LyricsCommand) -> anyhow::Result<()> {
    match cmd {
        LyricsCommand::Get {
            song_id,
            title,
            artist,
            album,
            duration_ms,
            lines,
            at_ms,
        } => {
            let song = Song {
                id: song_id,
                title,
                artist,
                album,
                duration_ms,
            };
            match resolver.resolve(&song).await {
                LyricsResult::Success { lyrics, source } => {
                    eprintln!("source: {source}");
                    if lines || at_ms.is_some() {
                        print_lines(&LrcDocument::parse(&lyrics), at_ms);
                    } else {
                        println!("{lyrics}");
                    }
                }
                LyricsResult::NotFound => println!("No lyrics found."),
                LyricsResult::Error(e) => anyhow::bail!("lyrics lookup failed: {e}"),
            }
        }
        LyricsCommand::Import { song_id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            if !resolver.import_lrc_file(song_id, &content).await {
                anyhow::bail!("{} does not look like an LRC file", file.display());
            }
            println!("Imported lyrics for song {song_id}.");
        }
        LyricsCommand::Save { song_id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            resolver.save_lyrics(song_id, &content).await.context("save lyrics")?;
            println!("Saved lyrics for song {song_id}.");
        }
    }
    Ok(())
}

fn print_lines(doc: &LrcDocument, at_ms: Option<u64>) {
    let active = at_ms.and_then(|ms| doc.line_at(ms));
    for (i, line) in doc.lines.iter().enumerate() {
        let marker = if Some(i) == active { ">" } else { " " };
        match line.time_ms {
            Some(ms) => println!(
                "{marker} [{:02}:{:02}.{:02}] {}",
                ms / 60_000,
                (ms % 60_000) / 1000,
                (ms % 1000) / 10,
                line.text
            ),
            None => println!("{marker} {}", line.text),
        }
    }
}
