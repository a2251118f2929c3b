mod catalog;
mod config;
mod input;
mod lyrics;
mod player;
mod queue;
mod session;
mod storage;
mod translate;

use anyhow::Context;
use catalog::models::{SearchKind, SearchResults};
use catalog::{Catalog, CatalogClient, Song};
use clap::{Parser, Subcommand, ValueEnum};
use lyrics::resolver::ResolverSettings;
use lyrics::{LrclibClient, LyricsQuery, LyricsResolver};
use player::{MpvHandle, PlaybackDevice};
use session::actions::Action;
use session::console::Console;
use session::events::Event;
use session::{Services, Session, SessionSettings};
use std::sync::Arc;
use storage::Storage;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use translate::{GtxClient, TranslationCache, Translator};

#[derive(Debug, Parser)]
#[command(
    name = "lingotune",
    version,
    about = "Terminal music player with synced, translated lyrics"
)]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive session (default). Commands are read from stdin.
    Play {
        /// Song id, or a collection id together with --from.
        id: Option<String>,
        /// Treat the id as an album, playlist or artist and queue its songs.
        #[arg(long, value_enum)]
        from: Option<CollectionArg>,
    },
    /// Search the catalog and print the results.
    Search {
        #[arg(value_enum)]
        kind: KindArg,
        query: String,
    },
    /// Resolve lyrics for a song and print them.
    Lyrics {
        title: String,
        artist: String,
        #[arg(long)]
        album: Option<String>,
        /// Song length in seconds, used to pick among search candidates.
        #[arg(long)]
        duration: Option<u32>,
        /// Also try the catalog's embedded lyrics for this song id.
        #[arg(long)]
        song_id: Option<String>,
    },
    /// Translate a sentence, or look up a single word.
    Translate {
        text: String,
        /// Target language (defaults to the saved preference).
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        word: bool,
    },
    /// Print recently played songs.
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Print liked songs.
    Liked,
    /// Print saved vocabulary.
    Vocab,
    /// Print favorite lyric lines.
    Favorites,
    /// Show or set the translation language.
    Lang { code: Option<String> },
    /// Audio output device management (mpv).
    Audio {
        #[command(subcommand)]
        cmd: AudioCommand,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollectionArg {
    Album,
    Playlist,
    Artist,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Song,
    Album,
    Artist,
    Playlist,
}

impl From<KindArg> for SearchKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Song => SearchKind::Song,
            KindArg::Album => SearchKind::Album,
            KindArg::Artist => SearchKind::Artist,
            KindArg::Playlist => SearchKind::Playlist,
        }
    }
}

#[derive(Debug, Subcommand)]
enum AudioCommand {
    /// List mpv audio devices.
    List,
    /// Set mpv audio device (name as shown in list).
    Set { device: String },
    /// Clear mpv audio device override.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command.unwrap_or(Command::Play {
        id: None,
        from: None,
    }) {
        Command::Play { id, from } => run_session(&cfg, id, from).await?,
        Command::Search { kind, query } => {
            let client = catalog_client(&cfg)?;
            match client.search(kind.into(), &query).await? {
                SearchResults::Songs(songs) => print_songs(&songs),
                SearchResults::Collections(items) => {
                    for (i, c) in items.iter().enumerate() {
                        println!("{:02}. {} - {}  (id={})", i + 1, c.title, c.subtitle, c.id);
                    }
                }
            }
        }
        Command::Lyrics {
            title,
            artist,
            album,
            duration,
            song_id,
        } => {
            let translator: Arc<dyn Translator> = Arc::new(GtxClient::new(&cfg.translation.base_url)?);
            let resolver = lyrics_resolver(&cfg, Arc::new(catalog_client(&cfg)?), translator)?;
            let query = LyricsQuery {
                song_id,
                title,
                artist,
                album,
                duration_secs: duration,
            };
            match resolver.resolve(&query).await {
                Some(doc) => {
                    for line in &doc.lines {
                        if doc.synced {
                            let t = line.time;
                            println!("[{:02}:{:05.2}] {}", (t / 60.0) as u32, t % 60.0, line.text);
                        } else {
                            println!("{}", line.text);
                        }
                    }
                }
                None => println!("No lyrics available."),
            }
        }
        Command::Translate { text, to, word } => {
            let storage = open_storage(&cfg)?;
            let target = to
                .or_else(|| storage.language())
                .unwrap_or_else(|| cfg.translation.default_target.clone());
            let translator = GtxClient::new(&cfg.translation.base_url)?;
            if word {
                let meaning = translator.word_meaning(&text, &target).await?;
                println!("{}", meaning.translation);
                if !meaning.meaning.is_empty() {
                    println!("{}", meaning.meaning);
                }
            } else {
                let source = translate::detect_language(&text);
                println!("{}", translator.translate(&text, Some(source), &target).await?);
            }
        }
        Command::History { clear } => {
            let storage = open_storage(&cfg)?;
            if clear {
                storage.clear_history()?;
                println!("Cleared history.");
            } else {
                print_songs(&storage.history());
            }
        }
        Command::Liked => print_songs(&open_storage(&cfg)?.liked_songs()),
        Command::Vocab => {
            for v in open_storage(&cfg)?.vocabulary() {
                println!("{} → {}", v.word, v.translation);
                for l in v.meaning.lines() {
                    println!("    {l}");
                }
            }
        }
        Command::Favorites => {
            for (i, f) in open_storage(&cfg)?.favorite_lines().iter().enumerate() {
                println!(
                    "{:02}. {}  [{}]  {:.0}s",
                    i + 1,
                    f.text,
                    f.song.display_line(),
                    f.time
                );
                if let Some(t) = &f.translation {
                    println!("      ↳ {t}");
                }
            }
        }
        Command::Lang { code } => {
            let storage = open_storage(&cfg)?;
            match code {
                Some(code) => {
                    let code = code.trim().to_lowercase();
                    storage.save_language(&code)?;
                    println!("Translation language set to {code}.");
                }
                None => println!(
                    "{}",
                    storage
                        .language()
                        .unwrap_or_else(|| cfg.translation.default_target.clone())
                ),
            }
        }
        Command::Audio { cmd } => match cmd {
            AudioCommand::List => {
                let out = tokio::process::Command::new("mpv")
                    .args(["--audio-device=help", "--no-video", "--idle=no"])
                    .output()
                    .await
                    .context("run mpv --audio-device=help")?;
                print!("{}", String::from_utf8_lossy(&out.stdout));
                eprint!("{}", String::from_utf8_lossy(&out.stderr));
            }
            AudioCommand::Set { device } => {
                let mut cfg = cfg;
                cfg.player.audio_device = Some(device);
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Updated audio device in config.");
            }
            AudioCommand::Clear => {
                let mut cfg = cfg;
                cfg.player.audio_device = None;
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Cleared audio device override.");
            }
        },
    }

    Ok(())
}

async fn run_session(
    cfg: &config::Config,
    id: Option<String>,
    from: Option<CollectionArg>,
) -> anyhow::Result<()> {
    let storage = open_storage(cfg)?;
    let client = catalog_client(cfg)?;
    let catalog: Arc<dyn Catalog> = Arc::new(client.clone());
    let translator: Arc<dyn Translator> = Arc::new(GtxClient::new(&cfg.translation.base_url)?);
    let resolver = Arc::new(lyrics_resolver(cfg, Arc::clone(&catalog), Arc::clone(&translator))?);

    let (tx, rx) = mpsc::channel::<Event>(256);

    let mpv = MpvHandle::spawn(
        tx.clone(),
        cfg.player.audio_device.as_deref(),
        cfg.player.mpv_log.as_deref(),
    )
    .await
    .context("start mpv")?;
    mpv.set_volume(cfg.player.volume).await?;

    let services = Services {
        catalog,
        resolver,
        translations: TranslationCache::new(
            Arc::clone(&translator),
            &cfg.translation.default_target,
        ),
        translator,
        device: Arc::new(mpv),
    };
    let settings = SessionSettings {
        error_skip_delay: std::time::Duration::from_millis(cfg.player.error_skip_delay_ms),
        restart_threshold_secs: cfg.player.restart_threshold_secs,
        prefetch_window: cfg.translation.plain_prefetch_window,
        history_cap: cfg.history.cap,
        translation_enabled: cfg.translation.enabled,
    };
    let mut session = Session::new(services, settings, storage, tx.clone(), Console::stdout());

    let first = match (id, from) {
        (Some(id), Some(kind)) => {
            let detail = match kind {
                CollectionArg::Album => client.album(&id).await,
                CollectionArg::Playlist => client.playlist(&id).await,
                CollectionArg::Artist => client.artist(&id).await,
            }
            .with_context(|| format!("fetch collection {id}"))?;
            println!("{} ({} songs)", detail.summary.title, detail.songs.len());
            Some(Action::PlayAll {
                songs: detail.songs,
                start: 0,
            })
        }
        (Some(id), None) => Some(Action::PlayId(id)),
        (None, _) => None,
    };
    if let Some(action) = first {
        tx.send(Event::Input(action)).await.context("queue first action")?;
    }

    println!("{}", input::HELP);
    input::spawn_input_task(tx);
    session.run(rx).await?;

    if let Some(song) = &session.state().last_played {
        tracing::info!(id = %song.id, "session ended after {}", song.display_line());
    }
    Ok(())
}

fn catalog_client(cfg: &config::Config) -> anyhow::Result<CatalogClient> {
    CatalogClient::new(&cfg.catalog.base_url, cfg.catalog.search_limit)
}

fn lyrics_resolver(
    cfg: &config::Config,
    catalog: Arc<dyn Catalog>,
    translator: Arc<dyn Translator>,
) -> anyhow::Result<LyricsResolver> {
    let corpus = Arc::new(LrclibClient::new(&cfg.lyrics.base_url)?);
    let settings = ResolverSettings {
        duration_tolerance_secs: cfg.lyrics.duration_tolerance_secs,
        assist_language: cfg.lyrics.assist_language.clone(),
        memo_capacity: cfg.lyrics.memo_capacity,
    };
    Ok(LyricsResolver::new(corpus, catalog, translator, settings))
}

fn open_storage(cfg: &config::Config) -> anyhow::Result<Storage> {
    Storage::open(&cfg.database_path()).context("open database")
}

fn print_songs(songs: &[Song]) {
    for (i, s) in songs.iter().enumerate() {
        let duration = s
            .duration
            .map(|d| format!(" ({}:{:02})", d / 60, d % 60))
            .unwrap_or_default();
        println!("{:02}. {}{}  (id={})", i + 1, s.display_line(), duration, s.id);
    }
}
