// =============================================================================
// Lobby Scout — Main Entry Point
// =============================================================================
//
// Profiles a single player, or every player in that player's live game, and
// prints the result as JSON. The entity cache and its background sweep live
// for the duration of the command.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod cache;
mod lobby;
mod profile;
mod riot;
mod runtime_config;
mod source;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::EntityCache;
use crate::profile::ProfileAnalyzer;
use crate::riot::RiotClient;
use crate::runtime_config::ScoutConfig;

const DEFAULT_CONFIG_PATH: &str = "scout_config.json";

#[derive(Debug, Parser)]
#[command(name = "lobby-scout", version)]
#[command(about = "Scout TFT players and lobbies from their recent match history")]
struct Cli {
    /// Path to the JSON config file (overrides SCOUT_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Platform code such as NA1 or EUW1 (overrides SCOUT_PLATFORM and the config file)
    #[arg(long)]
    platform: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Profile one player from their recent games
    Player {
        /// PUUID or Riot ID in `name#tag` form
        target: String,
    },
    /// Profile every player in the target's current game
    Lobby {
        /// PUUID or Riot ID in `name#tag` form
        target: String,
    },
    /// Poll the target's current game and print each new lobby. The config
    /// file is re-read whenever it changes. Runs until Ctrl+C.
    Watch {
        /// PUUID or Riot ID in `name#tag` form
        target: String,

        /// Seconds between active-game checks
        #[arg(long, default_value_t = 60)]
        every: u64,
    },
    /// Write the effective configuration to the config path
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("SCOUT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = ScoutConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ScoutConfig::default()
    });

    if let Ok(platform) = std::env::var("SCOUT_PLATFORM") {
        if !platform.trim().is_empty() {
            config.platform = platform;
        }
    }
    if let Some(platform) = cli.platform.clone() {
        config.platform = platform;
    }

    if !riot::routing::is_known_platform(&config.platform) {
        warn!(platform = %config.platform, "Unknown platform, routing to NA1");
    }

    if matches!(cli.command, Command::InitConfig) {
        config.save(&config_path)?;
        return Ok(());
    }

    // ── 2. Provider client ───────────────────────────────────────────────
    let api_key = std::env::var("RIOT_API_KEY").context("RIOT_API_KEY is not set")?;
    let client = Arc::new(RiotClient::new(&api_key, &config.platform)?);

    // ── 3. Cache + sweep ─────────────────────────────────────────────────
    let cache = Arc::new(EntityCache::new(config.cache_ttls()));
    cache.start_sweep(config.sweep_interval());

    // ── 4. Analyzer ──────────────────────────────────────────────────────
    let analyzer = ProfileAnalyzer::new(client.clone(), cache.clone(), config.analyzer_config());
    info!(platform = %client.platform(), "Lobby scout ready");

    // ── 5. Run the command ───────────────────────────────────────────────
    let result = match &cli.command {
        Command::Watch { target, every } => {
            let reloader = ConfigReloader::new(config_path.clone());
            watch(target, Duration::from_secs((*every).max(1)), &client, analyzer, reloader)
                .await
                .map(|()| None)
        }
        command => run(command, &client, &analyzer).await.map(Some),
    };

    // ── 6. Shutdown ──────────────────────────────────────────────────────
    cache.stop_sweep();
    let stats = cache.stats();
    info!(
        profiles = stats.profiles,
        matches = stats.matches,
        match_ids = stats.match_ids,
        "Cache at shutdown"
    );

    if let Some(output) = result? {
        println!("{output}");
    }
    Ok(())
}

async fn run(command: &Command, client: &RiotClient, analyzer: &ProfileAnalyzer) -> Result<String> {
    match command {
        Command::Player { target } => {
            let puuid = resolve_puuid(client, target).await?;
            let profile = analyzer
                .analyze_player(&puuid)
                .await
                .with_context(|| format!("failed to profile {target}"))?;
            serde_json::to_string_pretty(&*profile).context("failed to serialise profile")
        }
        Command::Lobby { target } => {
            let puuid = resolve_puuid(client, target).await?;
            let game = client
                .fetch_active_game(&puuid)
                .await?
                .with_context(|| format!("{target} is not in a game"))?;
            let lobby = analyzer.analyze_lobby(&game).await?;
            info!(
                game_id = lobby.game_id,
                players = lobby.profiles.len(),
                without_data = lobby.players_without_data(),
                "Lobby analysed"
            );
            serde_json::to_string_pretty(&lobby).context("failed to serialise lobby")
        }
        Command::Watch { .. } | Command::InitConfig => Ok(String::new()),
    }
}

/// Re-analyse the target's lobby each time they enter a new game. Config
/// edits take effect on the next tick: TTLs and the sweep interval are
/// applied to the shared cache and the analyzer is rebuilt.
async fn watch(
    target: &str,
    every: Duration,
    client: &Arc<RiotClient>,
    mut analyzer: ProfileAnalyzer,
    mut reloader: ConfigReloader,
) -> Result<()> {
    let puuid = resolve_puuid(client, target).await?;
    let mut ticker = tokio::time::interval(every);
    let mut last_game: Option<i64> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(player = %target, every_secs = every.as_secs(), "Watching for new lobbies. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                warn!("Shutdown signal received, stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        if let Some(config) = reloader.poll() {
            let cache = analyzer.cache().clone();
            cache.set_ttls(config.cache_ttls());
            cache.start_sweep(config.sweep_interval());
            analyzer = ProfileAnalyzer::new(client.clone(), cache, config.analyzer_config());
            info!(analyzer = ?analyzer.config(), "Config reloaded");
        }

        let game = match client.fetch_active_game(&puuid).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                debug!(player = %target, "Not in a game");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Active game lookup failed");
                continue;
            }
        };
        if last_game == Some(game.game_id) {
            continue;
        }

        let lobby = analyzer.analyze_lobby(&game).await?;
        let players: Vec<String> = lobby.profiles.iter().map(|p| p.display_name()).collect();
        info!(game_id = lobby.game_id, ?players, "New lobby");
        println!("{}", serde_json::to_string_pretty(&lobby).context("failed to serialise lobby")?);
        last_game = Some(game.game_id);
    }
}

/// Tracks the config file's modification time and re-reads it on change.
struct ConfigReloader {
    path: PathBuf,
    seen: Option<SystemTime>,
}

impl ConfigReloader {
    fn new(path: PathBuf) -> Self {
        let seen = modified_at(&path);
        Self { path, seen }
    }

    /// The new config when the file changed since the last poll. A file that
    /// fails to parse is reported once and skipped until it changes again.
    fn poll(&mut self) -> Option<ScoutConfig> {
        let current = modified_at(&self.path);
        if current.is_none() || current == self.seen {
            return None;
        }
        self.seen = current;
        match ScoutConfig::load(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "Config changed but could not be reloaded");
                None
            }
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// A target is a Riot ID when it contains `#`, otherwise a PUUID.
async fn resolve_puuid(client: &RiotClient, target: &str) -> Result<String> {
    match parse_riot_id(target) {
        Some((name, tag)) => Ok(client.fetch_account(name, tag).await?.puuid),
        None => Ok(target.trim().to_string()),
    }
}

fn parse_riot_id(target: &str) -> Option<(&str, &str)> {
    let (name, tag) = target.trim().rsplit_once('#')?;
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some((name, tag))
}
