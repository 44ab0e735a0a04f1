// =============================================================================
// Runtime Configuration — Scout settings with atomic save
// =============================================================================
//
// Every tunable of the scout lives here: cache TTLs, the sweep interval, the
// analyzer's game window and the lobby fan-out bound.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheTtls;
use crate::profile::{AnalyzerConfig, MAX_LOBBY_CONCURRENCY};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_profile_ttl_secs() -> u64 {
    3600
}

fn default_match_ttl_secs() -> u64 {
    86_400
}

fn default_match_ids_ttl_secs() -> u64 {
    900
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_max_games_to_analyze() -> usize {
    20
}

fn default_min_games_required() -> usize {
    5
}

fn default_lobby_concurrency() -> usize {
    MAX_LOBBY_CONCURRENCY
}

fn default_platform() -> String {
    "NA1".to_string()
}

// =============================================================================
// ScoutConfig
// =============================================================================

/// Top-level configuration for the scout.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutConfig {
    // --- Cache ---------------------------------------------------------------

    /// Lifetime of a derived player profile.
    #[serde(default = "default_profile_ttl_secs")]
    pub profile_ttl_secs: u64,

    /// Lifetime of a fetched match record. Completed matches never change.
    #[serde(default = "default_match_ttl_secs")]
    pub match_ttl_secs: u64,

    /// Lifetime of a player's match-id list.
    #[serde(default = "default_match_ids_ttl_secs")]
    pub match_ids_ttl_secs: u64,

    /// Period of the background purge.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    // --- Analyzer ------------------------------------------------------------

    /// Match ids requested per player.
    #[serde(default = "default_max_games_to_analyze")]
    pub max_games_to_analyze: usize,

    /// Games a profile must be built from.
    #[serde(default = "default_min_games_required")]
    pub min_games_required: usize,

    /// Players profiled at once within a lobby. Values above 4 are clamped.
    #[serde(default = "default_lobby_concurrency")]
    pub lobby_concurrency: usize,

    // --- Provider ------------------------------------------------------------

    /// Platform code, e.g. "NA1" or "EUW1".
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            profile_ttl_secs: default_profile_ttl_secs(),
            match_ttl_secs: default_match_ttl_secs(),
            match_ids_ttl_secs: default_match_ids_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_games_to_analyze: default_max_games_to_analyze(),
            min_games_required: default_min_games_required(),
            lobby_concurrency: default_lobby_concurrency(),
            platform: default_platform(),
        }
    }
}

impl ScoutConfig {
    /// Read the config at `path`. Missing or malformed files are an error so
    /// the caller can decide whether defaults are acceptable. Values the
    /// analyzer will clamp are reported but kept as written.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .with_context(|| format!("cannot open scout config {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("scout config {} is not valid JSON", path.display()))?;

        if config.lobby_concurrency > MAX_LOBBY_CONCURRENCY {
            warn!(
                configured = config.lobby_concurrency,
                cap = MAX_LOBBY_CONCURRENCY,
                "lobby_concurrency above cap, clamping"
            );
        }
        if config.min_games_required > config.max_games_to_analyze {
            warn!(
                min_games = config.min_games_required,
                max_games = config.max_games_to_analyze,
                "min_games_required exceeds max_games_to_analyze; every profile will fail"
            );
        }

        debug!(
            path = %path.display(),
            platform = %config.platform,
            games = %format!("{}..={}", config.min_games_required, config.max_games_to_analyze),
            lobby_concurrency = config.lobby_concurrency,
            "scout config loaded"
        );
        Ok(config)
    }

    /// Write the config as pretty JSON next to `path`, then rename it into
    /// place. The parent directory is created when missing.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create config directory {}", dir.display()))?;
        }

        let mut body = serde_json::to_vec_pretty(self).context("scout config did not serialise")?;
        body.push(b'\n');

        let staged = path.with_extension("json.tmp");
        std::fs::write(&staged, &body)
            .with_context(|| format!("cannot stage scout config at {}", staged.display()))?;
        std::fs::rename(&staged, path)
            .with_context(|| format!("cannot move staged scout config to {}", path.display()))?;

        info!(
            path = %path.display(),
            platform = %self.platform,
            profile_ttl_secs = self.profile_ttl_secs,
            match_ids_ttl_secs = self.match_ids_ttl_secs,
            "scout config written"
        );
        Ok(())
    }

    /// Cache lifetimes. Zero values fall back to the cache defaults.
    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            profile: Duration::from_secs(self.profile_ttl_secs),
            matches: Duration::from_secs(self.match_ttl_secs),
            match_ids: Duration::from_secs(self.match_ids_ttl_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// The analyzer's view of this config. Zero bounds are raised to 1 and
    /// the lobby bound is capped at [`MAX_LOBBY_CONCURRENCY`].
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            max_games_to_analyze: self.max_games_to_analyze.max(1),
            min_games_required: self.min_games_required.max(1),
            lobby_concurrency: self.lobby_concurrency.clamp(1, MAX_LOBBY_CONCURRENCY),
        }
    }
}
