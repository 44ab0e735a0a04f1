// =============================================================================
// Profile Analyzer — cache-first player profiling
// =============================================================================
//
// Flow for one player:
//   1. Cached profile?               -> return it, no provider calls.
//   2. Match ids (cache, then provider). None at all  -> NoMatchHistory.
//   3. Fewer ids than the minimum                     -> InsufficientGames.
//   4. Each match record (cache, then provider). Failures are skipped.
//      Too few usable records                         -> InsufficientValidMatches.
//   5. Fold the player's boards (oldest first) into a profile, cache it.
//
// The provider serves ids newest first; boards are reversed before folding
// so `recent_form` reads oldest to newest.
//
// Nothing is retried here. Retry policy belongs to the caller.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::error::ProfileError;
use super::model::PlayerProfile;
use super::stats;
use crate::cache::EntityCache;
use crate::source::MatchHistorySource;
use crate::types::{MatchParticipant, MatchRecord};

const DEFAULT_MAX_GAMES: usize = 20;
const DEFAULT_MIN_GAMES: usize = 5;
/// Hard ceiling on concurrent profiling within one lobby. Configured values
/// above it are clamped down.
pub const MAX_LOBBY_CONCURRENCY: usize = 4;

/// Tunables consumed by the analyzer and the lobby aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// How many recent matches to request per player.
    pub max_games_to_analyze: usize,
    /// Minimum number of games a profile must be built from.
    pub min_games_required: usize,
    /// Upper bound on concurrent player profiling within one lobby, capped at
    /// [`MAX_LOBBY_CONCURRENCY`].
    pub lobby_concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_games_to_analyze: DEFAULT_MAX_GAMES,
            min_games_required: DEFAULT_MIN_GAMES,
            lobby_concurrency: MAX_LOBBY_CONCURRENCY,
        }
    }
}

/// Builds player profiles from a [`MatchHistorySource`], fronted by an
/// [`EntityCache`]. Cheap to clone; clones share the source and cache.
#[derive(Clone)]
pub struct ProfileAnalyzer {
    source: Arc<dyn MatchHistorySource>,
    cache: Arc<EntityCache>,
    config: AnalyzerConfig,
}

impl ProfileAnalyzer {
    pub fn new(
        source: Arc<dyn MatchHistorySource>,
        cache: Arc<EntityCache>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Produce the profile for `puuid`, from cache when fresh.
    pub async fn analyze_player(&self, puuid: &str) -> Result<Arc<PlayerProfile>, ProfileError> {
        if let Some(profile) = self.cache.get_profile(puuid) {
            debug!(puuid, "profile cache hit");
            return Ok(profile);
        }

        let required = self.config.min_games_required;
        let match_ids = self.match_ids(puuid).await?;
        if match_ids.len() < required {
            return Err(ProfileError::InsufficientGames {
                found: match_ids.len(),
                required,
            });
        }

        let mut records: Vec<Arc<MatchRecord>> = Vec::with_capacity(match_ids.len());
        for match_id in &match_ids {
            match self.match_record(match_id).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(puuid, match_id = %match_id, error = %e, "skipping match that failed to load"),
            }
        }

        // Newest first from the provider; fold oldest first.
        let mut games: Vec<&MatchParticipant> = records
            .iter()
            .filter_map(|record| {
                let board = record.participant(puuid);
                if board.is_none() {
                    warn!(
                        puuid,
                        match_id = %record.metadata.match_id,
                        "skipping match without this player"
                    );
                }
                board
            })
            .collect();
        games.reverse();

        if games.len() < required {
            return Err(ProfileError::InsufficientValidMatches {
                usable: games.len(),
                required,
            });
        }

        let profile = Arc::new(build_profile(puuid, &games));
        info!(
            puuid,
            player = %profile.display_name(),
            games = profile.analyzed_games,
            avg_placement = profile.play_style.average_placement,
            trend = %profile.performance.trend,
            "player profile derived"
        );

        self.cache.set_profile(puuid, profile.clone());
        Ok(profile)
    }

    async fn match_ids(&self, puuid: &str) -> Result<Vec<String>, ProfileError> {
        if let Some(ids) = self.cache.get_match_ids(puuid) {
            debug!(puuid, count = ids.len(), "match-id cache hit");
            return Ok(ids);
        }

        let mut ids = self
            .source
            .fetch_match_ids(puuid, self.config.max_games_to_analyze)
            .await?;
        if ids.is_empty() {
            return Err(ProfileError::NoMatchHistory {
                puuid: puuid.to_string(),
            });
        }
        ids.truncate(self.config.max_games_to_analyze);

        self.cache.set_match_ids(puuid, &ids);
        Ok(ids)
    }

    async fn match_record(&self, match_id: &str) -> anyhow::Result<Arc<MatchRecord>> {
        if let Some(record) = self.cache.get_match(match_id) {
            return Ok(record);
        }
        let record = Arc::new(self.source.fetch_match(match_id).await?);
        self.cache.set_match(match_id, record.clone());
        Ok(record)
    }
}

/// Fold `games` (oldest first, non-empty) into a profile.
fn build_profile(puuid: &str, games: &[&MatchParticipant]) -> PlayerProfile {
    let latest = games.last();
    PlayerProfile {
        puuid: puuid.to_string(),
        game_name: latest.and_then(|g| g.game_name.clone()),
        tag_line: latest.and_then(|g| g.tag_line.clone()),
        profile_icon_id: None,
        analyzed_games: games.len(),
        last_updated: Utc::now(),
        play_style: stats::play_style(games),
        comp_preference: stats::comp_preference(games),
        item_preference: stats::item_preference(games),
        performance: stats::performance(games),
    }
}

// =============================================================================
// Tests
// =============================================================================
