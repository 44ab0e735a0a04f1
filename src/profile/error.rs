use thiserror::Error;

/// Why a player profile could not be derived.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The provider returned no match identifiers at all.
    #[error("no match history found for {puuid}")]
    NoMatchHistory { puuid: String },

    /// Fewer identifiers than the configured minimum.
    #[error("insufficient games for analysis: {found} (minimum {required})")]
    InsufficientGames { found: usize, required: usize },

    /// Enough identifiers, but too many records failed to load or did not
    /// contain the player.
    #[error("insufficient valid matches for analysis: {usable} (minimum {required})")]
    InsufficientValidMatches { usable: usize, required: usize },

    /// Error surfaced by the match-history provider, passed through as is.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}
