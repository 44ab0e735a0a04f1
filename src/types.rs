// =============================================================================
// Shared types used across the Lobby Scout engine
// =============================================================================
//
// These mirror the match-history provider's JSON payloads closely enough to
// deserialize them directly. The core never mutates them once fetched.
// =============================================================================

use serde::{Deserialize, Serialize};

/// One completed game as returned by the match-history provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub metadata: MatchMetadata,
    #[serde(default)]
    pub info: MatchInfo,
}

impl MatchRecord {
    /// Find the participant record belonging to `puuid`, if that player was in
    /// this game.
    pub fn participant(&self, puuid: &str) -> Option<&MatchParticipant> {
        self.info.participants.iter().find(|p| p.puuid == puuid)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchMetadata {
    #[serde(default)]
    pub match_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchInfo {
    #[serde(default, rename = "gameId")]
    pub game_id: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub game_datetime: i64,
    /// Seconds.
    #[serde(default)]
    pub game_length: f64,
    #[serde(default)]
    pub participants: Vec<MatchParticipant>,
}

/// A single player's end-of-game board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchParticipant {
    #[serde(default)]
    pub puuid: String,
    #[serde(default, rename = "riotIdGameName")]
    pub game_name: Option<String>,
    #[serde(default, rename = "riotIdTagline")]
    pub tag_line: Option<String>,
    /// Final placement, 1..=8.
    #[serde(default)]
    pub placement: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub gold_left: u32,
    #[serde(default)]
    pub last_round: u32,
    /// Seconds survived.
    #[serde(default)]
    pub time_eliminated: f64,
    #[serde(default)]
    pub traits: Vec<TraitRecord>,
    #[serde(default)]
    pub units: Vec<UnitRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitRecord {
    pub name: String,
    #[serde(default)]
    pub num_units: u32,
    /// 0 when the trait is present but not active.
    #[serde(default)]
    pub tier_current: u32,
    #[serde(default)]
    pub tier_total: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitRecord {
    pub character_id: String,
    #[serde(default)]
    pub name: String,
    /// Star level.
    #[serde(default)]
    pub tier: u32,
    #[serde(default)]
    pub rarity: u32,
    #[serde(default, rename = "itemNames")]
    pub item_names: Vec<String>,
}

/// A lobby currently in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveGame {
    #[serde(default, rename = "gameId")]
    pub game_id: i64,
    #[serde(default, rename = "platformId")]
    pub platform_id: String,
    #[serde(default)]
    pub participants: Vec<LobbyParticipant>,
}

/// A participant of an active game plus whatever display metadata is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyParticipant {
    #[serde(default)]
    pub puuid: String,
    #[serde(default, rename = "profileIconId")]
    pub profile_icon_id: Option<i64>,
    #[serde(default, rename = "riotIdGameName")]
    pub game_name: Option<String>,
    #[serde(default, rename = "riotIdTagline")]
    pub tag_line: Option<String>,
}

#[cfg(test)]
impl LobbyParticipant {
    pub fn new(puuid: impl Into<String>) -> Self {
        Self {
            puuid: puuid.into(),
            ..Self::default()
        }
    }
}

/// Account resolved from a `name#tag` Riot ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiotAccount {
    pub puuid: String,
    #[serde(default, rename = "gameName")]
    pub game_name: Option<String>,
    #[serde(default, rename = "tagLine")]
    pub tag_line: Option<String>,
}
