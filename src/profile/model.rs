// =============================================================================
// Player Profile — derived behavioural profile of one player
// =============================================================================
//
// A profile is built once from a slice of match history and never mutated.
// When the cached copy expires a fresh profile supersedes it.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::LobbyParticipant;

/// Number of placements retained in [`PerformanceProfile::recent_form`].
pub const RECENT_FORM_WINDOW: usize = 10;

/// Full derived profile for a single player, keyed by PUUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub puuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_icon_id: Option<i64>,

    /// Number of match records actually folded into this profile.
    pub analyzed_games: usize,
    pub last_updated: DateTime<Utc>,

    pub play_style: PlayStyleProfile,
    pub comp_preference: CompPreferenceProfile,
    pub item_preference: ItemPreferenceProfile,
    pub performance: PerformanceProfile,
}

impl PlayerProfile {
    /// A zero-valued profile standing in for a participant whose history could
    /// not be analysed. Carries only the identifier and known metadata.
    pub fn placeholder(participant: &LobbyParticipant) -> Self {
        Self {
            puuid: participant.puuid.clone(),
            game_name: participant.game_name.clone(),
            tag_line: participant.tag_line.clone(),
            profile_icon_id: participant.profile_icon_id,
            analyzed_games: 0,
            last_updated: Utc::now(),
            play_style: PlayStyleProfile::default(),
            comp_preference: CompPreferenceProfile::default(),
            item_preference: ItemPreferenceProfile::default(),
            performance: PerformanceProfile::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.analyzed_games > 0
    }

    /// Display label, `name#tag` when known, otherwise the PUUID.
    pub fn display_name(&self) -> String {
        match (&self.game_name, &self.tag_line) {
            (Some(name), Some(tag)) => format!("{name}#{tag}"),
            (Some(name), None) => name.clone(),
            _ => self.puuid.clone(),
        }
    }
}

// =============================================================================
// Sub-profiles
// =============================================================================

/// Aggregate tendencies: placement, economy, levelling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStyleProfile {
    /// Mean placement, 1..=8 (0 when no games).
    pub average_placement: f64,
    /// Fraction of games placing 4th or better.
    pub top_four_rate: f64,
    pub economy_style: EconomyStyle,
    pub leveling_pattern: LevelingPattern,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompPreferenceProfile {
    pub favorite_traits: Vec<TraitFrequency>,
    pub favorite_units: Vec<UnitFrequency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPreferenceProfile {
    pub favorite_items: Vec<ItemFrequency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceProfile {
    /// Last [`RECENT_FORM_WINDOW`] placements, oldest first, most recent last.
    pub recent_form: Vec<u32>,
    /// `1 / (1 + variance / 4)` over `recent_form`; 0 for fewer than 2 games.
    pub consistency_score: f64,
    pub trend: Trend,
    /// Games placing 1st or 2nd.
    pub high_roll_games: usize,
    /// Games placing 7th or 8th.
    pub low_roll_games: usize,
    /// Mean seconds survived.
    pub average_game_length: f64,
}

// =============================================================================
// Frequency entries
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitFrequency {
    pub name: String,
    /// Fraction of analysed games in which the trait was active.
    pub frequency: f64,
    /// Mean active tier across those games.
    pub avg_tier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFrequency {
    pub character_id: String,
    pub name: String,
    /// Fraction of analysed games in which the unit was fielded.
    pub frequency: f64,
    /// Mean star level when fielded.
    pub avg_tier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFrequency {
    pub name: String,
    /// Share of all item occurrences.
    pub frequency: f64,
}

// =============================================================================
// Classification tags
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EconomyStyle {
    Greedy,
    Balanced,
    Aggressive,
    #[default]
    Unknown,
}

impl std::fmt::Display for EconomyStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greedy => write!(f, "greedy"),
            Self::Balanced => write!(f, "balanced"),
            Self::Aggressive => write!(f, "aggressive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelingPattern {
    Fast,
    Slow,
    Adaptive,
    #[default]
    Unknown,
}

impl std::fmt::Display for LevelingPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Slow => write!(f, "slow"),
            Self::Adaptive => write!(f, "adaptive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Direction of recent results. Lower placements are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Climbing,
    Declining,
    Stable,
    #[default]
    Unknown,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Climbing => write!(f, "climbing"),
            Self::Declining => write!(f, "declining"),
            Self::Stable => write!(f, "stable"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
