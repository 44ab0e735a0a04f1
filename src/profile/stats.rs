// =============================================================================
// Profile Statistics — pure derivations over a player's match history
// =============================================================================
//
// Every function here is a fold over the full slice of participant records,
// ordered oldest game first. No state is carried between calls and nothing
// is random, so the same history always yields the same profile.
//
// Classification thresholds:
//
//   Economy   greedy      avg gold left >= 15  OR  >= 60% of games with >= 20 gold
//             aggressive  avg gold left <= 5   AND <= 20% of games with >= 20 gold
//             balanced    otherwise
//
//   Leveling  fast        avg final level >= 8.5 OR >= 40% of games at level 9+
//             slow        avg final level <= 7.0 AND <= 10% of games at level 9+
//             adaptive    otherwise
//
//   Trend     compare the older half of the recent-form window to the newer
//             half; a shift of 0.5 placements or more is a trend.
// =============================================================================

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::model::{
    CompPreferenceProfile, EconomyStyle, ItemFrequency, ItemPreferenceProfile, LevelingPattern,
    PerformanceProfile, PlayStyleProfile, TraitFrequency, Trend, UnitFrequency,
    RECENT_FORM_WINDOW,
};
use crate::types::MatchParticipant;

/// Worst placement that still counts as a top-four finish.
const TOP_FOUR: u32 = 4;
const HIGH_ROLL_MAX_PLACEMENT: u32 = 2;
const LOW_ROLL_MIN_PLACEMENT: u32 = 7;

const HIGH_GOLD: u32 = 20;
const HIGH_LEVEL: u32 = 9;

/// Minimum recent-form length for a trend call.
const MIN_TREND_GAMES: usize = 5;
const TREND_THRESHOLD: f64 = 0.5;

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// =============================================================================
// Play style
// =============================================================================

pub fn play_style(games: &[&MatchParticipant]) -> PlayStyleProfile {
    if games.is_empty() {
        return PlayStyleProfile::default();
    }

    let top_fours = games.iter().filter(|g| g.placement <= TOP_FOUR).count();

    PlayStyleProfile {
        average_placement: mean(games.iter().map(|g| g.placement as f64)),
        top_four_rate: rate(top_fours, games.len()),
        economy_style: economy_style(games),
        leveling_pattern: leveling_pattern(games),
    }
}

pub fn economy_style(games: &[&MatchParticipant]) -> EconomyStyle {
    if games.is_empty() {
        return EconomyStyle::Unknown;
    }

    let avg_gold = mean(games.iter().map(|g| g.gold_left as f64));
    let high_gold_rate = rate(
        games.iter().filter(|g| g.gold_left >= HIGH_GOLD).count(),
        games.len(),
    );

    if avg_gold >= 15.0 || high_gold_rate >= 0.6 {
        EconomyStyle::Greedy
    } else if avg_gold <= 5.0 && high_gold_rate <= 0.2 {
        EconomyStyle::Aggressive
    } else {
        EconomyStyle::Balanced
    }
}

pub fn leveling_pattern(games: &[&MatchParticipant]) -> LevelingPattern {
    if games.is_empty() {
        return LevelingPattern::Unknown;
    }

    let avg_level = mean(games.iter().map(|g| g.level as f64));
    let high_level_rate = rate(
        games.iter().filter(|g| g.level >= HIGH_LEVEL).count(),
        games.len(),
    );

    if avg_level >= 8.5 || high_level_rate >= 0.4 {
        LevelingPattern::Fast
    } else if avg_level <= 7.0 && high_level_rate <= 0.1 {
        LevelingPattern::Slow
    } else {
        LevelingPattern::Adaptive
    }
}

// =============================================================================
// Composition & items
// =============================================================================

/// Occurrence counter that ranks by count and keeps first-seen order on ties.
#[derive(Default)]
struct Tally {
    index: HashMap<String, usize>,
    rows: Vec<TallyRow>,
}

struct TallyRow {
    key: String,
    label: String,
    count: usize,
    tier_sum: u64,
}

impl Tally {
    fn add(&mut self, key: &str, label: &str, tier: u32) {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.rows.push(TallyRow {
                    key: key.to_string(),
                    label: label.to_string(),
                    count: 0,
                    tier_sum: 0,
                });
                self.index.insert(key.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[idx];
        row.count += 1;
        row.tier_sum += tier as u64;
    }

    fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Rows sorted by count, descending. `sort_by` is stable, so ties keep
    /// insertion order.
    fn ranked(mut self) -> Vec<TallyRow> {
        self.rows.sort_by(|a, b| b.count.cmp(&a.count));
        self.rows
    }
}

impl TallyRow {
    fn avg_tier(&self) -> f64 {
        rate(self.tier_sum as usize, self.count)
    }
}

pub fn comp_preference(games: &[&MatchParticipant]) -> CompPreferenceProfile {
    if games.is_empty() {
        return CompPreferenceProfile::default();
    }

    let mut traits = Tally::default();
    let mut units = Tally::default();

    for game in games {
        let mut seen_traits = HashSet::new();
        for t in game.traits.iter().filter(|t| t.tier_current > 0) {
            if seen_traits.insert(t.name.as_str()) {
                traits.add(&t.name, &t.name, t.tier_current);
            }
        }

        // A unit fielded twice counts once per game, at its best star level.
        let mut best_tier: Vec<(&str, &str, u32)> = Vec::new();
        for u in &game.units {
            match best_tier.iter_mut().find(|(id, _, _)| *id == u.character_id) {
                Some(entry) => entry.2 = entry.2.max(u.tier),
                None => best_tier.push((u.character_id.as_str(), u.name.as_str(), u.tier)),
            }
        }
        for (id, name, tier) in best_tier {
            let label = if name.is_empty() { id } else { name };
            units.add(id, label, tier);
        }
    }

    let n = games.len();
    CompPreferenceProfile {
        favorite_traits: traits
            .ranked()
            .into_iter()
            .map(|row| TraitFrequency {
                frequency: rate(row.count, n),
                avg_tier: row.avg_tier(),
                name: row.key,
            })
            .collect(),
        favorite_units: units
            .ranked()
            .into_iter()
            .map(|row| UnitFrequency {
                frequency: rate(row.count, n),
                avg_tier: row.avg_tier(),
                character_id: row.key,
                name: row.label,
            })
            .collect(),
    }
}

pub fn item_preference(games: &[&MatchParticipant]) -> ItemPreferenceProfile {
    let mut items = Tally::default();
    for item in games
        .iter()
        .flat_map(|g| g.units.iter())
        .flat_map(|u| u.item_names.iter())
    {
        items.add(item, item, 0);
    }

    let total = items.total();
    ItemPreferenceProfile {
        favorite_items: items
            .ranked()
            .into_iter()
            .map(|row| ItemFrequency {
                frequency: rate(row.count, total),
                name: row.key,
            })
            .collect(),
    }
}

// =============================================================================
// Performance
// =============================================================================

pub fn performance(games: &[&MatchParticipant]) -> PerformanceProfile {
    if games.is_empty() {
        return PerformanceProfile::default();
    }

    let placements: Vec<u32> = games.iter().map(|g| g.placement).collect();
    let start = placements.len().saturating_sub(RECENT_FORM_WINDOW);
    let recent_form = placements[start..].to_vec();

    PerformanceProfile {
        consistency_score: consistency_score(&recent_form),
        trend: classify_trend(&recent_form),
        high_roll_games: placements
            .iter()
            .filter(|&&p| p <= HIGH_ROLL_MAX_PLACEMENT)
            .count(),
        low_roll_games: placements
            .iter()
            .filter(|&&p| p >= LOW_ROLL_MIN_PLACEMENT)
            .count(),
        average_game_length: mean(games.iter().map(|g| g.time_eliminated)),
        recent_form,
    }
}

/// `1 / (1 + variance / 4)` using the population variance. Identical
/// placements score 1.0; fewer than two games score 0.
pub fn consistency_score(placements: &[u32]) -> f64 {
    if placements.len() < 2 {
        return 0.0;
    }
    let avg = mean(placements.iter().map(|&p| p as f64));
    let variance = mean(placements.iter().map(|&p| (p as f64 - avg).powi(2)));
    1.0 / (1.0 + variance / 4.0)
}

/// Classify `recent_form` (oldest first). With an odd length the newer half
/// gets the extra game.
pub fn classify_trend(recent_form: &[u32]) -> Trend {
    if recent_form.len() < MIN_TREND_GAMES {
        return Trend::Unknown;
    }

    let mid = recent_form.len() / 2;
    let older = mean(recent_form[..mid].iter().map(|&p| p as f64));
    let newer = mean(recent_form[mid..].iter().map(|&p| p as f64));
    let shift = newer - older;
    trace!(older, newer, shift, "trend halves");

    if shift <= -TREND_THRESHOLD {
        Trend::Climbing
    } else if shift >= TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

// =============================================================================
// Tests
// =============================================================================
