// =============================================================================
// Lobby Aggregator — concurrent profiling of every player in a live game
// =============================================================================
//
// Fan-out: one Tokio task per participant, spawned in input order. A task
// is only spawned once it holds a semaphore permit, so at most
// min(lobby_concurrency, 4, participants) profiles are in flight and the rest
// wait for a slot.
//
// Fan-in: join handles are awaited in input order, so the profile list lines
// up with the participant list no matter which task finishes first.
//
// A player whose profiling fails (or whose task panics) is represented by a
// zero-valued placeholder profile; the lobby itself only fails on malformed
// input.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::profile::{PlayerProfile, ProfileAnalyzer, MAX_LOBBY_CONCURRENCY};
use crate::types::{ActiveGame, LobbyParticipant};

/// How many of each player's favourite traits count toward contest detection.
const CONTESTED_TOP_N: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("lobby participant #{index} has no player id")]
    MissingPlayerId { index: usize },
}

/// A trait that several players in the lobby favour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestedTrait {
    pub name: String,
    /// Players with this trait in their top three, over all participants.
    pub share: f64,
    pub players: usize,
}

/// Lobby-wide summary. Recomputed on every call, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyProfile {
    pub game_id: i64,
    /// One profile per participant, in participant order.
    pub profiles: Vec<Arc<PlayerProfile>>,
    /// Sorted by share, descending.
    pub contested_traits: Vec<ContestedTrait>,
    /// Mean of players' average placements, over players with data.
    pub avg_placement: f64,
    /// Mean of players' top-four rates, over players with data.
    pub top_four_rate: f64,
}

impl LobbyProfile {
    pub fn empty(game_id: i64) -> Self {
        Self {
            game_id,
            profiles: Vec::new(),
            contested_traits: Vec::new(),
            avg_placement: 0.0,
            top_four_rate: 0.0,
        }
    }

    /// Participants for whom no history could be analysed.
    pub fn players_without_data(&self) -> usize {
        self.profiles.iter().filter(|p| !p.has_data()).count()
    }
}

impl ProfileAnalyzer {
    /// Profile every participant of `game` concurrently and reduce the
    /// results into a [`LobbyProfile`].
    pub async fn analyze_lobby(&self, game: &ActiveGame) -> Result<LobbyProfile, LobbyError> {
        let participants = &game.participants;
        if participants.is_empty() {
            return Ok(LobbyProfile::empty(game.game_id));
        }
        if let Some(index) = participants.iter().position(|p| p.puuid.trim().is_empty()) {
            return Err(LobbyError::MissingPlayerId { index });
        }

        let slots = self
            .config()
            .lobby_concurrency
            .clamp(1, MAX_LOBBY_CONCURRENCY)
            .min(participants.len());
        let semaphore = Arc::new(Semaphore::new(slots));
        info!(
            game_id = game.game_id,
            participants = participants.len(),
            slots,
            "analysing lobby"
        );

        let mut handles = Vec::with_capacity(participants.len());
        for participant in participants {
            let permit = semaphore.clone().acquire_owned().await;
            handles.push(self.spawn_profiling(participant.clone(), permit));
        }

        let profiles: Vec<Arc<PlayerProfile>> = join_all(handles)
            .await
            .into_iter()
            .zip(participants)
            .map(|(joined, participant)| match joined {
                Ok(profile) => profile,
                Err(e) => {
                    error!(puuid = %participant.puuid, error = %e, "profiling task aborted, using placeholder");
                    Arc::new(PlayerProfile::placeholder(participant))
                }
            })
            .collect();

        let lobby = summarize(game.game_id, profiles);
        info!(
            game_id = lobby.game_id,
            avg_placement = lobby.avg_placement,
            top_four_rate = lobby.top_four_rate,
            without_data = lobby.players_without_data(),
            contested = lobby.contested_traits.len(),
            "lobby analysed"
        );
        Ok(lobby)
    }

    /// Profile one participant on its own task, holding `permit` until the
    /// profile is built. Without a permit the participant is not profiled at
    /// all and gets a placeholder, so the bound is never exceeded.
    fn spawn_profiling(
        &self,
        participant: LobbyParticipant,
        permit: Result<OwnedSemaphorePermit, AcquireError>,
    ) -> JoinHandle<Arc<PlayerProfile>> {
        let permit = match permit {
            Ok(permit) => permit,
            Err(e) => {
                error!(puuid = %participant.puuid, error = %e, "lobby semaphore closed, using placeholder");
                return tokio::spawn(async move { Arc::new(PlayerProfile::placeholder(&participant)) });
            }
        };

        let analyzer = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match analyzer.analyze_player(&participant.puuid).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(puuid = %participant.puuid, error = %e, "player profiling failed, using placeholder");
                    Arc::new(PlayerProfile::placeholder(&participant))
                }
            }
        })
    }
}

/// Reduce per-player profiles into lobby statistics. Order-independent apart
/// from tie ordering of contested traits, which follows first appearance.
pub fn summarize(game_id: i64, profiles: Vec<Arc<PlayerProfile>>) -> LobbyProfile {
    let with_data: Vec<&PlayerProfile> = profiles
        .iter()
        .map(Arc::as_ref)
        .filter(|p| p.has_data())
        .collect();

    let (avg_placement, top_four_rate) = if with_data.is_empty() {
        (0.0, 0.0)
    } else {
        let n = with_data.len() as f64;
        (
            with_data.iter().map(|p| p.play_style.average_placement).sum::<f64>() / n,
            with_data.iter().map(|p| p.play_style.top_four_rate).sum::<f64>() / n,
        )
    };

    LobbyProfile {
        game_id,
        contested_traits: contested_traits(&profiles),
        profiles,
        avg_placement,
        top_four_rate,
    }
}

/// Count each trait across every player's top [`CONTESTED_TOP_N`] and express
/// it as a share of the whole lobby (players without data included).
fn contested_traits(profiles: &[Arc<PlayerProfile>]) -> Vec<ContestedTrait> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for profile in profiles {
        for t in profile
            .comp_preference
            .favorite_traits
            .iter()
            .take(CONTESTED_TOP_N)
        {
            match index.get(t.name.as_str()) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(t.name.as_str(), counts.len());
                    counts.push((t.name.as_str(), 1));
                }
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = profiles.len() as f64;
    counts
        .into_iter()
        .map(|(name, players)| ContestedTrait {
            name: name.to_string(),
            share: players as f64 / total,
            players,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::EntityCache;
    use crate::profile::AnalyzerConfig;
    use crate::runtime_config::ScoutConfig;
    use crate::source::testing::{Board, FakeSource};

    fn lobby_analyzer(source: FakeSource, config: AnalyzerConfig) -> (ProfileAnalyzer, Arc<FakeSource>) {
        let source = Arc::new(source);
        let analyzer = ProfileAnalyzer::new(source.clone(), Arc::new(EntityCache::default()), config);
        (analyzer, source)
    }

    fn game(puuids: &[&str]) -> ActiveGame {
        ActiveGame {
            game_id: 7,
            platform_id: "NA1".into(),
            participants: puuids.iter().map(|p| LobbyParticipant::new(*p)).collect(),
        }
    }

    fn games_with(placement: u32, traits: &[(&'static str, u32)]) -> Vec<Board> {
        vec![
            Board {
                traits: traits.to_vec(),
                ..Board::placed(placement)
            };
            5
        ]
    }

    #[tokio::test]
    async fn empty_lobby_spawns_nothing() {
        let (analyzer, source) = lobby_analyzer(FakeSource::new(), AnalyzerConfig::default());

        let lobby = analyzer.analyze_lobby(&game(&[])).await.unwrap();

        assert_eq!(lobby.game_id, 7);
        assert!(lobby.profiles.is_empty());
        assert!(lobby.contested_traits.is_empty());
        assert_eq!(source.id_calls(), 0);
    }

    #[tokio::test]
    async fn missing_player_id_is_structural_error() {
        let (analyzer, source) = lobby_analyzer(FakeSource::new(), AnalyzerConfig::default());

        let err = analyzer.analyze_lobby(&game(&["a", " ", "c"])).await.unwrap_err();

        assert_eq!(err, LobbyError::MissingPlayerId { index: 1 });
        assert_eq!(source.id_calls(), 0);
    }

    #[tokio::test]
    async fn failed_player_gets_placeholder_in_place() {
        let source = FakeSource::new()
            .with_placements("a", &[2, 2, 2, 2, 2])
            .with_placements("c", &[6, 6, 6, 6, 6])
            .with_placements("d", &[4, 4, 4, 4, 4])
            .failing_player("b");
        let (analyzer, _) = lobby_analyzer(source, AnalyzerConfig::default());
        let mut input = game(&["a", "b", "c", "d"]);
        input.participants[1].profile_icon_id = Some(4321);

        let lobby = analyzer.analyze_lobby(&input).await.unwrap();

        let order: Vec<&str> = lobby.profiles.iter().map(|p| p.puuid.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        assert_eq!(lobby.profiles[1].analyzed_games, 0);
        assert_eq!(lobby.profiles[1].profile_icon_id, Some(4321));
        assert_eq!(lobby.players_without_data(), 1);
        // (2 + 6 + 4) / 3, not / 4
        assert!((lobby.avg_placement - 4.0).abs() < 1e-9);
        // (1 + 0 + 1) / 3
        assert!((lobby.top_four_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn all_players_failing_still_succeeds() {
        let source = FakeSource::new().with_placements("a", &[1, 2]);
        let (analyzer, _) = lobby_analyzer(source, AnalyzerConfig::default());

        let lobby = analyzer.analyze_lobby(&game(&["a", "b"])).await.unwrap();

        assert_eq!(lobby.profiles.len(), 2);
        assert_eq!(lobby.players_without_data(), 2);
        assert_eq!(lobby.avg_placement, 0.0);
        assert_eq!(lobby.top_four_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn output_order_ignores_completion_order() {
        let mut source = FakeSource::new().with_delay(Duration::from_millis(10));
        let ids: Vec<String> = (0..8).map(|n| format!("p{n}")).collect();
        for (n, id) in ids.iter().enumerate() {
            source = source.with_placements(id, &[(n as u32 % 8) + 1; 5]);
        }
        let (analyzer, _) = lobby_analyzer(source, AnalyzerConfig::default());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let lobby = analyzer.analyze_lobby(&game(&refs)).await.unwrap();

        for (n, profile) in lobby.profiles.iter().enumerate() {
            assert_eq!(profile.puuid, ids[n]);
            assert_eq!(profile.play_style.average_placement, ((n % 8) + 1) as f64);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_profiling_is_bounded_by_four() {
        let mut source = FakeSource::new().with_delay(Duration::from_millis(50));
        let ids: Vec<String> = (0..10).map(|n| format!("p{n}")).collect();
        for id in &ids {
            source = source.with_placements(id, &[3, 3, 3, 3, 3]);
        }
        let (analyzer, source) = lobby_analyzer(source, AnalyzerConfig::default());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let lobby = analyzer.analyze_lobby(&game(&refs)).await.unwrap();

        assert_eq!(lobby.profiles.len(), 10);
        assert_eq!(lobby.players_without_data(), 0);
        assert_eq!(source.max_in_flight(), 4);
        assert_eq!(source.id_calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_concurrency_above_four_is_capped() {
        let mut source = FakeSource::new().with_delay(Duration::from_millis(50));
        let ids: Vec<String> = (0..10).map(|n| format!("p{n}")).collect();
        for id in &ids {
            source = source.with_placements(id, &[3, 3, 3, 3, 3]);
        }
        let config = ScoutConfig {
            lobby_concurrency: 8,
            ..ScoutConfig::default()
        }
        .analyzer_config();
        let (analyzer, source) = lobby_analyzer(source, config);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let lobby = analyzer.analyze_lobby(&game(&refs)).await.unwrap();

        assert_eq!(lobby.players_without_data(), 0);
        assert_eq!(source.max_in_flight(), MAX_LOBBY_CONCURRENCY);

        // An analyzer config built by hand is capped the same way.
        let (analyzer, source) = lobby_analyzer(
            (0..10).fold(
                FakeSource::new().with_delay(Duration::from_millis(50)),
                |src, n| src.with_placements(&format!("q{n}"), &[3, 3, 3, 3, 3]),
            ),
            AnalyzerConfig {
                lobby_concurrency: 8,
                ..AnalyzerConfig::default()
            },
        );
        let ids: Vec<String> = (0..10).map(|n| format!("q{n}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        analyzer.analyze_lobby(&game(&refs)).await.unwrap();
        assert_eq!(source.max_in_flight(), MAX_LOBBY_CONCURRENCY);
    }

    #[tokio::test]
    async fn closed_semaphore_yields_placeholder_without_profiling() {
        let source = FakeSource::new().with_placements("a", &[1, 1, 1, 1, 1]);
        let (analyzer, source) = lobby_analyzer(source, AnalyzerConfig::default());
        let semaphore = Arc::new(Semaphore::new(1));
        semaphore.close();

        let permit = semaphore.clone().acquire_owned().await;
        assert!(permit.is_err());
        let profile = analyzer
            .spawn_profiling(LobbyParticipant::new("a"), permit)
            .await
            .unwrap();

        assert_eq!(profile.puuid, "a");
        assert!(!profile.has_data());
        assert_eq!(source.id_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_concurrency_is_honoured() {
        let source = FakeSource::new()
            .with_delay(Duration::from_millis(50))
            .with_placements("a", &[1, 1, 1, 1, 1])
            .with_placements("b", &[2, 2, 2, 2, 2])
            .with_placements("c", &[3, 3, 3, 3, 3]);
        let config = AnalyzerConfig {
            lobby_concurrency: 0,
            ..AnalyzerConfig::default()
        };
        let (analyzer, source) = lobby_analyzer(source, config);

        analyzer.analyze_lobby(&game(&["a", "b", "c"])).await.unwrap();

        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn contested_traits_use_top_three_over_whole_lobby() {
        let source = FakeSource::new()
            .with_history("a", games_with(2, &[("Mage", 2), ("Bruiser", 1), ("Rogue", 1), ("Sniper", 1)]))
            .with_history("b", games_with(6, &[("Mage", 1), ("Sniper", 1)]))
            .failing_player("c");
        let (analyzer, _) = lobby_analyzer(source, AnalyzerConfig::default());

        let lobby = analyzer.analyze_lobby(&game(&["a", "b", "c"])).await.unwrap();

        let names: Vec<&str> = lobby.contested_traits.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Mage", "Bruiser", "Rogue", "Sniper"]);
        assert_eq!(lobby.contested_traits[0].players, 2);
        assert!((lobby.contested_traits[0].share - 2.0 / 3.0).abs() < 1e-9);
        // Sniper only counts for b; it is a's fourth favourite.
        assert_eq!(lobby.contested_traits[3].players, 1);
        assert!((lobby.contested_traits[3].share - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn lobby_reuses_cached_profiles() {
        let source = FakeSource::new()
            .with_placements("a", &[1, 2, 3, 4, 5])
            .with_placements("b", &[5, 4, 3, 2, 1]);
        let (analyzer, source) = lobby_analyzer(source, AnalyzerConfig::default());

        let first = analyzer.analyze_lobby(&game(&["a", "b"])).await.unwrap();
        let calls = source.id_calls();
        let second = analyzer.analyze_lobby(&game(&["a", "b"])).await.unwrap();

        assert_eq!(source.id_calls(), calls);
        assert!(Arc::ptr_eq(&first.profiles[0], &second.profiles[0]));
    }

    #[test]
    fn summarize_lobby_serialises_camel_case() {
        let lobby = summarize(
            1,
            vec![Arc::new(PlayerProfile::placeholder(&LobbyParticipant::new("x")))],
        );
        let json = serde_json::to_value(&lobby).unwrap();
        assert_eq!(json["gameId"], 1);
        assert_eq!(json["profiles"][0]["analyzedGames"], 0);
        assert!(json["contestedTraits"].as_array().unwrap().is_empty());
    }
}
