// =============================================================================
// Profile Module — player behaviour profiling
// =============================================================================
//
// `ProfileAnalyzer` turns a player's recent match history into a
// `PlayerProfile`:
//   - `model`:    the profile types and classification tags.
//   - `stats`:    pure aggregate functions over the history slice.
//   - `analyzer`: cache-first orchestration against the provider.
//   - `error`:    typed failures.
//
// Lobby-wide aggregation lives in `crate::lobby` and reuses the analyzer.

pub mod analyzer;
pub mod error;
pub mod model;
pub mod stats;

pub use analyzer::{AnalyzerConfig, ProfileAnalyzer, MAX_LOBBY_CONCURRENCY};
pub use model::PlayerProfile;
