// =============================================================================
// Riot Module — HTTP-backed match-history provider
// =============================================================================
//
// `RiotClient` implements `MatchHistorySource` against the public Riot API
// and adds the account and spectator lookups the CLI needs to find a lobby.
// Timeouts are enforced per request by the HTTP client; there is no retry or
// rate-limit handling here.

pub mod client;
pub mod routing;

pub use client::RiotClient;
