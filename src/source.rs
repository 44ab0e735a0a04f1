//! Abstraction over the remote match-history provider.
//!
//! The analyzer only ever talks to a `MatchHistorySource`, so the HTTP client
//! in `riot::client` and the in-memory double used by tests are
//! interchangeable.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::MatchRecord;

/// Remote match-history collaborator. Implementations are expected to enforce
/// their own per-call timeouts.
#[async_trait]
pub trait MatchHistorySource: Send + Sync {
    /// Up to `count` match identifiers for `puuid`, newest first.
    async fn fetch_match_ids(&self, puuid: &str, count: usize) -> Result<Vec<String>>;

    /// The full record for one completed match.
    async fn fetch_match(&self, match_id: &str) -> Result<MatchRecord>;
}
