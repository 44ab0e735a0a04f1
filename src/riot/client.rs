// =============================================================================
// Riot REST API Client — token-authenticated JSON requests
// =============================================================================
//
// SECURITY: The API key is sent as the X-Riot-Token header and is never
// logged or serialized. Every request carries a 10 s timeout; the client
// does not retry.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::routing;
use crate::source::MatchHistorySource;
use crate::types::{ActiveGame, MatchRecord, RiotAccount};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Riot API client bound to one platform.
#[derive(Clone)]
pub struct RiotClient {
    platform: String,
    platform_url: String,
    regional_url: String,
    client: reqwest::Client,
}

impl RiotClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `RiotClient`.
    ///
    /// # Arguments
    /// * `api_key`  — Riot developer or production key.
    /// * `platform` — platform code such as "NA1" or "EUW1". Unknown codes
    ///   route to NA1.
    pub fn new(api_key: &str, platform: &str) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        let token = HeaderValue::from_str(api_key).context("API key is not a valid header value")?;
        default_headers.insert("X-Riot-Token", token);

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self::with_hosts(
            client,
            platform,
            routing::platform_url(platform),
            routing::regional_url(platform),
        ))
    }

    fn with_hosts(client: reqwest::Client, platform: &str, platform_url: &str, regional_url: &str) -> Self {
        let platform = platform.trim().to_ascii_uppercase();
        debug!(%platform, platform_url, regional_url, "RiotClient initialised");

        Self {
            platform,
            platform_url: platform_url.to_string(),
            regional_url: regional_url.to_string(),
            client,
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    // -------------------------------------------------------------------------
    // URL builders
    // -------------------------------------------------------------------------

    /// Join `segments` onto `base`, percent-encoding each one.
    fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base).with_context(|| format!("invalid base url {base}"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("base url {base} cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn match_ids_url(&self, puuid: &str, count: usize) -> Result<Url> {
        let mut url = Self::endpoint(
            &self.regional_url,
            &["tft", "match", "v1", "matches", "by-puuid", puuid, "ids"],
        )?;
        url.query_pairs_mut().append_pair("count", &count.to_string());
        Ok(url)
    }

    fn match_url(&self, match_id: &str) -> Result<Url> {
        Self::endpoint(&self.regional_url, &["tft", "match", "v1", "matches", match_id])
    }

    fn account_url(&self, game_name: &str, tag_line: &str) -> Result<Url> {
        Self::endpoint(
            &self.regional_url,
            &["riot", "account", "v1", "accounts", "by-riot-id", game_name, tag_line],
        )
    }

    fn active_game_url(&self, puuid: &str) -> Result<Url> {
        Self::endpoint(
            &self.platform_url,
            &["lol", "spectator", "tft", "v5", "active-games", "by-puuid", puuid],
        )
    }

    // -------------------------------------------------------------------------
    // Request plumbing
    // -------------------------------------------------------------------------

    /// GET `url` and decode the JSON body. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<Option<T>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {what} request failed"))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(what, "not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Riot GET {} returned {}: {}", what, status, body);
        }

        let parsed = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {what} response"))?;
        Ok(Some(parsed))
    }

    // -------------------------------------------------------------------------
    // Accounts / spectator
    // -------------------------------------------------------------------------

    /// GET /riot/account/v1/accounts/by-riot-id/{gameName}/{tagLine}.
    #[instrument(skip(self), name = "riot::fetch_account")]
    pub async fn fetch_account(&self, game_name: &str, tag_line: &str) -> Result<RiotAccount> {
        let url = self.account_url(game_name, tag_line)?;
        self.get_json(url, "account")
            .await?
            .with_context(|| format!("no account for {game_name}#{tag_line}"))
    }

    /// GET /lol/spectator/tft/v5/active-games/by-puuid/{puuid}. `Ok(None)`
    /// when the player is not currently in a game.
    #[instrument(skip(self), name = "riot::fetch_active_game")]
    pub async fn fetch_active_game(&self, puuid: &str) -> Result<Option<ActiveGame>> {
        let url = self.active_game_url(puuid)?;
        let game: Option<ActiveGame> = self.get_json(url, "active game").await?;
        if let Some(g) = &game {
            debug!(game_id = g.game_id, participants = g.participants.len(), "active game found");
        }
        Ok(game)
    }
}

// -----------------------------------------------------------------------------
// Match history
// -----------------------------------------------------------------------------

#[async_trait]
impl MatchHistorySource for RiotClient {
    #[instrument(skip(self), name = "riot::fetch_match_ids")]
    async fn fetch_match_ids(&self, puuid: &str, count: usize) -> Result<Vec<String>> {
        let url = self.match_ids_url(puuid, count)?;
        let ids: Vec<String> = self.get_json(url, "match ids").await?.unwrap_or_default();
        debug!(count = ids.len(), "match ids retrieved");
        Ok(ids)
    }

    #[instrument(skip(self), name = "riot::fetch_match")]
    async fn fetch_match(&self, match_id: &str) -> Result<MatchRecord> {
        let url = self.match_url(match_id)?;
        self.get_json(url, "match")
            .await?
            .with_context(|| format!("match {match_id} not found"))
    }
}
