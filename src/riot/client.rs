use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::metrics::RequestMetrics;
use super::region::{Platform, Region};
use super::types::{AccountDto, LeagueEntryDto, MatchDto, RiotApiError, RiotApiResponse};
use super::TftApi;
use crate::rate_limiter::RateLimiter;

/// Largest page the match-ids endpoint accepts.
pub const MAX_MATCH_IDS_PER_PAGE: u32 = 20;

pub struct RiotClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    /// Riot API Key
    key: String,
    metrics: Arc<RequestMetrics>,
    /// Replaces every `https://{routing}.api.riotgames.com` host.
    base_url: Option<String>,
}

impl RiotClient {
    pub fn new(key: String, limiter: Arc<RateLimiter>, metrics: Arc<RequestMetrics>) -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter,
            key,
            metrics,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn host(&self, routing: &str) -> String {
        match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{routing}.api.riotgames.com"),
        }
    }

    pub async fn request<T: DeserializeOwned>(&self, url: String) -> RiotApiResponse<T> {
        self.limiter.acquire(1).await;
        self.metrics.inc();

        trace!(url, "[RIOT::CLIENT] GET");

        let res = self
            .client
            .get(url)
            .header("X-Riot-Token", &self.key)
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => {
                let body = res.bytes().await?;
                serde_json::from_slice(&body).map_err(RiotApiError::Serde)
            }
            status => Err(RiotApiError::Status(status)),
        }
    }
}

#[async_trait]
impl TftApi for RiotClient {
    async fn get_account_by_riot_id(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> RiotApiResponse<AccountDto> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.host(region.as_str()),
            urlencoding::encode(game_name),
            urlencoding::encode(tag_line)
        );

        self.request(url).await
    }

    async fn get_rank_entries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> RiotApiResponse<Vec<LeagueEntryDto>> {
        let url = format!(
            "{}/tft/league/v1/by-puuid/{}",
            self.host(platform.as_str()),
            urlencoding::encode(puuid)
        );

        self.request(url).await
    }

    async fn get_match_ids(
        &self,
        region: Region,
        puuid: &str,
        count: u32,
        start: u32,
    ) -> RiotApiResponse<Vec<String>> {
        let count = count.clamp(1, MAX_MATCH_IDS_PER_PAGE);
        let url = format!(
            "{}/tft/match/v1/matches/by-puuid/{}/ids?count={}&start={}",
            self.host(region.as_str()),
            urlencoding::encode(puuid),
            count,
            start
        );

        self.request(url).await
    }

    async fn get_match(&self, region: Region, match_id: &str) -> RiotApiResponse<MatchDto> {
        let url = format!(
            "{}/tft/match/v1/matches/{}",
            self.host(region.as_str()),
            urlencoding::encode(match_id)
        );

        self.request(url).await
    }
}
