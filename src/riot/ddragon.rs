//! Data Dragon lookups (latest patch and TFT regalia art) behind a TTL cache.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::types::{RiotApiError, RiotApiResponse};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::tft::QueueType;

const DDRAGON_BASE_URL: &str = "https://ddragon.leagueoflegends.com";

pub struct Ddragon {
    client: reqwest::Client,
    base_url: String,
    version: TtlCache<(), String>,
    /// Regalia datasets keyed by patch version.
    regalia: TtlCache<String, Arc<Value>>,
}

impl Ddragon {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DDRAGON_BASE_URL.to_string(),
            version: TtlCache::new(ttl, clock.clone()),
            regalia: TtlCache::new(ttl, clock),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch<T: DeserializeOwned>(&self, url: String) -> RiotApiResponse<T> {
        debug!(url, "🐉 Fetching Data Dragon resource");

        let res = self.client.get(url).send().await?;
        match res.status() {
            StatusCode::OK => {
                let body = res.bytes().await?;
                serde_json::from_slice(&body).map_err(RiotApiError::Serde)
            }
            status => Err(RiotApiError::Status(status)),
        }
    }

    pub async fn latest_version(&self) -> RiotApiResponse<String> {
        self.version
            .get_or_try_insert_with((), || async {
                let versions: Vec<String> = self
                    .fetch(format!("{}/api/versions.json", self.base_url))
                    .await?;
                versions
                    .into_iter()
                    .next()
                    .ok_or(RiotApiError::Status(StatusCode::NOT_FOUND))
            })
            .await
    }

    async fn regalia(&self, version: &str) -> RiotApiResponse<Arc<Value>> {
        self.regalia
            .get_or_try_insert_with(version.to_string(), || async {
                let url = format!(
                    "{}/cdn/{}/data/en_US/tft-regalia.json",
                    self.base_url, version
                );
                self.fetch::<Value>(url).await.map(Arc::new)
            })
            .await
    }

    /// Regalia crest for a queue and tier, `None` when Data Dragon has no
    /// art for that combination.
    pub async fn regalia_thumbnail(
        &self,
        queue: QueueType,
        tier: &str,
    ) -> RiotApiResponse<Option<String>> {
        let Some(tier_key) = title_case(tier) else {
            return Ok(None);
        };

        let version = self.latest_version().await?;
        let regalia = self.regalia(&version).await?;

        let file = regalia
            .pointer(&format!("/data/{}/{}/image/full", queue.as_str(), tier_key))
            .and_then(Value::as_str);

        Ok(file.map(|file| {
            format!(
                "{}/cdn/{}/img/tft-regalia/{}",
                self.base_url, version, file
            )
        }))
    }
}

fn title_case(tier: &str) -> Option<String> {
    let lower = tier.trim().to_lowercase();
    let mut chars = lower.chars();
    let first = chars.next()?;

    Some(first.to_uppercase().chain(chars).collect())
}
