//! Riot API access: routing, DTOs, the HTTP client and the request metrics.

use std::sync::Arc;

use async_trait::async_trait;

pub mod client;
pub mod ddragon;
pub mod metrics;
pub mod region;
pub mod types;

pub use client::RiotClient;
pub use ddragon::Ddragon;
pub use metrics::RequestMetrics;
pub use region::{Platform, Region};
pub use types::{
    AccountDto, InfoDto, LeagueEntryDto, MatchDto, ParticipantDto, RiotApiError,
    RiotApiResponse, RiotErrorKind,
};

/// The Riot endpoints the tracker relies on. Implementations must go through
/// the shared rate limiter.
#[async_trait]
pub trait TftApi: Send + Sync {
    async fn get_account_by_riot_id(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> RiotApiResponse<AccountDto>;

    async fn get_rank_entries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> RiotApiResponse<Vec<LeagueEntryDto>>;

    /// Newest first. `count` is clamped to 1..=20 by the endpoint.
    async fn get_match_ids(
        &self,
        region: Region,
        puuid: &str,
        count: u32,
        start: u32,
    ) -> RiotApiResponse<Vec<String>>;

    async fn get_match(&self, region: Region, match_id: &str) -> RiotApiResponse<MatchDto>;
}

#[async_trait]
impl<T: TftApi + ?Sized> TftApi for Arc<T> {
    async fn get_account_by_riot_id(
        &self,
        region: Region,
        game_name: &str,
        tag_line: &str,
    ) -> RiotApiResponse<AccountDto> {
        (**self)
            .get_account_by_riot_id(region, game_name, tag_line)
            .await
    }

    async fn get_rank_entries(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> RiotApiResponse<Vec<LeagueEntryDto>> {
        (**self).get_rank_entries(platform, puuid).await
    }

    async fn get_match_ids(
        &self,
        region: Region,
        puuid: &str,
        count: u32,
        start: u32,
    ) -> RiotApiResponse<Vec<String>> {
        (**self).get_match_ids(region, puuid, count, start).await
    }

    async fn get_match(&self, region: Region, match_id: &str) -> RiotApiResponse<MatchDto> {
        (**self).get_match(region, match_id).await
    }
}
