use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::tft::QueueType;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RiotApiError {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP status error: {0}")]
    Status(StatusCode),

    #[error("Decoding raw response error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// How the poller should read a failed call. None of them are retried
/// before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiotErrorKind {
    NotFound,
    Auth,
    Throttled,
    Transient,
    Decode,
}

impl RiotApiError {
    pub fn kind(&self) -> RiotErrorKind {
        match self {
            Self::Status(StatusCode::NOT_FOUND) => RiotErrorKind::NotFound,
            Self::Status(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => RiotErrorKind::Auth,
            Self::Status(StatusCode::TOO_MANY_REQUESTS) => RiotErrorKind::Throttled,
            Self::Status(_) => RiotErrorKind::Transient,
            Self::Reqwest(e) if e.is_decode() => RiotErrorKind::Decode,
            Self::Reqwest(_) => RiotErrorKind::Transient,
            Self::Serde(_) => RiotErrorKind::Decode,
        }
    }
}

/// A call to Riot API can either result in a success with the success type or fail with a [`RiotApiError`].
pub type RiotApiResponse<T> = Result<T, RiotApiError>;

// ============================================================================
// Account-v1
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
}

// ============================================================================
// TFT-League-v1
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntryDto {
    pub queue_type: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub league_points: i32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
}

// ============================================================================
// TFT-Match-v1
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDto {
    pub metadata: MetadataDto,
    pub info: InfoDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataDto {
    pub match_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoDto {
    /// Game start, epoch milliseconds.
    #[serde(default)]
    pub game_datetime: Option<i64>,
    #[serde(default)]
    pub game_length: Option<f64>,
    #[serde(default, alias = "queueId")]
    pub queue_id: Option<i64>,
    #[serde(default)]
    pub tft_set_number: Option<u32>,
    #[serde(default)]
    pub participants: Vec<ParticipantDto>,
}

impl InfoDto {
    pub fn queue_type(&self) -> QueueType {
        self.queue_id
            .map(QueueType::from_queue_id)
            .unwrap_or(QueueType::Unknown)
    }

    pub fn participant(&self, puuid: &str) -> Option<&ParticipantDto> {
        self.participants.iter().find(|p| p.puuid == puuid)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantDto {
    pub puuid: String,
    #[serde(default)]
    pub placement: Option<i64>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub last_round: Option<u32>,
}
