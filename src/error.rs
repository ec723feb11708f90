use thiserror::Error;

use crate::alert::AlertError;
use crate::db::StoreError;
use crate::riot::RiotApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Riot API error: {0}")]
    RiotApi(#[from] RiotApiError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Player not found: {game_name}#{tag_line}")]
    PlayerNotFound { game_name: String, tag_line: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Player not tracked in this server")]
    PlayerNotTracked,

    #[error("Logging setup error: {0}")]
    Logging(String),
}
