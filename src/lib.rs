//! TFT ranked progress tracker: polls Riot for new matches of tracked
//! accounts, posts results to Discord and keeps a daily LP recap.

pub mod alert;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod poller;
pub mod rate_limiter;
pub mod riot;
pub mod tft;
pub mod tracking;
