use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_DATA_DIR: &str = "./user_data";
const DATA_FILE_NAME: &str = "registrations.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub riot_api_key: String,
    pub data_path: PathBuf,
    /// Channel used for recaps of tenants without their own channel.
    pub fallback_channel_id: Option<String>,
    pub match_poll_interval_secs: u64,
    pub per_account_delay_ms: u64,
    pub rank_refresh_interval_minutes: u64,
    pub match_backfill_limit: usize,
    pub recap_autopost_hour: u32,
    pub recap_autopost_minute: u32,
    pub recap_autopost_poll_secs: u64,
    pub riot_rate_limit_per_second: u32,
    pub riot_rate_limit_per_two_minutes: u32,
    pub ddragon_cache_ttl_minutes: u64,
    pub log_dir: Option<PathBuf>,
    pub log_max_files: Option<usize>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let discord_token =
            var("DISCORD_TOKEN").ok_or_else(|| AppError::Config("DISCORD_TOKEN must be set".into()))?;

        let riot_api_key =
            var("RIOT_API_KEY").ok_or_else(|| AppError::Config("RIOT_API_KEY must be set".into()))?;

        let data_path = match var("DATA_PATH") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(var("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()))
                .join(DATA_FILE_NAME),
        };

        Ok(Self {
            discord_token,
            riot_api_key,
            data_path,
            fallback_channel_id: var("DISCORD_CHANNEL_ID"),
            match_poll_interval_secs: read_int(&var, "MATCH_POLL_INTERVAL_SECONDS", 10..=3600, 60)?,
            per_account_delay_ms: read_int(&var, "MATCH_POLL_PER_ACCOUNT_DELAY_MS", 0..=10_000, 250)?,
            rank_refresh_interval_minutes: read_int(
                &var,
                "RANK_REFRESH_INTERVAL_MINUTES",
                5..=1440,
                180,
            )?,
            match_backfill_limit: read_int(&var, "MATCH_BACKFILL_LIMIT", 1..=100, 10)?,
            recap_autopost_hour: read_int(&var, "RECAP_AUTOPOST_HOUR", 0..=23, 9)?,
            recap_autopost_minute: read_int(&var, "RECAP_AUTOPOST_MINUTE", 0..=59, 0)?,
            recap_autopost_poll_secs: read_int(&var, "RECAP_AUTOPOST_POLL_SECONDS", 30..=3600, 300)?,
            riot_rate_limit_per_second: read_int(&var, "RIOT_RATE_LIMIT_PER_SECOND", 1..=500, 20)?,
            riot_rate_limit_per_two_minutes: read_int(
                &var,
                "RIOT_RATE_LIMIT_PER_TWO_MINUTES",
                1..=30_000,
                100,
            )?,
            ddragon_cache_ttl_minutes: read_int(&var, "DDRAGON_CACHE_TTL_MINUTES", 1..=10_080, 360)?,
            log_dir: var("LOG_DIR").map(PathBuf::from),
            log_max_files: var("LOG_MAX_FILES")
                .map(|v| {
                    v.parse::<usize>()
                        .map_err(|_| AppError::Config(format!("LOG_MAX_FILES must be an integer, got {v:?}")))
                })
                .transpose()?,
            log_json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    pub fn match_poll_interval(&self) -> Duration {
        Duration::from_secs(self.match_poll_interval_secs)
    }

    pub fn per_account_delay(&self) -> Duration {
        Duration::from_millis(self.per_account_delay_ms)
    }

    pub fn rank_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rank_refresh_interval_minutes * 60)
    }

    pub fn recap_autopost_poll_interval(&self) -> Duration {
        Duration::from_secs(self.recap_autopost_poll_secs)
    }

    pub fn ddragon_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.ddragon_cache_ttl_minutes * 60)
    }
}

/// Reads an integer variable, falling back to `default` when unset.
fn read_int<T, F>(var: &F, key: &str, range: RangeInclusive<T>, default: T) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(default);
    };

    let value: T = raw
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be an integer, got {raw:?}")))?;

    if !range.contains(&value) {
        return Err(AppError::Config(format!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )));
    }

    Ok(value)
}
