use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::riot::{Platform, Region};
use crate::tft::{QueueType, RANKED_QUEUES, RankSnapshots, RecapEvent, RecapMode, RecapRow};

/// Schema version written on every tenant record.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Discord guild snowflakes. Other top level keys are kept but never polled.
pub fn is_tenant_id(key: &str) -> bool {
    (17..=20).contains(&key.len()) && key.bytes().all(|b| b.is_ascii_digit())
}

/// The whole store document: guild id to tenant record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub(crate) tenants: BTreeMap<String, TenantRecord>,
    /// Keys that are not guild ids, written back untouched.
    pub(crate) other: Map<String, Value>,
}

impl Registry {
    /// Guild tenants in key order.
    pub fn tenants(&self) -> impl Iterator<Item = (&str, &TenantRecord)> {
        self.tenants
            .iter()
            .filter(|(id, _)| is_tenant_id(id))
            .map(|(id, tenant)| (id.as_str(), tenant))
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        self.tenants().map(|(id, _)| id.to_string()).collect()
    }

    pub fn tenant(&self, guild_id: &str) -> Option<&TenantRecord> {
        self.tenants.get(guild_id)
    }

    pub fn tenant_mut(&mut self, guild_id: &str) -> Option<&mut TenantRecord> {
        self.tenants.get_mut(guild_id)
    }

    /// Returns the tenant, creating it with defaults on first use.
    pub fn tenant_entry(&mut self, guild_id: &str) -> &mut TenantRecord {
        self.tenants.entry(guild_id.to_string()).or_default()
    }

    pub fn total_accounts(&self) -> usize {
        self.tenants().map(|(_, t)| t.accounts.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub schema_version: u32,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// `None` announces every queue.
    #[serde(default)]
    pub announce_queues: Option<Vec<QueueType>>,
    #[serde(default)]
    pub recap: RecapConfig,
    #[serde(default)]
    pub accounts: Vec<TrackedAccount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TenantRecord {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            channel_id: None,
            announce_queues: Some(RANKED_QUEUES.to_vec()),
            recap: RecapConfig::default(),
            accounts: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl TenantRecord {
    pub fn announces(&self, queue: QueueType) -> bool {
        self.announce_queues
            .as_ref()
            .is_none_or(|queues| queues.contains(&queue))
    }

    pub fn account(&self, key: &str) -> Option<&TrackedAccount> {
        self.accounts.iter().find(|a| a.key.as_deref() == Some(key))
    }

    pub fn account_mut(&mut self, key: &str) -> Option<&mut TrackedAccount> {
        self.accounts
            .iter_mut()
            .find(|a| a.key.as_deref() == Some(key))
    }

    /// One row per account over events at or after `cutoff_ms`.
    pub fn recap_rows(&self, queue: QueueType, cutoff_ms: i64) -> Vec<RecapRow> {
        self.accounts
            .iter()
            .map(|a| RecapRow::summarize(a.riot_id(), &a.recap_events, queue, cutoff_ms))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecapConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: RecapMode,
    #[serde(default = "default_recap_queue")]
    pub queue: QueueType,
    #[serde(default)]
    pub last_sent_ymd: Option<NaiveDate>,
}

fn default_recap_queue() -> QueueType {
    QueueType::RankedTft
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RecapMode::Daily,
            queue: default_recap_queue(),
            last_sent_ymd: None,
        }
    }
}

/// Partial update of a [`RecapConfig`]; `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecapConfigPatch {
    pub enabled: Option<bool>,
    pub mode: Option<RecapMode>,
    pub queue: Option<QueueType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAccount {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
    #[serde(default)]
    pub puuid: Option<String>,
    /// Region code as typed by the user, e.g. `EUW`.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub regional: Option<String>,
    #[serde(default)]
    pub last_match_id: Option<String>,
    #[serde(default)]
    pub last_rank_by_queue: RankSnapshots,
    #[serde(default)]
    pub recap_events: Vec<RecapEvent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resolved Riot routing of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRouting {
    pub key: String,
    pub puuid: String,
    pub platform: Platform,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("account has no {0}")]
    Missing(&'static str),
    #[error("account has an unknown {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

impl TrackedAccount {
    pub fn new(game_name: &str, tag_line: &str, puuid: &str, platform: Platform) -> Self {
        Self {
            key: Some(Self::make_key(game_name, tag_line, platform.as_str())),
            game_name: game_name.to_string(),
            tag_line: tag_line.to_string(),
            puuid: Some(puuid.to_string()),
            region: Some(platform.region_code().to_string()),
            platform: Some(platform.as_str().to_string()),
            regional: Some(platform.to_region().as_str().to_string()),
            last_match_id: None,
            last_rank_by_queue: RankSnapshots::new(),
            recap_events: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Case-insensitive `name#tag@platform` dedup key.
    pub fn make_key(game_name: &str, tag_line: &str, platform: &str) -> String {
        format!("{game_name}#{tag_line}@{platform}").to_lowercase()
    }

    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.game_name, self.tag_line)
    }

    pub fn routing(&self) -> Result<AccountRouting, RoutingError> {
        let key = non_empty(&self.key).ok_or(RoutingError::Missing("key"))?;
        let puuid = non_empty(&self.puuid).ok_or(RoutingError::Missing("puuid"))?;
        let platform = non_empty(&self.platform).ok_or(RoutingError::Missing("platform"))?;
        let regional = non_empty(&self.regional).ok_or(RoutingError::Missing("regional"))?;

        let platform: Platform = platform.parse().map_err(|_| RoutingError::Invalid {
            field: "platform",
            value: platform.to_string(),
        })?;
        let region: Region = regional.parse().map_err(|_| RoutingError::Invalid {
            field: "regional",
            value: regional.to_string(),
        })?;

        Ok(AccountRouting {
            key: key.to_string(),
            puuid: puuid.to_string(),
            platform,
            region,
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}
