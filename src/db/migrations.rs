//! Tenant record migrations, applied on raw JSON before typed decoding.
//!
//! Records written by older releases may miss fields, carry the removed
//! recap hour/minute settings, or have accounts without a dedup key.

use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use tracing::info;

use super::models::{CURRENT_SCHEMA_VERSION, TrackedAccount};
use crate::riot::Platform;

pub trait TenantMigration {
    const VERSION: u32;

    fn migrate(record: &mut Map<String, Value>);
}

/// Fills the tenant shape: channel, queue filter, recap config, accounts.
pub struct V1;

impl TenantMigration for V1 {
    const VERSION: u32 = 1;

    fn migrate(record: &mut Map<String, Value>) {
        match record.get("channelId") {
            Some(Value::String(_)) | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                let id = n.to_string();
                record.insert("channelId".into(), Value::String(id));
            }
            _ => {
                record.insert("channelId".into(), Value::Null);
            }
        }

        if !matches!(record.get("announceQueues"), Some(Value::Array(_)) | Some(Value::Null)) {
            record.insert(
                "announceQueues".into(),
                json!(["RANKED_TFT", "RANKED_TFT_DOUBLE_UP"]),
            );
        }

        let recap = record
            .entry("recap")
            .or_insert_with(|| Value::Object(Map::new()));
        if !recap.is_object() {
            *recap = Value::Object(Map::new());
        }
        if let Value::Object(recap) = recap {
            recap.entry("enabled").or_insert(Value::Bool(false));
            recap.entry("mode").or_insert(json!("DAILY"));
            recap.entry("queue").or_insert(json!("RANKED_TFT"));
            recap.entry("lastSentYmd").or_insert(Value::Null);
            recap.remove("hour");
            recap.remove("minute");
        }

        if !record.get("accounts").is_some_and(Value::is_array) {
            record.insert("accounts".into(), Value::Array(Vec::new()));
        }
    }
}

/// Account repair: dedup keys, routing derived from the region, sane
/// containers for snapshots and recap events, valid last sent date.
pub struct V2;

impl TenantMigration for V2 {
    const VERSION: u32 = 2;

    fn migrate(record: &mut Map<String, Value>) {
        if let Some(Value::Object(recap)) = record.get_mut("recap") {
            let valid = recap
                .get("lastSentYmd")
                .and_then(Value::as_str)
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok());
            if !valid {
                recap.insert("lastSentYmd".into(), Value::Null);
            }
        }

        if let Some(Value::Array(accounts)) = record.get_mut("accounts") {
            accounts.retain(Value::is_object);
            for account in accounts.iter_mut() {
                if let Value::Object(account) = account {
                    migrate_account(account);
                }
            }
        }
    }
}

fn str_field<'a>(account: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    account
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn migrate_account(account: &mut Map<String, Value>) {
    if str_field(account, "platform").is_none()
        && let Some(platform) = str_field(account, "region").and_then(|r| r.parse::<Platform>().ok())
    {
        account.insert("platform".into(), json!(platform.as_str()));
        account.insert("regional".into(), json!(platform.to_region().as_str()));
    }

    if str_field(account, "key").is_none()
        && let (Some(name), Some(tag), Some(platform)) = (
            str_field(account, "gameName"),
            str_field(account, "tagLine"),
            str_field(account, "platform"),
        )
    {
        let key = TrackedAccount::make_key(name, tag, platform);
        account.insert("key".into(), Value::String(key));
    }

    match account.get_mut("lastRankByQueue") {
        Some(Value::Object(snapshots)) => snapshots.retain(|_, v| v.is_object()),
        _ => {
            account.insert("lastRankByQueue".into(), Value::Object(Map::new()));
        }
    }

    match account.get_mut("recapEvents") {
        Some(Value::Array(events)) => events.retain(|e| {
            e.get("matchId").is_some_and(Value::is_string)
                && e.get("at").is_some_and(Value::is_i64)
                && e.get("queueType").is_some_and(Value::is_string)
        }),
        _ => {
            account.insert("recapEvents".into(), Value::Array(Vec::new()));
        }
    }
}

/// Brings one tenant record to the current schema. Returns whether anything
/// was rewritten.
pub fn migrate_tenant(guild_id: &str, record: &mut Value) -> bool {
    if !record.is_object() {
        *record = Value::Object(Map::new());
    }
    let Value::Object(record) = record else {
        return false;
    };

    let version = record
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if version >= u64::from(CURRENT_SCHEMA_VERSION) {
        return false;
    }
    if version < u64::from(V1::VERSION) {
        V1::migrate(record);
    }
    if version < u64::from(V2::VERSION) {
        V2::migrate(record);
    }

    record.insert("schemaVersion".into(), json!(CURRENT_SCHEMA_VERSION));
    info!(guild_id, from = version, to = CURRENT_SCHEMA_VERSION, "🗄️ Migrated tenant record");

    true
}
