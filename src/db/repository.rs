use chrono::NaiveDate;

use super::models::{RecapConfig, RecapConfigPatch, Registry, TrackedAccount};
use super::{Mutation, Store, StoreError};
use crate::tft::{QueueType, RankSnapshots, RecapEvent};

/// Poll results for one account, written back in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct AccountProgress {
    pub last_match_id: Option<String>,
    pub last_rank_by_queue: Option<RankSnapshots>,
    pub recap_events: Option<Vec<RecapEvent>>,
}

/// Typed operations over the [`Store`]. Each one is a single transaction.
#[derive(Clone, Debug)]
pub struct Repository {
    store: Store,
}

impl Repository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn load(&self) -> Result<Registry, StoreError> {
        self.store.load().await
    }

    // === Account operations ===

    /// Inserts the account or merges it into the one with the same key.
    /// Returns whether it already existed.
    pub async fn upsert_account(
        &self,
        guild_id: &str,
        account: TrackedAccount,
    ) -> Result<bool, StoreError> {
        let guild_id = guild_id.to_string();

        self.store
            .transaction(move |registry| {
                let tenant = registry.tenant_entry(&guild_id);
                let existing = account
                    .key
                    .as_deref()
                    .and_then(|key| tenant.accounts.iter().position(|a| a.key.as_deref() == Some(key)));

                match existing {
                    Some(idx) => {
                        let current = &mut tenant.accounts[idx];
                        let mut merged = account;
                        merged.extra = std::mem::take(&mut current.extra);
                        if merged.recap_events.is_empty() {
                            merged.recap_events = std::mem::take(&mut current.recap_events);
                        }
                        *current = merged;
                        Mutation::changed(true)
                    }
                    None => {
                        tenant.accounts.push(account);
                        Mutation::changed(false)
                    }
                }
            })
            .await
    }

    /// Removes the account with `key`, returning it if it was tracked.
    pub async fn remove_account(
        &self,
        guild_id: &str,
        key: &str,
    ) -> Result<Option<TrackedAccount>, StoreError> {
        let guild_id = guild_id.to_string();
        let key = key.to_string();

        self.store
            .transaction(move |registry| {
                let Some(tenant) = registry.tenant_mut(&guild_id) else {
                    return Mutation::unchanged(None);
                };
                match tenant
                    .accounts
                    .iter()
                    .position(|a| a.key.as_deref() == Some(key.as_str()))
                {
                    Some(idx) => Mutation::changed(Some(tenant.accounts.remove(idx))),
                    None => Mutation::unchanged(None),
                }
            })
            .await
    }

    pub async fn list_accounts(&self, guild_id: &str) -> Result<Vec<TrackedAccount>, StoreError> {
        let registry = self.store.load().await?;
        Ok(registry
            .tenant(guild_id)
            .map(|t| t.accounts.clone())
            .unwrap_or_default())
    }

    /// Applies poll results to an account that is still tracked. Returns
    /// `false` when the account was removed in the meantime.
    pub async fn update_account_progress(
        &self,
        guild_id: &str,
        key: &str,
        progress: AccountProgress,
    ) -> Result<bool, StoreError> {
        let guild_id = guild_id.to_string();
        let key = key.to_string();

        self.store
            .transaction(move |registry| {
                let Some(account) = registry
                    .tenant_mut(&guild_id)
                    .and_then(|t| t.account_mut(&key))
                else {
                    return Mutation::unchanged(false);
                };

                let mut changed = false;
                if let Some(match_id) = progress.last_match_id
                    && account.last_match_id.as_deref() != Some(match_id.as_str())
                {
                    account.last_match_id = Some(match_id);
                    changed = true;
                }
                if let Some(snapshots) = progress.last_rank_by_queue
                    && account.last_rank_by_queue != snapshots
                {
                    account.last_rank_by_queue = snapshots;
                    changed = true;
                }
                if let Some(events) = progress.recap_events
                    && account.recap_events != events
                {
                    account.recap_events = events;
                    changed = true;
                }

                Mutation {
                    value: true,
                    changed,
                }
            })
            .await
    }

    // === Tenant settings ===

    pub async fn set_channel(
        &self,
        guild_id: &str,
        channel_id: Option<String>,
    ) -> Result<(), StoreError> {
        let guild_id = guild_id.to_string();

        self.store
            .transaction(move |registry| {
                registry.tenant_entry(&guild_id).channel_id = channel_id;
                Mutation::changed(())
            })
            .await
    }

    /// `None` announces every queue.
    pub async fn set_announce_queues(
        &self,
        guild_id: &str,
        queues: Option<Vec<QueueType>>,
    ) -> Result<(), StoreError> {
        let guild_id = guild_id.to_string();

        self.store
            .transaction(move |registry| {
                registry.tenant_entry(&guild_id).announce_queues = queues;
                Mutation::changed(())
            })
            .await
    }

    pub async fn set_recap_config(
        &self,
        guild_id: &str,
        patch: RecapConfigPatch,
    ) -> Result<RecapConfig, StoreError> {
        let guild_id = guild_id.to_string();

        self.store
            .transaction(move |registry| {
                let recap = &mut registry.tenant_entry(&guild_id).recap;
                if let Some(enabled) = patch.enabled {
                    recap.enabled = enabled;
                }
                if let Some(mode) = patch.mode {
                    recap.mode = mode;
                }
                if let Some(queue) = patch.queue {
                    recap.queue = queue;
                }
                Mutation::changed(recap.clone())
            })
            .await
    }

    /// Records the day a recap was posted. Returns `false` (and writes
    /// nothing) when that day was already recorded.
    pub async fn set_recap_last_sent(
        &self,
        guild_id: &str,
        day: NaiveDate,
    ) -> Result<bool, StoreError> {
        let guild_id = guild_id.to_string();

        self.store
            .transaction(move |registry| {
                let recap = &mut registry.tenant_entry(&guild_id).recap;
                if recap.last_sent_ymd == Some(day) {
                    return Mutation::unchanged(false);
                }
                recap.last_sent_ymd = Some(day);
                Mutation::changed(true)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot::Platform;
    use crate::tft::{RankSnapshot, RecapMode};

    const GUILD: &str = "123456789012345678";

    fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("registrations.json"));
        (dir, Repository::new(store))
    }

    fn account(name: &str) -> TrackedAccount {
        TrackedAccount::new(name, "EUW", &format!("puuid-{name}"), Platform::EUW1)
    }

    #[tokio::test]
    async fn upsert_reports_existing_accounts() {
        let (_dir, repo) = repo();

        assert!(!repo.upsert_account(GUILD, account("Alice")).await.unwrap());

        let mut renamed = account("ALICE");
        renamed.last_match_id = Some("EUW1_9".into());
        assert!(repo.upsert_account(GUILD, renamed).await.unwrap());

        let accounts = repo.list_accounts(GUILD).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].game_name, "ALICE");
        assert_eq!(accounts[0].last_match_id.as_deref(), Some("EUW1_9"));
    }

    #[tokio::test]
    async fn remove_account_by_key() {
        let (_dir, repo) = repo();
        repo.upsert_account(GUILD, account("Alice")).await.unwrap();

        let removed = repo.remove_account(GUILD, "alice#euw@euw1").await.unwrap();
        assert_eq!(removed.map(|a| a.game_name), Some("Alice".to_string()));

        assert!(repo.remove_account(GUILD, "alice#euw@euw1").await.unwrap().is_none());
        assert!(repo.remove_account("999999999999999999", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn progress_never_resurrects_removed_accounts() {
        let (_dir, repo) = repo();
        repo.upsert_account(GUILD, account("Alice")).await.unwrap();
        repo.remove_account(GUILD, "alice#euw@euw1").await.unwrap();

        let progress = AccountProgress {
            last_match_id: Some("EUW1_2".into()),
            ..Default::default()
        };
        let applied = repo
            .update_account_progress(GUILD, "alice#euw@euw1", progress)
            .await
            .unwrap();

        assert!(!applied);
        assert!(repo.list_accounts(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_updates_cursor_snapshot_and_log() {
        let (_dir, repo) = repo();
        repo.upsert_account(GUILD, account("Alice")).await.unwrap();

        let snapshots = RankSnapshots::from([(
            QueueType::RankedTft,
            RankSnapshot {
                tier: Some("GOLD".into()),
                rank: Some("I".into()),
                lp: Some(12),
                wins: 1,
                losses: 2,
                last_updated_at: Some(5),
            },
        )]);
        let events = vec![RecapEvent {
            match_id: "EUW1_2".into(),
            at: 5,
            queue_type: QueueType::RankedTft,
            delta: 12,
            placement: Some(2),
        }];
        let progress = AccountProgress {
            last_match_id: Some("EUW1_2".into()),
            last_rank_by_queue: Some(snapshots.clone()),
            recap_events: Some(events.clone()),
        };

        assert!(
            repo.update_account_progress(GUILD, "alice#euw@euw1", progress)
                .await
                .unwrap()
        );

        let stored = &repo.list_accounts(GUILD).await.unwrap()[0];
        assert_eq!(stored.last_match_id.as_deref(), Some("EUW1_2"));
        assert_eq!(stored.last_rank_by_queue, snapshots);
        assert_eq!(stored.recap_events, events);
    }

    #[tokio::test]
    async fn tenant_settings_round_trip() {
        let (_dir, repo) = repo();

        repo.set_channel(GUILD, Some("555".into())).await.unwrap();
        repo.set_announce_queues(GUILD, None).await.unwrap();
        let recap = repo
            .set_recap_config(
                GUILD,
                RecapConfigPatch {
                    enabled: Some(true),
                    mode: Some(RecapMode::Weekly),
                    queue: None,
                },
            )
            .await
            .unwrap();
        assert!(recap.enabled);
        assert_eq!(recap.queue, QueueType::RankedTft);

        let registry = repo.load().await.unwrap();
        let tenant = registry.tenant(GUILD).unwrap();
        assert_eq!(tenant.channel_id.as_deref(), Some("555"));
        assert_eq!(tenant.announce_queues, None);
        assert_eq!(tenant.recap.mode, RecapMode::Weekly);
    }

    #[tokio::test]
    async fn last_sent_marker_is_written_once_per_day() {
        let (_dir, repo) = repo();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        assert!(repo.set_recap_last_sent(GUILD, day).await.unwrap());
        assert!(!repo.set_recap_last_sent(GUILD, day).await.unwrap());

        let next = day.succ_opt().unwrap();
        assert!(repo.set_recap_last_sent(GUILD, next).await.unwrap());
    }
}
