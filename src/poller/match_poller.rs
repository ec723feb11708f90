use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Span, debug, error, info, instrument, warn};

use super::TickGuard;
use super::discovery::find_unseen_matches;
use crate::alert::{AlertSender, MatchOutcome, match_alert};
use crate::clock::Clock;
use crate::config::Config;
use crate::db::repository::AccountProgress;
use crate::db::{AccountRouting, Repository, StoreError, TenantRecord, TrackedAccount};
use crate::riot::{Ddragon, MatchDto, RiotApiError, TftApi};
use crate::tft::recap::{self, RecapEvent};
use crate::tft::{QueueType, RankSnapshot, RankSnapshots, compute_deltas, should_refresh, to_snapshots};

#[derive(Debug, thiserror::Error)]
enum PollerError {
    #[error(transparent)]
    Riot(#[from] RiotApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Lower bound of the pause between two accounts.
    pub per_account_delay: Duration,
    pub rank_refresh_after: Duration,
    pub backfill_limit: usize,
}

impl PollerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.match_poll_interval(),
            per_account_delay: config.per_account_delay(),
            rank_refresh_after: config.rank_refresh_interval(),
            backfill_limit: config.match_backfill_limit,
        }
    }

    /// Pause after each account so that one sweep spreads over the interval.
    pub fn pacing(&self, total_accounts: usize) -> Duration {
        if total_accounts == 0 {
            return self.per_account_delay;
        }

        let interval_ms = self.interval.as_millis() as u64;
        let spread = Duration::from_millis(interval_ms.div_ceil(total_accounts as u64));
        spread.max(self.per_account_delay)
    }

    fn rank_refresh_ms(&self) -> i64 {
        self.rank_refresh_after.as_millis() as i64
    }
}

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub accounts: usize,
    pub skipped: usize,
    pub failed: usize,
    pub matches: usize,
    pub alerts: usize,
}

/// One fetched match, reduced to what the batch needs.
#[derive(Debug)]
struct PlayedMatch {
    match_id: String,
    queue: QueueType,
    placement: Option<u8>,
    played_at: Option<i64>,
}

impl PlayedMatch {
    fn new(match_id: String, game: &MatchDto, puuid: &str) -> Self {
        let queue = game.info.queue_type();
        let placement = game
            .info
            .participant(puuid)
            .and_then(|p| p.placement)
            .and_then(|p| queue.normalize_placement(p));

        Self {
            match_id,
            queue,
            placement,
            played_at: game.info.game_datetime,
        }
    }
}

pub struct MatchPoller<A, S> {
    api: A,
    repo: Repository,
    sender: S,
    clock: Arc<dyn Clock>,
    ddragon: Option<Arc<Ddragon>>,
    settings: PollerSettings,
    running: AtomicBool,
}

impl<A, S> MatchPoller<A, S>
where
    A: TftApi + 'static,
    S: AlertSender + 'static,
{
    pub fn new(
        api: A,
        repo: Repository,
        sender: S,
        clock: Arc<dyn Clock>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            api,
            repo,
            sender,
            clock,
            ddragon: None,
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// Enables regalia thumbnails on ranked alerts.
    pub fn with_ddragon(mut self, ddragon: Arc<Ddragon>) -> Self {
        self.ddragon = Some(ddragon);
        self
    }

    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Runs a sweep every interval until `shutdown` flips. Sweeps run inline,
    /// so a sweep longer than the interval delays the next one and shutdown
    /// waits for the sweep in flight.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            backfill_limit = self.settings.backfill_limit,
            "🔄 Match poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            self.tick().await;
        }

        info!("🔄 Match poller stopped");
    }

    /// One sweep over every tracked account. `None` when a sweep was
    /// already running.
    #[instrument(skip_all, fields(account_count))]
    pub async fn tick(&self) -> Option<TickReport> {
        let Some(_guard) = TickGuard::acquire(&self.running) else {
            warn!("🔄 ⚠️ Previous poll cycle still running, skipping tick");
            return None;
        };

        let mut report = TickReport::default();

        let registry = match self.repo.load().await {
            Ok(registry) => registry,
            Err(e) => {
                error!(error = ?e, "🔄 ❌ Failed to load registrations");
                return Some(report);
            }
        };

        let total = registry.total_accounts();
        if total == 0 {
            debug!("🔄 No accounts tracked, skipping poll cycle");
            return Some(report);
        }

        Span::current().record("account_count", total);
        let pacing = self.settings.pacing(total);
        info!(
            count = total,
            pacing_ms = pacing.as_millis() as u64,
            "🔄 Polling {} account(s)",
            total
        );

        for (guild_id, tenant) in registry.tenants() {
            for account in &tenant.accounts {
                report.accounts += 1;

                match account.routing() {
                    Ok(routing) => {
                        if let Err(e) = self
                            .poll_account(guild_id, tenant, account, &routing, &mut report)
                            .await
                        {
                            report.failed += 1;
                            warn!(
                                error = ?e,
                                guild_id,
                                riot_id = %account.riot_id(),
                                "🔄 ⚠️ Failed to poll account"
                            );
                        }
                    }
                    Err(e) => {
                        report.skipped += 1;
                        warn!(
                            error = %e,
                            guild_id,
                            riot_id = %account.riot_id(),
                            "🔄 ⚠️ Skipping account with incomplete routing"
                        );
                    }
                }

                sleep(pacing).await;
            }
        }

        info!(
            accounts = report.accounts,
            skipped = report.skipped,
            failed = report.failed,
            matches = report.matches,
            alerts = report.alerts,
            "🔄 Poll cycle finished"
        );

        Some(report)
    }

    #[instrument(
        skip(self, tenant, account, routing, report),
        fields(key = %routing.key, platform = %routing.platform)
    )]
    async fn poll_account(
        &self,
        guild_id: &str,
        tenant: &TenantRecord,
        account: &TrackedAccount,
        routing: &AccountRouting,
        report: &mut TickReport,
    ) -> Result<(), PollerError> {
        let mut before = account.last_rank_by_queue.clone();

        if should_refresh(&before, self.clock.now_ms(), self.settings.rank_refresh_ms()) {
            match self.fetch_snapshots(routing).await {
                Ok(fresh) => {
                    let progress = AccountProgress {
                        last_rank_by_queue: Some(fresh.clone()),
                        ..Default::default()
                    };
                    if !self
                        .repo
                        .update_account_progress(guild_id, &routing.key, progress)
                        .await?
                    {
                        debug!("🔄 Account untracked during the cycle");
                        return Ok(());
                    }
                    debug!(queues = fresh.len(), "📊 Rank snapshot refreshed");
                    before = fresh;
                }
                Err(e) => {
                    warn!(error = ?e, "📊 ⚠️ Rank refresh failed, keeping stored snapshot");
                }
            }
        }

        let unseen = find_unseen_matches(
            &self.api,
            routing.region,
            &routing.puuid,
            account.last_match_id.as_deref(),
            self.settings.backfill_limit,
        )
        .await?;

        if unseen.is_empty() {
            debug!("🔄 No new match");
            return Ok(());
        }

        // Oldest first so the cursor only ever moves forward.
        let mut played = Vec::with_capacity(unseen.len());
        for match_id in unseen.into_iter().rev() {
            let game = self.api.get_match(routing.region, &match_id).await?;
            played.push(PlayedMatch::new(match_id, &game, &routing.puuid));
        }

        // A single refresh, attributed to the newest ranked game.
        let last_ranked = played.iter().rposition(|m| m.queue.is_ranked());
        let mut after: Option<RankSnapshots> = None;
        if last_ranked.is_some() {
            match self.fetch_snapshots(routing).await {
                Ok(fresh) => after = Some(fresh),
                Err(e) => warn!(error = ?e, "📊 ⚠️ Post-match rank refresh failed, LP change omitted"),
            }
        }
        let deltas = after
            .as_ref()
            .map(|after| compute_deltas(&before, after))
            .unwrap_or_default();

        let mut recap_events = account.recap_events.clone();

        for (idx, game) in played.iter().enumerate() {
            report.matches += 1;

            let newest_ranked = last_ranked == Some(idx);
            let delta = newest_ranked
                .then(|| deltas.get(&game.queue).copied())
                .flatten();
            let rank_after = newest_ranked
                .then(|| after.as_ref().and_then(|a| a.get(&game.queue)).cloned())
                .flatten();

            if game.queue.is_ranked() {
                recap_events = recap::append(
                    recap_events,
                    RecapEvent {
                        match_id: game.match_id.clone(),
                        at: game.played_at.unwrap_or_else(|| self.clock.now_ms()),
                        queue_type: game.queue,
                        delta: delta.unwrap_or(0),
                        placement: game.placement,
                    },
                );
            }

            if !tenant.announces(game.queue) {
                debug!(
                    match_id = %game.match_id,
                    queue = game.queue.as_str(),
                    "🔄 Queue not announced in this guild"
                );
                continue;
            }

            info!(
                match_id = %game.match_id,
                queue = game.queue.as_str(),
                placement = ?game.placement,
                delta = ?delta,
                "🔄 ✅ New match detected"
            );

            let Some(channel_id) = tenant.channel_id.as_deref() else {
                debug!("🔄 No alert channel configured for this guild");
                continue;
            };

            let outcome = MatchOutcome {
                game_name: account.game_name.clone(),
                tag_line: account.tag_line.clone(),
                match_id: game.match_id.clone(),
                queue: game.queue,
                placement: game.placement,
                delta,
                thumbnail: self.thumbnail(game.queue, rank_after.as_ref()).await,
                rank_after,
            };

            match self.sender.send_alert(channel_id, &match_alert(&outcome)).await {
                Ok(()) => report.alerts += 1,
                Err(e) => warn!(
                    error = ?e,
                    channel_id,
                    match_id = %game.match_id,
                    "🔄 ⚠️ Failed to send match alert"
                ),
            }
        }

        let progress = AccountProgress {
            last_match_id: played.last().map(|m| m.match_id.clone()),
            last_rank_by_queue: Some(after.unwrap_or(before)),
            recap_events: Some(recap_events),
        };
        if !self
            .repo
            .update_account_progress(guild_id, &routing.key, progress)
            .await?
        {
            debug!("🔄 Account untracked during the cycle, progress dropped");
        }

        Ok(())
    }

    async fn fetch_snapshots(&self, routing: &AccountRouting) -> Result<RankSnapshots, RiotApiError> {
        let entries = self
            .api
            .get_rank_entries(routing.platform, &routing.puuid)
            .await?;
        Ok(to_snapshots(&entries, self.clock.now_ms()))
    }

    async fn thumbnail(&self, queue: QueueType, rank: Option<&RankSnapshot>) -> Option<String> {
        let ddragon = self.ddragon.as_ref()?;
        let tier = rank?.tier.as_deref()?;

        match ddragon.regalia_thumbnail(queue, tier).await {
            Ok(url) => url,
            Err(e) => {
                debug!(error = ?e, "🐉 Regalia lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(interval_secs: u64, floor_ms: u64) -> PollerSettings {
        PollerSettings {
            interval: Duration::from_secs(interval_secs),
            per_account_delay: Duration::from_millis(floor_ms),
            rank_refresh_after: Duration::from_secs(3600),
            backfill_limit: 10,
        }
    }

    #[test]
    fn pacing_spreads_accounts_over_the_interval() {
        let settings = settings(60, 250);

        assert_eq!(settings.pacing(1), Duration::from_secs(60));
        assert_eq!(settings.pacing(7), Duration::from_millis(8572));
        assert_eq!(settings.pacing(1000), Duration::from_millis(250));
        assert_eq!(settings.pacing(0), Duration::from_millis(250));
    }
}
