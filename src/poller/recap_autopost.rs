use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use super::TickGuard;
use crate::alert::{AlertSender, recap_alert};
use crate::clock::Clock;
use crate::config::Config;
use crate::db::{Repository, TenantRecord};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AutopostSettings {
    pub poll_interval: Duration,
    pub hour: u32,
    pub minute: u32,
    /// Used for tenants that never configured their own channel.
    pub fallback_channel_id: Option<String>,
}

impl AutopostSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.recap_autopost_poll_interval(),
            hour: config.recap_autopost_hour,
            minute: config.recap_autopost_minute,
            fallback_channel_id: config.fallback_channel_id.clone(),
        }
    }
}

/// A recap is due once local time has passed today's fire time and today's
/// recap has not been posted yet.
pub fn should_fire(now: NaiveDateTime, hour: u32, minute: u32, last_sent: Option<NaiveDate>) -> bool {
    let today = now.date();
    let Some(fire_at) = today.and_hms_opt(hour, minute, 0) else {
        return false;
    };

    now >= fire_at && last_sent != Some(today)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutopostReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct RecapAutoposter<S> {
    repo: Repository,
    sender: S,
    clock: Arc<dyn Clock>,
    settings: AutopostSettings,
    running: AtomicBool,
}

impl<S> RecapAutoposter<S>
where
    S: AlertSender + 'static,
{
    pub fn new(repo: Repository, sender: S, clock: Arc<dyn Clock>, settings: AutopostSettings) -> Self {
        Self {
            repo,
            sender,
            clock,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            hour = self.settings.hour,
            minute = self.settings.minute,
            poll_secs = self.settings.poll_interval.as_secs(),
            "📊 Recap autopost started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            self.tick().await;
        }

        info!("📊 Recap autopost stopped");
    }

    /// Posts every recap that is due. `None` when a previous run is still
    /// going.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> Option<AutopostReport> {
        let Some(_guard) = TickGuard::acquire(&self.running) else {
            warn!("📊 ⚠️ Previous recap run still going, skipping tick");
            return None;
        };

        let mut report = AutopostReport::default();

        let registry = match self.repo.load().await {
            Ok(registry) => registry,
            Err(e) => {
                error!(error = ?e, "📊 ❌ Failed to load registrations");
                return Some(report);
            }
        };

        let now = self.clock.local_now();
        let today = now.date();

        for (guild_id, tenant) in registry.tenants() {
            let recap = &tenant.recap;
            if !recap.enabled
                || !should_fire(now, self.settings.hour, self.settings.minute, recap.last_sent_ymd)
            {
                continue;
            }
            report.due += 1;

            let Some(channel_id) = tenant
                .channel_id
                .as_deref()
                .or(self.settings.fallback_channel_id.as_deref())
            else {
                debug!(guild_id, "📊 No channel for recap, skipping");
                continue;
            };

            match self.post(guild_id, tenant, channel_id, today).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, guild_id, channel_id, "📊 ⚠️ Failed to post recap");
                }
            }
        }

        if report.due > 0 {
            info!(
                due = report.due,
                sent = report.sent,
                failed = report.failed,
                "📊 Recap run finished"
            );
        }

        Some(report)
    }

    async fn post(
        &self,
        guild_id: &str,
        tenant: &TenantRecord,
        channel_id: &str,
        today: NaiveDate,
    ) -> Result<(), AppError> {
        let recap = &tenant.recap;
        let cutoff_ms = self.clock.now_ms() - recap.mode.window_hours() * 3_600_000;
        let rows = tenant.recap_rows(recap.queue, cutoff_ms);

        self.sender
            .send_alert(channel_id, &recap_alert(&rows, recap.mode, recap.queue))
            .await?;

        // The marker is only written once the recap actually went out.
        self.repo.set_recap_last_sent(guild_id, today).await?;

        info!(
            guild_id,
            mode = recap.mode.label(),
            players = rows.len(),
            "📊 ✅ Recap posted"
        );
        Ok(())
    }
}
