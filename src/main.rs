use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use tentrackule_tft::alert::alert_sender::DiscordAlertSender;
use tentrackule_tft::clock::{Clock, SystemClock};
use tentrackule_tft::config::Config;
use tentrackule_tft::db::{Registry, Repository, Store};
use tentrackule_tft::error::AppError;
use tentrackule_tft::logging;
use tentrackule_tft::poller::{AutopostSettings, MatchPoller, PollerSettings, RecapAutoposter};
use tentrackule_tft::rate_limiter::RateLimiter;
use tentrackule_tft::riot::{Ddragon, RequestMetrics, RiotClient};

const METRICS_LOG_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init(config.log_json, config.log_dir.as_deref(), config.log_max_files)?;

    info!("🐙 Starting...");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let limiter = Arc::new(RateLimiter::riot(
        config.riot_rate_limit_per_second,
        config.riot_rate_limit_per_two_minutes,
    ));
    let metrics = RequestMetrics::new("riot");
    tokio::spawn(metrics.clone().log_loop(METRICS_LOG_EVERY));

    let riot = Arc::new(RiotClient::new(config.riot_api_key.clone(), limiter, metrics));
    let ddragon = Arc::new(Ddragon::new(config.ddragon_cache_ttl(), clock.clone()));

    let repo = Repository::new(Store::open(config.data_path.clone()));
    match repo.load().await {
        Ok(registry) => log_startup_diagnostics(&registry),
        Err(e) => error!(error = ?e, "🗄️ ❌ Registration store is unreadable, polling will fail"),
    }

    let sender = Arc::new(DiscordAlertSender::new(&config.discord_token));

    let poller = Arc::new(
        MatchPoller::new(
            riot,
            repo.clone(),
            sender.clone(),
            clock.clone(),
            PollerSettings::from_config(&config),
        )
        .with_ddragon(ddragon),
    );
    let autoposter = Arc::new(RecapAutoposter::new(
        repo,
        sender,
        clock,
        AutopostSettings::from_config(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = poller.start(shutdown_rx.clone());
    let autopost_task = autoposter.start(shutdown_rx);

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🐙 Shutting down, waiting for running cycles"),
        Err(e) => warn!(error = ?e, "🐙 ⚠️ Could not listen for shutdown signal"),
    }

    let _ = shutdown_tx.send(true);
    for task in [poller_task, autopost_task] {
        if let Err(e) = task.await {
            error!(error = ?e, "🐙 ❌ Background task ended abnormally");
        }
    }

    Ok(())
}

fn log_startup_diagnostics(registry: &Registry) {
    info!(
        tenants = registry.tenant_ids().len(),
        accounts = registry.total_accounts(),
        "🗄️ Registration store loaded"
    );

    for (guild_id, tenant) in registry.tenants() {
        let with_snapshot = tenant
            .accounts
            .iter()
            .filter(|a| !a.last_rank_by_queue.is_empty())
            .count();

        info!(
            guild_id,
            accounts = tenant.accounts.len(),
            with_snapshot,
            channel = tenant.channel_id.as_deref().unwrap_or("none"),
            recap_enabled = tenant.recap.enabled,
            recap_mode = tenant.recap.mode.label(),
            recap_queue = tenant.recap.queue.as_str(),
            "🗄️ Tenant loaded"
        );
    }
}
