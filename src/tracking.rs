//! Registering and removing tracked accounts.

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::db::{Repository, TrackedAccount};
use crate::error::AppError;
use crate::riot::{Platform, RiotErrorKind, TftApi};
use crate::tft::to_snapshots;

/// Resolves a Riot ID and starts tracking it in `guild_id`.
///
/// The account is seeded with its current ranks and its most recent match so
/// that the first poll neither announces old games nor reports an LP change
/// against nothing. Both seeds are best effort. Returns the stored account
/// and whether it was already tracked.
#[instrument(
    skip(api, repo, clock),
    fields(riot_id = %format!("{game_name}#{tag_line}"))
)]
pub async fn track_account<A: TftApi + ?Sized>(
    api: &A,
    repo: &Repository,
    clock: &dyn Clock,
    guild_id: &str,
    game_name: &str,
    tag_line: &str,
    region: &str,
) -> Result<(TrackedAccount, bool), AppError> {
    let platform: Platform = region.parse()?;
    let riot_region = platform.to_region();

    let dto = api
        .get_account_by_riot_id(riot_region, game_name, tag_line)
        .await
        .map_err(|e| match e.kind() {
            RiotErrorKind::NotFound => AppError::PlayerNotFound {
                game_name: game_name.to_string(),
                tag_line: tag_line.to_string(),
            },
            _ => e.into(),
        })?;

    let actual_game_name = dto.game_name.as_deref().unwrap_or(game_name);
    let actual_tag_line = dto.tag_line.as_deref().unwrap_or(tag_line);
    let mut account = TrackedAccount::new(actual_game_name, actual_tag_line, &dto.puuid, platform);

    match api.get_rank_entries(platform, &dto.puuid).await {
        Ok(entries) => account.last_rank_by_queue = to_snapshots(&entries, clock.now_ms()),
        Err(e) => warn!(error = ?e, "📊 ⚠️ Could not seed rank snapshot"),
    }

    match api.get_match_ids(riot_region, &dto.puuid, 1, 0).await {
        Ok(ids) => account.last_match_id = ids.into_iter().next(),
        Err(e) => warn!(error = ?e, "🔄 ⚠️ Could not seed last match id"),
    }

    let existed = repo.upsert_account(guild_id, account.clone()).await?;

    info!(
        guild_id,
        key = account.key.as_deref().unwrap_or_default(),
        existed,
        "✅ Account tracked"
    );

    Ok((account, existed))
}

/// Stops tracking the account with `key` in `guild_id`.
#[instrument(skip(repo))]
pub async fn untrack_account(
    repo: &Repository,
    guild_id: &str,
    key: &str,
) -> Result<TrackedAccount, AppError> {
    let removed = repo
        .remove_account(guild_id, key)
        .await?
        .ok_or(AppError::PlayerNotTracked)?;

    info!(guild_id, key, "🗑️ Account untracked");
    Ok(removed)
}
