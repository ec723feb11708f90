use crate::riot::client::MAX_MATCH_IDS_PER_PAGE;
use crate::riot::{Region, RiotApiResponse, TftApi};

/// Match ids newer than `cursor`, newest first.
///
/// Without a cursor only the most recent id is returned so that a fresh
/// account starts from its latest game instead of replaying its history.
/// With one, pages are walked backwards until the cursor shows up, the
/// backfill limit is reached or Riot runs out of ids.
pub async fn find_unseen_matches<A: TftApi + ?Sized>(
    api: &A,
    region: Region,
    puuid: &str,
    cursor: Option<&str>,
    backfill_limit: usize,
) -> RiotApiResponse<Vec<String>> {
    let Some(cursor) = cursor.filter(|c| !c.is_empty()) else {
        let mut ids = api.get_match_ids(region, puuid, 1, 0).await?;
        ids.truncate(1);
        return Ok(ids);
    };

    let mut unseen = Vec::new();
    let mut start = 0u32;

    while unseen.len() < backfill_limit {
        let remaining = (backfill_limit - unseen.len()) as u32;
        let count = remaining.min(MAX_MATCH_IDS_PER_PAGE);
        let page = api.get_match_ids(region, puuid, count, start).await?;
        if page.is_empty() {
            break;
        }

        let fetched = page.len();
        for id in page {
            if id == cursor {
                return Ok(unseen);
            }
            unseen.push(id);
            if unseen.len() >= backfill_limit {
                return Ok(unseen);
            }
        }

        if fetched < count as usize {
            break;
        }
        start += fetched as u32;
    }

    Ok(unseen)
}
