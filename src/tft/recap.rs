use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::queue::QueueType;

/// Number of events kept per account.
pub const RECAP_LOG_CAPACITY: usize = 250;

/// One ranked game as seen by the recap aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecapEvent {
    pub match_id: String,
    /// Game time, epoch milliseconds.
    pub at: i64,
    pub queue_type: QueueType,
    #[serde(default)]
    pub delta: i32,
    #[serde(default)]
    pub placement: Option<u8>,
}

/// Adds `event` unless its match is already logged, keeping the newest
/// [`RECAP_LOG_CAPACITY`] events ordered newest first.
pub fn append(mut log: Vec<RecapEvent>, event: RecapEvent) -> Vec<RecapEvent> {
    if log.iter().any(|e| e.match_id == event.match_id) {
        return log;
    }

    log.push(event);
    log.sort_by(|a, b| b.at.cmp(&a.at));
    log.truncate(RECAP_LOG_CAPACITY);
    log
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecapMode {
    #[default]
    Daily,
    Weekly,
}

impl RecapMode {
    pub fn window_hours(&self) -> i64 {
        match self {
            Self::Daily => 24,
            Self::Weekly => 24 * 7,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }
}

/// Aggregated movement of one account over a recap window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapRow {
    pub name: String,
    pub games: u32,
    pub delta: i32,
}

impl RecapRow {
    pub fn summarize(name: String, events: &[RecapEvent], queue: QueueType, cutoff_ms: i64) -> Self {
        let (games, delta) = events
            .iter()
            .filter(|e| e.at >= cutoff_ms && e.queue_type == queue)
            .fold((0u32, 0i32), |(games, delta), e| (games + 1, delta + e.delta));

        Self { name, games, delta }
    }
}

fn by_name(a: &RecapRow, b: &RecapRow) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Players who played and did not lose LP, best first.
pub fn gains(rows: &[RecapRow]) -> Vec<&RecapRow> {
    let mut gains: Vec<_> = rows.iter().filter(|r| r.games > 0 && r.delta >= 0).collect();
    gains.sort_by(|a, b| {
        b.delta
            .cmp(&a.delta)
            .then(b.games.cmp(&a.games))
            .then_with(|| by_name(a, b))
    });
    gains
}

/// Players who lost LP, worst first.
pub fn losses(rows: &[RecapRow]) -> Vec<&RecapRow> {
    let mut losses: Vec<_> = rows.iter().filter(|r| r.delta < 0).collect();
    losses.sort_by(|a, b| {
        a.delta
            .cmp(&b.delta)
            .then(b.games.cmp(&a.games))
            .then_with(|| by_name(a, b))
    });
    losses
}
