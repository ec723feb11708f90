//! Rank snapshots and the normalized LP scale deltas are computed on.
//!
//! Tiers occupy 400 point bands from Iron upwards, divisions add 0/100/200/300
//! and apex tiers share one band on top of Diamond I. A promotion from
//! Gold I 90 LP to Platinum IV 10 LP is therefore +20, not a wrap around.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::queue::QueueType;
use crate::riot::LeagueEntryDto;

const APEX_BASE: i32 = 2800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Emerald,
    Diamond,
    Master,
    Grandmaster,
    Challenger,
}

impl Tier {
    pub const ALL: [Tier; 10] = [
        Tier::Iron,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Emerald,
        Tier::Diamond,
        Tier::Master,
        Tier::Grandmaster,
        Tier::Challenger,
    ];

    pub fn is_apex(&self) -> bool {
        matches!(self, Self::Master | Self::Grandmaster | Self::Challenger)
    }

    fn base(&self) -> i32 {
        match self {
            Self::Iron => 0,
            Self::Bronze => 400,
            Self::Silver => 800,
            Self::Gold => 1200,
            Self::Platinum => 1600,
            Self::Emerald => 2000,
            Self::Diamond => 2400,
            Self::Master | Self::Grandmaster | Self::Challenger => APEX_BASE,
        }
    }
}

impl FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IRON" => Ok(Self::Iron),
            "BRONZE" => Ok(Self::Bronze),
            "SILVER" => Ok(Self::Silver),
            "GOLD" => Ok(Self::Gold),
            "PLATINUM" => Ok(Self::Platinum),
            "EMERALD" => Ok(Self::Emerald),
            "DIAMOND" => Ok(Self::Diamond),
            "MASTER" => Ok(Self::Master),
            "GRANDMASTER" => Ok(Self::Grandmaster),
            "CHALLENGER" => Ok(Self::Challenger),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Division {
    IV,
    III,
    II,
    I,
}

impl Division {
    pub const ALL: [Division; 4] = [Division::IV, Division::III, Division::II, Division::I];

    fn offset(&self) -> i32 {
        match self {
            Self::IV => 0,
            Self::III => 100,
            Self::II => 200,
            Self::I => 300,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IV => "IV",
            Self::III => "III",
            Self::II => "II",
            Self::I => "I",
        }
    }
}

impl FromStr for Division {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IV" => Ok(Self::IV),
            "III" => Ok(Self::III),
            "II" => Ok(Self::II),
            "I" => Ok(Self::I),
            _ => Err(()),
        }
    }
}

/// Stored rank of one queue at capture time. Raw strings are kept as Riot
/// sent them so that unknown tiers survive a rewrite of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSnapshot {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub lp: Option<i32>,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    /// Capture time, epoch milliseconds.
    #[serde(default)]
    pub last_updated_at: Option<i64>,
}

impl RankSnapshot {
    pub fn from_entry(entry: &LeagueEntryDto, now_ms: i64) -> Self {
        let is_apex = entry
            .tier
            .as_deref()
            .and_then(|t| t.parse::<Tier>().ok())
            .is_some_and(|t| t.is_apex());

        Self {
            tier: entry.tier.clone(),
            rank: if is_apex { None } else { entry.rank.clone() },
            lp: Some(entry.league_points),
            wins: entry.wins,
            losses: entry.losses,
            last_updated_at: Some(now_ms),
        }
    }

    /// Normalized LP, `None` when the tier, division or LP is unusable.
    pub fn standardize(&self) -> Option<i32> {
        let tier: Tier = self.tier.as_deref()?.parse().ok()?;
        let lp = self.lp?;

        if tier.is_apex() {
            return Some(APEX_BASE + lp);
        }

        let division: Division = self.rank.as_deref()?.parse().ok()?;
        Some(tier.base() + division.offset() + lp)
    }

    pub fn is_stale(&self, now_ms: i64, max_age_ms: i64) -> bool {
        match self.last_updated_at {
            Some(at) if at > 0 => now_ms - at >= max_age_ms,
            _ => true,
        }
    }
}

impl fmt::Display for RankSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(tier) = self.tier.as_deref() else {
            return f.write_str("Unranked");
        };
        let lp = self.lp.unwrap_or(0);

        match self.rank.as_deref() {
            Some(rank) if !rank.is_empty() => write!(f, "{tier} {rank} - {lp} LP"),
            _ => write!(f, "{tier} - {lp} LP"),
        }
    }
}

pub type RankSnapshots = BTreeMap<QueueType, RankSnapshot>;

/// Keeps the ranked queues out of a league-v1 answer and stamps them.
pub fn to_snapshots(entries: &[LeagueEntryDto], now_ms: i64) -> RankSnapshots {
    entries
        .iter()
        .filter_map(|entry| {
            let queue: QueueType = entry.queue_type.parse().ok()?;
            queue
                .is_ranked()
                .then(|| (queue, RankSnapshot::from_entry(entry, now_ms)))
        })
        .collect()
}

/// LP movement per queue. A queue only appears when both sides normalize.
pub fn compute_deltas(before: &RankSnapshots, after: &RankSnapshots) -> BTreeMap<QueueType, i32> {
    after
        .iter()
        .filter_map(|(queue, after)| {
            let prev = before.get(queue)?.standardize()?;
            let next = after.standardize()?;
            Some((*queue, next - prev))
        })
        .collect()
}

/// A refresh is due when nothing is stored or any stored snapshot is too old.
pub fn should_refresh(snapshots: &RankSnapshots, now_ms: i64, max_age_ms: i64) -> bool {
    snapshots.is_empty()
        || snapshots
            .values()
            .any(|snapshot| snapshot.is_stale(now_ms, max_age_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(tier: &str, rank: Option<&str>, lp: i32) -> RankSnapshot {
        RankSnapshot {
            tier: Some(tier.to_string()),
            rank: rank.map(str::to_string),
            lp: Some(lp),
            wins: 0,
            losses: 0,
            last_updated_at: Some(1),
        }
    }

    fn entry(queue: &str, tier: &str, rank: &str, lp: i32) -> LeagueEntryDto {
        LeagueEntryDto {
            queue_type: queue.to_string(),
            tier: Some(tier.to_string()),
            rank: Some(rank.to_string()),
            league_points: lp,
            wins: 10,
            losses: 12,
        }
    }

    #[test]
    fn standardize_matches_known_values() {
        assert_eq!(snap("IRON", Some("IV"), 0).standardize(), Some(0));
        assert_eq!(snap("GOLD", Some("II"), 45).standardize(), Some(1445));
        assert_eq!(snap("diamond", Some("I"), 99).standardize(), Some(2799));
        assert_eq!(snap("MASTER", None, 120).standardize(), Some(2920));
        assert_eq!(snap("CHALLENGER", Some("I"), 900).standardize(), Some(3700));
    }

    #[test]
    fn standardize_rejects_unknown_data() {
        assert_eq!(snap("WOOD", Some("IV"), 10).standardize(), None);
        assert_eq!(snap("GOLD", None, 10).standardize(), None);
        assert_eq!(snap("GOLD", Some("V"), 10).standardize(), None);

        let mut no_lp = snap("GOLD", Some("I"), 0);
        no_lp.lp = None;
        assert_eq!(no_lp.standardize(), None);
    }

    #[test]
    fn normalization_is_monotonic() {
        let mut ladder = Vec::new();
        for tier in Tier::ALL.iter().filter(|t| !t.is_apex()) {
            for division in Division::ALL {
                for lp in 0..=99 {
                    ladder.push(RankSnapshot {
                        tier: Some(format!("{tier:?}")),
                        rank: Some(division.as_str().to_string()),
                        lp: Some(lp),
                        wins: 0,
                        losses: 0,
                        last_updated_at: None,
                    });
                }
            }
        }
        for lp in 0..=99 {
            ladder.push(snap("MASTER", None, lp));
        }

        let values: Vec<i32> = ladder.iter().map(|s| s.standardize().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn promotion_is_a_small_positive_delta() {
        let before = RankSnapshots::from([(QueueType::RankedTft, snap("GOLD", Some("I"), 90))]);
        let after =
            RankSnapshots::from([(QueueType::RankedTft, snap("PLATINUM", Some("IV"), 10))]);

        let deltas = compute_deltas(&before, &after);
        assert_eq!(deltas.get(&QueueType::RankedTft), Some(&20));
    }

    #[test]
    fn deltas_omit_queues_without_both_sides() {
        let before = RankSnapshots::from([
            (QueueType::RankedTft, snap("GOLD", Some("I"), 50)),
            (QueueType::RankedTftDoubleUp, snap("???", Some("I"), 50)),
        ]);
        let after = RankSnapshots::from([
            (QueueType::RankedTft, snap("GOLD", Some("I"), 30)),
            (QueueType::RankedTftDoubleUp, snap("SILVER", Some("I"), 10)),
        ]);

        let deltas = compute_deltas(&before, &after);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[&QueueType::RankedTft], -20);

        assert!(compute_deltas(&RankSnapshots::new(), &after).is_empty());
    }

    #[test]
    fn to_snapshots_keeps_ranked_queues_only() {
        let entries = vec![
            entry("RANKED_TFT", "MASTER", "I", 77),
            entry("RANKED_TFT_DOUBLE_UP", "GOLD", "III", 12),
            entry("RANKED_TFT_TURBO", "GOLD", "III", 12),
        ];

        let snapshots = to_snapshots(&entries, 1_000);
        assert_eq!(snapshots.len(), 2);

        let solo = &snapshots[&QueueType::RankedTft];
        assert_eq!(solo.rank, None);
        assert_eq!(solo.lp, Some(77));
        assert_eq!(solo.last_updated_at, Some(1_000));
        assert_eq!(
            snapshots[&QueueType::RankedTftDoubleUp].rank.as_deref(),
            Some("III")
        );
    }

    #[test]
    fn refresh_is_due_when_missing_or_old() {
        let mut snapshots = RankSnapshots::new();
        assert!(should_refresh(&snapshots, 10_000, 5_000));

        snapshots.insert(QueueType::RankedTft, snap("GOLD", Some("I"), 0));
        snapshots.get_mut(&QueueType::RankedTft).unwrap().last_updated_at = Some(8_000);
        assert!(!should_refresh(&snapshots, 10_000, 5_000));
        assert!(should_refresh(&snapshots, 13_000, 5_000));

        snapshots.get_mut(&QueueType::RankedTft).unwrap().last_updated_at = None;
        assert!(should_refresh(&snapshots, 10_000, 5_000));
    }

    #[test]
    fn display_formats_rank_lines() {
        assert_eq!(snap("GOLD", Some("II"), 45).to_string(), "GOLD II - 45 LP");
        assert_eq!(snap("MASTER", None, 5).to_string(), "MASTER - 5 LP");

        let unranked = RankSnapshot {
            tier: None,
            rank: None,
            lp: None,
            wins: 0,
            losses: 0,
            last_updated_at: None,
        };
        assert_eq!(unranked.to_string(), "Unranked");
    }
}
