use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// TFT queues we know about. Anything else maps to [`QueueType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueType {
    NormalTft,
    RankedTft,
    RankedTftDoubleUp,
    #[serde(other)]
    Unknown,
}

/// Queues carrying an LP ladder.
pub const RANKED_QUEUES: [QueueType; 2] = [QueueType::RankedTft, QueueType::RankedTftDoubleUp];

impl QueueType {
    pub fn from_queue_id(queue_id: i64) -> Self {
        match queue_id {
            1090 => Self::NormalTft,
            1100 => Self::RankedTft,
            1160 => Self::RankedTftDoubleUp,
            _ => Self::Unknown,
        }
    }

    pub fn is_ranked(&self) -> bool {
        RANKED_QUEUES.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NormalTft => "NORMAL_TFT",
            Self::RankedTft => "RANKED_TFT",
            Self::RankedTftDoubleUp => "RANKED_TFT_DOUBLE_UP",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NormalTft => "Normal",
            Self::RankedTft => "Ranked",
            Self::RankedTftDoubleUp => "Double Up",
            Self::Unknown => "Unknown",
        }
    }

    /// Placement on a 1-8 board. Double Up teams share a placement so the
    /// raw value is folded onto 1-4.
    pub fn normalize_placement(&self, placement: i64) -> Option<u8> {
        if !(1..=8).contains(&placement) {
            return None;
        }
        let placement = placement as u8;

        match self {
            Self::RankedTftDoubleUp => Some(placement.div_ceil(2)),
            _ => Some(placement),
        }
    }
}

impl FromStr for QueueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NORMAL_TFT" => Ok(Self::NormalTft),
            "RANKED_TFT" => Ok(Self::RankedTft),
            "RANKED_TFT_DOUBLE_UP" => Ok(Self::RankedTftDoubleUp),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
