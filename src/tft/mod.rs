//! TFT domain rules: queues, rank normalization and the recap log.

pub mod queue;
pub mod rank;
pub mod recap;

pub use queue::{QueueType, RANKED_QUEUES};
pub use rank::{RankSnapshot, RankSnapshots, compute_deltas, should_refresh, to_snapshots};
pub use recap::{RecapEvent, RecapMode, RecapRow};
