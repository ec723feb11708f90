//! Periodic loops: the match poller and the recap autoposter.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod discovery;
pub mod match_poller;
pub mod recap_autopost;

pub use discovery::find_unseen_matches;
pub use match_poller::{MatchPoller, PollerSettings, TickReport};
pub use recap_autopost::{AutopostReport, AutopostSettings, RecapAutoposter, should_fire};

/// Marks a tick as running for as long as it is alive.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    /// `None` when another tick holds the flag.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
