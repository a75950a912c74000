//! Fixed-interval cycle driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::error;

/// Granularity of the shutdown-aware sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Runs one cycle per interval until the shared running flag clears.
///
/// A failed cycle is logged here, at the loop boundary, and the loop
/// continues: a pass failing entirely never stops future passes.
pub struct Scheduler {
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self { interval, running }
    }

    /// Drives `cycle` until shutdown. The cycle always runs to completion
    /// before the sleep begins; there is no mid-cycle cancellation.
    pub fn run<C, E>(&self, mut cycle: C)
    where
        C: FnMut() -> Result<(), E>,
        E: std::fmt::Display,
    {
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = cycle() {
                error!("cycle failed: {e}");
            }

            // Sleep in slices so a shutdown signal is honored promptly.
            let mut remaining = self.interval;
            while remaining > Duration::ZERO && self.running.load(Ordering::SeqCst) {
                let sleep_time = remaining.min(SLEEP_SLICE);
                std::thread::sleep(sleep_time);
                remaining = remaining.saturating_sub(sleep_time);
            }
        }
    }
}
