//! Interval scheduling for acquisition cycles.
//!
//! The core exposes a single entry point (`run_cycle`); this loop just
//! invokes it on a fixed interval until shutdown. Overlap is not a
//! correctness concern — the store's atomic insert keeps concurrent
//! cycles safe — but this loop runs them strictly one at a time anyway.

use crate::cancel::CancelFlag;
use crate::cycle::{CycleOutcome, CycleRunner};
use std::time::Duration;
use tracing::{info, warn};

/// Run cycles every `interval` until `cancel` fires.
///
/// The first cycle starts immediately. Returns the number of cycles run.
pub async fn run_interval(runner: &CycleRunner, interval: Duration, cancel: &CancelFlag) -> u64 {
    info!(interval_secs = interval.as_secs(), "watch loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cycles = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(cycles, "watch loop stopping");
                return cycles;
            }
            _ = ticker.tick() => {
                cycles += 1;
                match runner.run_cycle(cancel).await {
                    CycleOutcome::Completed(summary) => {
                        info!(cycle = cycles, "{summary}");
                    }
                    CycleOutcome::Failed(err) => {
                        // A failed cycle does not stop the loop; the next
                        // tick tries again from a clean state.
                        warn!(cycle = cycles, error = %err, "cycle failed");
                    }
                }
            }
        }
    }
}
