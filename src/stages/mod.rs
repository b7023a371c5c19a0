//! Pipeline stages, in flow order:
//!
//! 1. `ResolveUsers` — email → unique `User` (dedup on user id)
//! 2. `ListMessages` — batches of `User` → `MsgId`
//! 3. `CheckSpam` — `MsgId` → `MsgData`, under an admission cap
//! 4. `CombineResults` — sorted `MsgData` → result lines

pub mod combine;
pub mod messages;
pub mod resolve;
pub mod spam;

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;
use tracing::{error, info};

pub use combine::CombineResults;
pub use messages::ListMessages;
pub use resolve::ResolveUsers;
pub use spam::CheckSpam;

/// Per-stage counters, shared with the stage's worker tasks.
#[derive(Debug, Default)]
pub(crate) struct StageTally {
    received: AtomicUsize,
    emitted: AtomicUsize,
    dropped: AtomicUsize,
}

impl StageTally {
    pub(crate) fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn log_drained(&self, stage: &'static str) {
        info!(
            stage,
            received = self.received.load(Ordering::Relaxed),
            emitted = self.emitted.load(Ordering::Relaxed),
            dropped = self.dropped.load(Ordering::Relaxed),
            "Stage drained"
        );
    }
}

/// Wait for every task a stage fanned out. Panics are logged, not re-raised.
pub(crate) async fn drain_tasks(stage: &'static str, tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(stage, error = %e, "Stage worker task failed");
        }
    }
}
