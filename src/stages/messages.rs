//! Batched message listing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::pipeline::runner::Stage;
use crate::pipeline::types::{MsgId, User};
use crate::services::MessageStore;
use crate::stages::{StageTally, drain_tasks};

const STAGE: &str = "list_messages";

/// Groups users into batches of `batch_size` and lists each batch's
/// messages with a single store call. A trailing partial batch is still
/// sent. A failed call loses the whole batch.
pub struct ListMessages {
    store: Arc<dyn MessageStore>,
    batch_size: usize,
}

impl ListMessages {
    /// `batch_size` is clamped to at least one.
    pub fn new(store: Arc<dyn MessageStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }
}

/// Read up to `size` users, stopping early if the channel closes.
/// Returns the batch and whether the input is still open.
async fn next_batch(input: &mut mpsc::Receiver<User>, size: usize) -> (Vec<User>, bool) {
    let mut batch = Vec::with_capacity(size);
    while batch.len() < size {
        match input.recv().await {
            Some(user) => batch.push(user),
            None => return (batch, false),
        }
    }
    (batch, true)
}

#[async_trait]
impl Stage for ListMessages {
    type Input = User;
    type Output = MsgId;

    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(self, mut input: mpsc::Receiver<User>, output: mpsc::Sender<MsgId>) {
        let tally = Arc::new(StageTally::default());
        let mut tasks = JoinSet::new();

        loop {
            let (batch, open) = next_batch(&mut input, self.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for _ in &batch {
                tally.received();
            }

            let store = Arc::clone(&self.store);
            let tally = Arc::clone(&tally);
            let output = output.clone();

            tasks.spawn(async move {
                let msg_ids = match store.list_messages(&batch).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        let user_ids: Vec<u64> = batch.iter().map(|u| u.id).collect();
                        warn!(stage = STAGE, ?user_ids, error = %e, "Listing failed, dropping batch");
                        for _ in &batch {
                            tally.dropped();
                        }
                        return;
                    }
                };

                debug!(stage = STAGE, users = batch.len(), messages = msg_ids.len(), "Batch listed");
                for msg_id in msg_ids {
                    if output.send(msg_id).await.is_err() {
                        debug!(stage = STAGE, "Downstream closed");
                        return;
                    }
                    tally.emitted();
                }
            });

            if !open {
                break;
            }
        }

        drain_tasks(STAGE, &mut tasks).await;
        tally.log_drained(STAGE);
    }
}
