//! Spam classification behind an admission pool.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::pipeline::runner::Stage;
use crate::pipeline::types::{MsgData, MsgId};
use crate::services::SpamClassifier;
use crate::stages::{StageTally, drain_tasks};

const STAGE: &str = "check_spam";

/// Classifies every message id, with at most `admission_limit` classifier
/// calls in flight. The stage waits for a permit before it spawns a task,
/// so a saturated classifier stalls this stage's input and, through the
/// bounded channels, everything upstream of it.
pub struct CheckSpam {
    classifier: Arc<dyn SpamClassifier>,
    admission_limit: usize,
}

impl CheckSpam {
    /// `admission_limit` is clamped to at least one.
    pub fn new(classifier: Arc<dyn SpamClassifier>, admission_limit: usize) -> Self {
        Self {
            classifier,
            admission_limit: admission_limit.max(1),
        }
    }
}

#[async_trait]
impl Stage for CheckSpam {
    type Input = MsgId;
    type Output = MsgData;

    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(self, mut input: mpsc::Receiver<MsgId>, output: mpsc::Sender<MsgData>) {
        let admission = Arc::new(Semaphore::new(self.admission_limit));
        let tally = Arc::new(StageTally::default());
        let mut tasks = JoinSet::new();

        while let Some(msg_id) = input.recv().await {
            tally.received();

            let permit = match Arc::clone(&admission).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(stage = STAGE, error = %e, "Admission pool closed");
                    break;
                }
            };

            let classifier = Arc::clone(&self.classifier);
            let tally = Arc::clone(&tally);
            let output = output.clone();

            tasks.spawn(async move {
                // Released when the task ends, whichever way it ends.
                let _permit = permit;

                let has_spam = match classifier.classify(msg_id).await {
                    Ok(has_spam) => has_spam,
                    Err(e) => {
                        warn!(stage = STAGE, %msg_id, error = %e, "Classification failed, dropping message");
                        tally.dropped();
                        return;
                    }
                };

                if output.send(MsgData { id: msg_id, has_spam }).await.is_err() {
                    debug!(stage = STAGE, "Downstream closed");
                    return;
                }
                tally.emitted();
            });
        }

        drain_tasks(STAGE, &mut tasks).await;
        tally.log_drained(STAGE);
    }
}
