//! Identity resolution with exactly-once emission per user id.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::pipeline::runner::Stage;
use crate::pipeline::types::User;
use crate::services::UserDirectory;
use crate::stages::{StageTally, drain_tasks};

const STAGE: &str = "resolve_users";

/// Resolves each incoming email concurrently and forwards every distinct
/// user once, however many aliases or duplicates point at it.
pub struct ResolveUsers {
    directory: Arc<dyn UserDirectory>,
}

impl ResolveUsers {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Stage for ResolveUsers {
    type Input = String;
    type Output = User;

    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(self, mut input: mpsc::Receiver<String>, output: mpsc::Sender<User>) {
        // Scoped to this run; dropped with the stage.
        let seen: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));
        let tally = Arc::new(StageTally::default());
        let mut tasks = JoinSet::new();

        while let Some(email) = input.recv().await {
            tally.received();
            let directory = Arc::clone(&self.directory);
            let seen = Arc::clone(&seen);
            let tally = Arc::clone(&tally);
            let output = output.clone();

            tasks.spawn(async move {
                let user = match directory.resolve_user(&email).await {
                    Ok(user) => user,
                    Err(e) => {
                        warn!(stage = STAGE, identifier = %email, error = %e, "Lookup failed, dropping identifier");
                        tally.dropped();
                        return;
                    }
                };

                // Check, insert and send under one lock so a user can only
                // ever be forwarded by the first task that resolves it.
                let mut seen = seen.lock().await;
                if !seen.insert(user.id) {
                    debug!(stage = STAGE, user_id = user.id, identifier = %email, "Duplicate user skipped");
                    return;
                }
                if output.send(user).await.is_err() {
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
