//! Final ordering and serialization.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::pipeline::runner::Stage;
use crate::pipeline::types::MsgData;

const STAGE: &str = "combine_results";

/// Collects every result, sorts them (spam first, then ascending id) and
/// emits one `"{has_spam} {id}"` line per result.
///
/// Nothing is emitted until the input closes.
pub struct CombineResults;

#[async_trait]
impl Stage for CombineResults {
    type Input = MsgData;
    type Output = String;

    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(self, mut input: mpsc::Receiver<MsgData>, output: mpsc::Sender<String>) {
        let mut results = Vec::new();
        while let Some(result) = input.recv().await {
            results.push(result);
        }

        results.sort_unstable();
        info!(stage = STAGE, results = results.len(), "Stage drained");

        for result in results {
            if output.send(result.to_string()).await.is_err() {
                debug!(stage = STAGE, "Downstream closed");
                return;
            }
        }
    }
}
