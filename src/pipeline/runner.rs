//! Stage runner — wires typed stages through bounded hand-off channels.
//!
//! Each stage runs as its own task and owns the sender of its output
//! channel. When `Stage::run` returns, that sender is dropped, which closes
//! the channel and tells the next stage its input has ended. A stage must
//! therefore not return until all of the work it fanned out has finished.
//!
//! ```rust,ignore
//! let lines = Pipeline::from_source(emails, capacity)
//!     .then(ResolveUsers::new(directory))
//!     .then(ListMessages::new(store, 2))
//!     .then(CheckSpam::new(classifier, 5))
//!     .then(CombineResults)
//!     .collect()
//!     .await;
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

/// One step of the pipeline, consuming `Input` items and producing `Output`.
#[async_trait]
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Stage name for logging.
    fn name(&self) -> &'static str;

    /// Consume `input` until it closes, sending results to `output`.
    ///
    /// Returning drops `output`, closing the downstream channel.
    async fn run(self, input: mpsc::Receiver<Self::Input>, output: mpsc::Sender<Self::Output>);
}

/// A chain of running stages whose last channel yields `T`.
///
/// Construction spawns tasks, so it must happen inside a Tokio runtime.
pub struct Pipeline<T> {
    output: mpsc::Receiver<T>,
    tasks: JoinSet<()>,
    capacity: usize,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start a pipeline fed from a sequence of items.
    pub fn from_source<I>(items: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let items = items.into_iter();

        let mut tasks = JoinSet::new();
        tasks.spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    debug!("Source channel closed by consumer, stopping feed");
                    return;
                }
            }
        });

        Self {
            output: rx,
            tasks,
            capacity,
        }
    }

    /// Start a pipeline fed by an external producer. The input ends when
    /// every sender for `input` has been dropped.
    pub fn from_receiver(input: mpsc::Receiver<T>, capacity: usize) -> Self {
        Self {
            output: input,
            tasks: JoinSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a stage and start it.
    pub fn then<S>(self, stage: S) -> Pipeline<S::Output>
    where
        S: Stage<Input = T>,
    {
        let Self {
            output: input,
            mut tasks,
            capacity,
        } = self;
        let (tx, rx) = mpsc::channel(capacity);
        let name = stage.name();

        tasks.spawn(async move {
            debug!(stage = name, "Stage running");
            stage.run(input, tx).await;
            debug!(stage = name, "Stage closed");
        });

        Pipeline {
            output: rx,
            tasks,
            capacity,
        }
    }

    /// Drain the final channel, then wait for every stage to finish.
    pub async fn collect(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.output.recv().await {
            items.push(item);
        }
        join_all(&mut self.tasks).await;
        items
    }

    /// Lazy view of the final channel.
    ///
    /// Stages keep running while the stream is alive; dropping it aborts them.
    pub fn into_stream(self) -> PipelineStream<T> {
        PipelineStream {
            inner: ReceiverStream::new(self.output),
            tasks: self.tasks,
        }
    }
}

/// Output of a running [`Pipeline`].
pub struct PipelineStream<T> {
    inner: ReceiverStream<T>,
    tasks: JoinSet<()>,
}

impl<T> PipelineStream<T> {
    /// Drain whatever is left and wait for every stage to finish.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut receiver = self.inner.into_inner();
        let mut items = Vec::new();
        while let Some(item) = receiver.recv().await {
            items.push(item);
        }
        join_all(&mut self.tasks).await;
        items
    }
}

impl<T> Unpin for PipelineStream<T> {}

impl<T> Stream for PipelineStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Join barrier. A panicked task is logged; its channel has already closed
/// during unwinding, so the rest of the chain still drains.
async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Pipeline task failed");
        }
    }
}
