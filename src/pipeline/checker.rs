//! Entry point — emails in, sorted spam verdict lines out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::pipeline::runner::{Pipeline, PipelineStream};
use crate::services::{MessageStore, SpamClassifier, UserDirectory};
use crate::stages::{CheckSpam, CombineResults, ListMessages, ResolveUsers};

/// The collaborators a run talks to.
#[derive(Clone)]
pub struct Services {
    pub directory: Arc<dyn UserDirectory>,
    pub store: Arc<dyn MessageStore>,
    pub classifier: Arc<dyn SpamClassifier>,
}

impl Services {
    /// Use one backend for all three roles.
    pub fn from_single<S>(service: Arc<S>) -> Self
    where
        S: UserDirectory + MessageStore + SpamClassifier + 'static,
    {
        Self {
            directory: service.clone(),
            store: service.clone(),
            classifier: service,
        }
    }
}

/// Runs the four-stage spam check.
///
/// Output lines are `"{has_spam} {msg_id}"`, spam first, then ascending id.
/// Items whose lookup, listing or classification failed are logged and
/// left out; a run never fails as a whole.
pub struct SpamChecker {
    config: PipelineConfig,
    services: Services,
}

impl SpamChecker {
    pub fn new(config: PipelineConfig, services: Services) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, services })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a run over a finite set of emails and return its lazy output.
    pub fn run<I>(&self, identifiers: I) -> PipelineStream<String>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        self.assemble(Pipeline::from_source(identifiers, self.config.channel_capacity))
    }

    /// Start a run fed by an external producer; it ends once every sender
    /// for `identifiers` is dropped.
    pub fn run_from(&self, identifiers: mpsc::Receiver<String>) -> PipelineStream<String> {
        self.assemble(Pipeline::from_receiver(
            identifiers,
            self.config.channel_capacity,
        ))
    }

    /// Run to completion and return every result line.
    pub async fn check<I>(&self, identifiers: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let lines = self.run(identifiers).collect_all().await;
        info!(results = lines.len(), "Spam check finished");
        lines
    }

    fn assemble(&self, source: Pipeline<String>) -> PipelineStream<String> {
        info!(
            batch_size = self.config.batch_size,
            admission_limit = self.config.admission_limit,
            channel_capacity = self.config.channel_capacity,
            "Starting spam check"
        );

        source
            .then(ResolveUsers::new(Arc::clone(&self.services.directory)))
            .then(ListMessages::new(
                Arc::clone(&self.services.store),
                self.config.batch_size,
            ))
            .then(CheckSpam::new(
                Arc::clone(&self.services.classifier),
                self.config.admission_limit,
            ))
            .then(CombineResults)
            .into_stream()
    }
}
