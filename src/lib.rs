//! Spam Sieve — concurrent email-to-verdict pipeline.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{MsgData, MsgId, Services, SpamChecker, User};
