//! Contracts for the external collaborators the pipeline calls into.
//!
//! The pipeline does not care how these are backed (database, HTTP, model
//! server). Every call may fail; stages log the failure and drop the item.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::pipeline::types::{MsgId, User};

/// Resolves an email address to the account that owns it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_user(&self, identifier: &str) -> Result<User, ServiceError>;
}

/// Lists message ids for a batch of users in one round trip.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// On error the whole batch is lost; there is no partial result.
    async fn list_messages(&self, users: &[User]) -> Result<Vec<MsgId>, ServiceError>;
}

/// Classifies one message as spam or not.
#[async_trait]
pub trait SpamClassifier: Send + Sync {
    async fn classify(&self, msg_id: MsgId) -> Result<bool, ServiceError>;
}
