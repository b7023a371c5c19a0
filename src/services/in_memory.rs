//! In-process mail service backed by hash maps.
//!
//! Implements all three collaborator traits and enforces their contracts the
//! way the real services do: listing rejects oversized batches and
//! classification rejects calls beyond its concurrency ceiling. Every call is
//! counted so callers can check how the pipeline drove the service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{DEFAULT_ADMISSION_LIMIT, DEFAULT_BATCH_SIZE};
use crate::error::ServiceError;
use crate::pipeline::types::{MsgId, User};
use crate::services::traits::{MessageStore, SpamClassifier, UserDirectory};

#[derive(Default)]
struct CallStats {
    lookups: AtomicUsize,
    classifications: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

/// Decrements the in-flight counter when a classification call exits.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Deterministic implementation of [`UserDirectory`], [`MessageStore`] and
/// [`SpamClassifier`].
pub struct InMemoryMailService {
    /// address → user id
    addresses: HashMap<String, u64>,
    /// user id → primary address (first one registered)
    accounts: HashMap<u64, String>,
    mailboxes: HashMap<u64, Vec<MsgId>>,
    verdicts: HashMap<MsgId, bool>,
    failing_lookups: HashSet<String>,
    failing_users: HashSet<u64>,
    failing_messages: HashSet<MsgId>,
    max_batch_size: usize,
    max_in_flight: usize,
    latency: Duration,
    stats: CallStats,
}

impl Default for InMemoryMailService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMailService {
    /// Empty service with the default batch and concurrency ceilings.
    pub fn new() -> Self {
        Self {
            addresses: HashMap::new(),
            accounts: HashMap::new(),
            mailboxes: HashMap::new(),
            verdicts: HashMap::new(),
            failing_lookups: HashSet::new(),
            failing_users: HashSet::new(),
            failing_messages: HashSet::new(),
            max_batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: DEFAULT_ADMISSION_LIMIT,
            latency: Duration::ZERO,
            stats: CallStats::default(),
        }
    }

    /// Register `email` for user `id`. Registering a second address for the
    /// same id makes it an alias.
    pub fn with_user(mut self, email: impl Into<String>, id: u64) -> Self {
        let email = email.into();
        self.accounts.entry(id).or_insert_with(|| email.clone());
        self.addresses.insert(email, id);
        self
    }

    /// Append messages to a user's mailbox.
    pub fn with_messages(mut self, user_id: u64, ids: impl IntoIterator<Item = u64>) -> Self {
        self.mailboxes
            .entry(user_id)
            .or_default()
            .extend(ids.into_iter().map(MsgId));
        self
    }

    pub fn with_verdict(mut self, msg_id: u64, has_spam: bool) -> Self {
        self.verdicts.insert(MsgId(msg_id), has_spam);
        self
    }

    /// Make lookups of `email` fail.
    pub fn fail_lookup(mut self, email: impl Into<String>) -> Self {
        self.failing_lookups.insert(email.into());
        self
    }

    /// Make any listing batch containing `user_id` fail.
    pub fn fail_listing_for(mut self, user_id: u64) -> Self {
        self.failing_users.insert(user_id);
        self
    }

    /// Make classification of `msg_id` fail.
    pub fn fail_classification(mut self, msg_id: u64) -> Self {
        self.failing_messages.insert(MsgId(msg_id));
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Simulated round-trip time applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // ── Call statistics ─────────────────────────────────────────────

    pub fn lookups(&self) -> usize {
        self.stats.lookups.load(Ordering::SeqCst)
    }

    pub fn classifications(&self) -> usize {
        self.stats.classifications.load(Ordering::SeqCst)
    }

    /// Highest number of classification calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Size of every `list_messages` batch, in call order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.stats.batch_sizes.lock().await.clone()
    }

    pub async fn list_calls(&self) -> usize {
        self.stats.batch_sizes.lock().await.len()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryMailService {
    async fn resolve_user(&self, identifier: &str) -> Result<User, ServiceError> {
        self.stats.lookups.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let lookup_failed = |reason: &str| ServiceError::LookupFailed {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        if self.failing_lookups.contains(identifier) {
            return Err(lookup_failed("directory unavailable"));
        }

        let id = *self
            .addresses
            .get(identifier)
            .ok_or_else(|| lookup_failed("no such user"))?;
        let primary = self
            .accounts
            .get(&id)
            .cloned()
            .unwrap_or_else(|| identifier.to_string());

        Ok(User::new(id, primary))
    }
}

#[async_trait]
impl MessageStore for InMemoryMailService {
    async fn list_messages(&self, users: &[User]) -> Result<Vec<MsgId>, ServiceError> {
        self.stats.batch_sizes.lock().await.push(users.len());
        self.simulate_latency().await;

        if users.len() > self.max_batch_size {
            return Err(ServiceError::BatchListFailed {
                batch_len: users.len(),
                reason: format!("too many users, at most {} allowed", self.max_batch_size),
            });
        }

        if let Some(user) = users.iter().find(|u| self.failing_users.contains(&u.id)) {
            return Err(ServiceError::BatchListFailed {
                batch_len: users.len(),
                reason: format!("mailbox of user {} unavailable", user.id),
            });
        }

        Ok(users
            .iter()
            .filter_map(|u| self.mailboxes.get(&u.id))
            .flatten()
            .copied()
            .collect())
    }
}

#[async_trait]
impl SpamClassifier for InMemoryMailService {
    async fn classify(&self, msg_id: MsgId) -> Result<bool, ServiceError> {
        self.stats.classifications.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.stats.in_flight);
        self.stats
            .peak_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let classify_failed = |reason: String| ServiceError::ClassifyFailed { msg_id, reason };

        if in_flight > self.max_in_flight {
            return Err(classify_failed(format!(
                "too many concurrent requests ({in_flight} > {})",
                self.max_in_flight
            )));
        }

        self.simulate_latency().await;

        if self.failing_messages.contains(&msg_id) {
            return Err(classify_failed("classifier unavailable".to_string()));
        }

        self.verdicts
            .get(&msg_id)
            .copied()
            .ok_or_else(|| classify_failed("unknown message".to_string()))
    }
}
