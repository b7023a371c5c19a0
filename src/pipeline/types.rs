//! Values handed between pipeline stages.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ── User ────────────────────────────────────────────────────────────

/// A resolved account.
///
/// `id` identifies the person; several email aliases can resolve to the
/// same id, and the pipeline emits each id once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    /// Primary address on the account.
    pub email: String,
}

impl User {
    pub fn new(id: u64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

// ── Message id ──────────────────────────────────────────────────────

/// Opaque handle for one message owned by one user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MsgId(pub u64);

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MsgId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(MsgId)
            .map_err(|_| ParseError::InvalidMsgId(s.to_string()))
    }
}

impl From<u64> for MsgId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ── Classification result ───────────────────────────────────────────

/// Spam verdict for a single message.
///
/// Ordering puts spam first, then ascending message id. Serialized as
/// `"{has_spam} {id}"`, e.g. `true 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsgData {
    pub id: MsgId,
    pub has_spam: bool,
}

impl MsgData {
    pub fn new(id: u64, has_spam: bool) -> Self {
        Self {
            id: MsgId(id),
            has_spam,
        }
    }
}

impl Ord for MsgData {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .has_spam
            .cmp(&self.has_spam)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for MsgData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MsgData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.has_spam, self.id)
    }
}

impl FromStr for MsgData {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ParseError::MalformedLine {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let (verdict, id) = line
            .split_once(' ')
            .ok_or_else(|| malformed("expected \"<has_spam> <id>\""))?;
        let has_spam = verdict
            .parse::<bool>()
            .map_err(|_| malformed("verdict must be true or false"))?;
        let id = id.parse::<MsgId>()?;

        Ok(Self { id, has_spam })
    }
}
