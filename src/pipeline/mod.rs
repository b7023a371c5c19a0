//! Spam check pipeline.
//!
//! Emails flow left to right through four stages joined by bounded
//! channels:
//! 1. `ResolveUsers` — email → `User`, each user id once
//! 2. `ListMessages` — batches of users → `MsgId`
//! 3. `CheckSpam` — `MsgId` → `MsgData`, admission-capped
//! 4. `CombineResults` — everything sorted → text lines
//!
//! Only the last stage orders its output. Failures are local to the item
//! that caused them: logged, then dropped.

pub mod checker;
pub mod runner;
pub mod types;

pub use checker::{Services, SpamChecker};
pub use runner::{Pipeline, PipelineStream, Stage};
pub use types::{MsgData, MsgId, User};
