//! External collaborators — user directory, message store, spam classifier.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryMailService;
pub use traits::{MessageStore, SpamClassifier, UserDirectory};
