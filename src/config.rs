//! Configuration types.

use crate::error::ConfigError;

/// Maximum number of users passed to one `list_messages` call.
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Maximum number of spam classifications in flight at once.
pub const DEFAULT_ADMISSION_LIMIT: usize = 5;

/// Buffer size of each hand-off channel between stages.
///
/// One slot is the closest a tokio channel gets to an unbuffered hand-off.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Users per batched message-listing call.
    pub batch_size: usize,
    /// Admission pool size for the spam classifier.
    pub admission_limit: usize,
    /// Capacity of every hand-off channel.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            admission_limit: DEFAULT_ADMISSION_LIMIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Reject values that would stall the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("batch_size", self.batch_size),
            ("admission_limit", self.admission_limit),
            ("channel_capacity", self.channel_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}
