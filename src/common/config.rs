use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub block_size: usize,
    pub buffer_pool_size: usize,
    pub log_file: String,
    /// How long a lock request waits before aborting.
    pub lock_timeout: Duration,
    /// How long a pin request waits for a free frame before aborting.
    pub buffer_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            block_size: 400,
            buffer_pool_size: 8,
            log_file: "stonedb.log".to_string(),
            lock_timeout: Duration::from_secs(10),
            buffer_timeout: Duration::from_secs(10),
        }
    }
}
