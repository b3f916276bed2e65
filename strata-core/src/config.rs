use std::time::Duration;

/// Tuning knobs shared by all backends.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Records per native multi-row insert statement.
    pub insert_page_size: usize,
    /// Keys per `IN (..)` list in batched updates and deletes.
    pub in_list_page_size: usize,
    /// Commits taking longer than this since the transaction opened (or
    /// last committed) are logged at elevated severity.
    pub slow_transaction_threshold: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            insert_page_size: 1000,
            in_list_page_size: 1000,
            slow_transaction_threshold: Duration::from_secs(5),
        }
    }
}
