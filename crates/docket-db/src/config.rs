use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Results returned in a cursor's first batch when the request names no batch size.
    pub default_cursor_batch_size: usize,
    /// Upper bound on operations accepted in one bulk write.
    pub max_write_batch_size: usize,
    /// Cursors idle longer than this are discarded by the sweeper.
    pub cursor_timeout_secs: u64,
    /// Interval in seconds between idle-cursor sweeps. Zero disables the sweeper.
    pub cursor_sweep_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_cursor_batch_size: 101,
            max_write_batch_size: 100_000,
            cursor_timeout_secs: 600,
            cursor_sweep_interval_secs: 60,
        }
    }
}
