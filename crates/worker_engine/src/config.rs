use std::path::PathBuf;
use std::time::Duration;

/// Start-up configuration of one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Slot number the coordinator assigned to this worker.
    pub slave_no: u32,
    pub parent_pid: u32,
    /// How long the top-level loop blocks waiting for a message.
    pub poll_timeout: Duration,
    pub session_root: PathBuf,
    pub encode_column_names: bool,
}

impl WorkerConfig {
    pub fn new(slave_no: u32, parent_pid: u32) -> Self {
        Self {
            slave_no,
            parent_pid,
            session_root: default_session_root(parent_pid),
            ..Self::default()
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            slave_no: 0,
            parent_pid: 0,
            poll_timeout: Duration::from_millis(100),
            session_root: default_session_root(0),
            encode_column_names: cfg!(feature = "column-encoding"),
        }
    }
}

/// Session directory shared by all workers of one coordinator.
pub fn default_session_root(parent_pid: u32) -> PathBuf {
    std::env::temp_dir().join(format!("analysis-worker-{parent_pid}"))
}
