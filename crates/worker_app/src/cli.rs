use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use engine_logging::LogDestination;
use log::LevelFilter;
use worker_engine::WorkerConfig;

/// Where log lines go until the coordinator sends a `logCfg` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    /// Discard log output
    Null,
    /// Write to stderr
    Terminal,
    /// Write to a file
    File,
}

#[derive(Parser, Debug)]
#[command(name = "analysis-worker")]
#[command(about = "Analysis worker driven by a coordinator over stdin/stdout", long_about = None)]
#[command(version)]
pub struct Args {
    /// Slot number the coordinator assigned to this worker
    pub slave_no: u32,

    /// Process id of the coordinator
    pub parent_pid: u32,

    /// Session directory holding temp files and the dataset description
    #[arg(long, env = "ANALYSIS_WORKER_SESSION_ROOT")]
    pub session_root: Option<PathBuf>,

    /// Initial log destination
    #[arg(long, value_enum, default_value = "null")]
    pub log_to: LogTarget,

    /// Log file used with `--log-to file` (defaults to ./worker-<SLAVE_NO>.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Initial log level
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// Milliseconds the loop waits for a message before checking its state again
    #[arg(long, default_value = "100")]
    pub poll_ms: u64,

    /// Pass user column names to the runtime unchanged
    #[arg(long)]
    pub no_column_encoding: bool,
}

impl Args {
    pub fn log_destination(&self) -> LogDestination {
        match self.log_to {
            LogTarget::Null => LogDestination::Null,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(
                self.log_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("./worker-{}.log", self.slave_no))),
            ),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::new(self.slave_no, self.parent_pid);
        if let Some(root) = &self.session_root {
            config.session_root = root.clone();
        }
        config.poll_timeout = Duration::from_millis(self.poll_ms);
        if self.no_column_encoding {
            config.encode_column_names = false;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("analysis-worker").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn positional_ids_build_the_default_config() {
        let args = parse(&["2", "4711"]);
        let config = args.worker_config();
        assert_eq!(config.slave_no, 2);
        assert_eq!(config.parent_pid, 4711);
        assert_eq!(config.session_root, worker_engine::default_session_root(4711));
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert_eq!(args.log_destination(), LogDestination::Null);
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn options_override_the_config() {
        let args = parse(&[
            "1",
            "99",
            "--session-root",
            "/tmp/session",
            "--poll-ms",
            "10",
            "--no-column-encoding",
            "--log-level",
            "debug",
        ]);
        let config = args.worker_config();
        assert_eq!(config.session_root, PathBuf::from("/tmp/session"));
        assert_eq!(config.poll_timeout, Duration::from_millis(10));
        assert!(!config.encode_column_names);
        assert_eq!(args.log_level, LevelFilter::Debug);
    }

    #[test]
    fn file_logging_falls_back_to_a_per_slot_file() {
        let args = parse(&["3", "1", "--log-to", "file"]);
        assert_eq!(
            args.log_destination(),
            LogDestination::File(PathBuf::from("./worker-3.log"))
        );

        let args = parse(&["3", "1", "--log-to", "file", "--log-file", "/var/log/w.log"]);
        assert_eq!(
            args.log_destination(),
            LogDestination::File(PathBuf::from("/var/log/w.log"))
        );
    }

    #[test]
    fn missing_parent_pid_is_rejected() {
        assert!(Args::try_parse_from(["analysis-worker", "1"]).is_err());
    }
}
