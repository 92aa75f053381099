#![deny(missing_docs)]
//! Shared logging utilities for the worker workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the process logger with a destination that can be switched at runtime,
//! and a minimal test initializer for the global logger.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use log::LevelFilter;
use simplelog::{CombinedLogger, Config, ConfigBuilder, WriteLogger};

thread_local! {
    /// Thread-local storage for the slot number of this worker.
    static WORKER_SLOT: Cell<u32> = const { Cell::new(0) };
}

/// Sets the worker slot number for the current thread.
/// This should be called once at start-up, before the first message is handled.
pub fn set_worker_slot(slot: u32) {
    WORKER_SLOT.with(|v| v.set(slot));
}

/// Retrieves the worker slot number for the current thread.
/// Returns 0 if the slot has not been set.
pub fn get_worker_slot() -> u32 {
    WORKER_SLOT.with(|v| v.get())
}

/// Logs a trace-level message prefixed with the worker slot.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("[engine #{}] {}", $crate::get_worker_slot(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message prefixed with the worker slot.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("[engine #{}] {}", $crate::get_worker_slot(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message prefixed with the worker slot.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("[engine #{}] {}", $crate::get_worker_slot(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message prefixed with the worker slot.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("[engine #{}] {}", $crate::get_worker_slot(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message prefixed with the worker slot.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("[engine #{}] {}", $crate::get_worker_slot(), format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Discard everything.
    Null,
    /// Write to stderr. Stdout is left alone because it may carry the channel.
    Terminal,
    /// Write to the given file, truncating it.
    File(PathBuf),
}

enum SinkTarget {
    Discard,
    Stderr,
    File(File),
}

/// Writer behind the process logger; its target can be swapped while the
/// logger stays installed.
#[derive(Clone)]
struct SwitchableSink {
    target: Arc<Mutex<SinkTarget>>,
}

impl SwitchableSink {
    fn new() -> Self {
        Self {
            target: Arc::new(Mutex::new(SinkTarget::Discard)),
        }
    }

    fn switch_to(&self, destination: &LogDestination) -> io::Result<()> {
        let next = match destination {
            LogDestination::Null => SinkTarget::Discard,
            LogDestination::Terminal => SinkTarget::Stderr,
            LogDestination::File(path) => SinkTarget::File(File::create(path)?),
        };
        let mut guard = self
            .target
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        *guard = next;
        Ok(())
    }
}

impl Write for SwitchableSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .target
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        match &mut *guard {
            SinkTarget::Discard => Ok(buf.len()),
            SinkTarget::Stderr => io::stderr().write(buf),
            SinkTarget::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .target
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        match &mut *guard {
            SinkTarget::Discard => Ok(()),
            SinkTarget::Stderr => io::stderr().flush(),
            SinkTarget::File(file) => file.flush(),
        }
    }
}

static SINK: OnceLock<SwitchableSink> = OnceLock::new();

fn sink() -> &'static SwitchableSink {
    SINK.get_or_init(SwitchableSink::new)
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

/// Installs the process logger writing to `destination` at `level`.
///
/// Calling this again after the logger is installed only reconfigures it.
pub fn initialize(destination: LogDestination, level: LevelFilter) -> io::Result<()> {
    let sink = sink();
    // The logger itself accepts everything; filtering goes through the
    // global max level so `reconfigure` can change it later.
    let _ = CombinedLogger::init(vec![WriteLogger::new(
        LevelFilter::Trace,
        build_config(),
        sink.clone(),
    )]);
    reconfigure(destination, Some(level))
}

/// Redirects the process logger and optionally changes its level.
///
/// `LogDestination::Null` also lowers the max level to `Off`.
pub fn reconfigure(destination: LogDestination, level: Option<LevelFilter>) -> io::Result<()> {
    sink().switch_to(&destination)?;
    if destination == LogDestination::Null {
        log::set_max_level(LevelFilter::Off);
    } else if let Some(level) = level {
        log::set_max_level(level);
    } else if log::max_level() == LevelFilter::Off {
        log::set_max_level(LevelFilter::Info);
    }
    Ok(())
}

/// Parses a level name such as `info` or `TRACE`.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse().ok()
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sink_follows_destination_switches() {
        let temp = tempfile::TempDir::new().unwrap();
        let first = temp.path().join("first.log");
        let second = temp.path().join("second.log");
        let mut sink = SwitchableSink::new();

        sink.write_all(b"dropped\n").unwrap();
        sink.switch_to(&LogDestination::File(first.clone())).unwrap();
        sink.write_all(b"one\n").unwrap();
        sink.switch_to(&LogDestination::File(second.clone())).unwrap();
        sink.write_all(b"two\n").unwrap();
        sink.switch_to(&LogDestination::Null).unwrap();
        sink.write_all(b"dropped again\n").unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two\n");
    }

    #[test]
    fn unopenable_file_keeps_previous_target() {
        let temp = tempfile::TempDir::new().unwrap();
        let good = temp.path().join("good.log");
        let mut sink = SwitchableSink::new();
        sink.switch_to(&LogDestination::File(good.clone())).unwrap();

        let bad = temp.path().join("missing").join("bad.log");
        assert!(sink.switch_to(&LogDestination::File(bad)).is_err());
        sink.write_all(b"still here\n").unwrap();

        assert_eq!(fs::read_to_string(&good).unwrap(), "still here\n");
    }

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn worker_slot_is_thread_local() {
        set_worker_slot(3);
        assert_eq!(get_worker_slot(), 3);
        let other = std::thread::spawn(get_worker_slot).join().unwrap();
        assert_eq!(other, 0);
    }
}
