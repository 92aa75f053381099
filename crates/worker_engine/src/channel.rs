//! Message transport between the coordinator and the worker.
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("coordinator closed the channel")]
    Closed,
    #[error("channel io error: {0}")]
    Io(#[from] io::Error),
}

/// One bidirectional message channel. Messages are whole JSON documents.
pub trait Channel {
    /// Waits up to `timeout` for a message; a zero timeout only polls.
    fn receive(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError>;
    fn send(&mut self, message: &str) -> Result<(), ChannelError>;
}

/// Worker side of an in-process channel.
pub struct MemoryChannel {
    incoming: mpsc::Receiver<String>,
    outgoing: mpsc::Sender<String>,
}

/// Coordinator side of an in-process channel.
pub struct CoordinatorEnd {
    outgoing: mpsc::Sender<String>,
    incoming: mpsc::Receiver<String>,
}

/// Creates a connected in-process pair.
pub fn memory_channel() -> (MemoryChannel, CoordinatorEnd) {
    let (to_worker, from_coordinator) = mpsc::channel();
    let (to_coordinator, from_worker) = mpsc::channel();
    (
        MemoryChannel {
            incoming: from_coordinator,
            outgoing: to_coordinator,
        },
        CoordinatorEnd {
            outgoing: to_worker,
            incoming: from_worker,
        },
    )
}

impl Channel for MemoryChannel {
    fn receive(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        let received = if timeout.is_zero() {
            self.incoming.try_recv().map_err(|err| match err {
                TryRecvError::Empty => None,
                TryRecvError::Disconnected => Some(ChannelError::Closed),
            })
        } else {
            self.incoming.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => None,
                RecvTimeoutError::Disconnected => Some(ChannelError::Closed),
            })
        };
        match received {
            Ok(message) => Ok(Some(message)),
            Err(None) => Ok(None),
            Err(Some(err)) => Err(err),
        }
    }

    fn send(&mut self, message: &str) -> Result<(), ChannelError> {
        self.outgoing
            .send(message.to_string())
            .map_err(|_| ChannelError::Closed)
    }
}

impl CoordinatorEnd {
    pub fn send(&self, message: impl Into<String>) {
        let _ = self.outgoing.send(message.into());
    }

    pub fn send_json(&self, message: &Value) {
        self.send(message.to_string());
    }

    /// A second handle for injecting messages from elsewhere, e.g. a mock runtime.
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outgoing.clone()
    }

    pub fn try_recv(&self) -> Option<String> {
        self.incoming.try_recv().ok()
    }

    /// Everything the worker sent so far, parsed; empty buffer-clearing
    /// messages are skipped.
    pub fn drain_json(&self) -> Vec<Value> {
        std::iter::from_fn(|| self.try_recv())
            .filter(|message| !message.is_empty())
            .filter_map(|message| serde_json::from_str(&message).ok())
            .collect()
    }
}

/// Newline-delimited messages over a reader/writer pair.
///
/// A background thread forwards lines from the reader so `receive` can honour
/// its timeout.
pub struct LineChannel<W: Write> {
    lines: mpsc::Receiver<io::Result<String>>,
    writer: W,
}

pub type StdioChannel = LineChannel<io::Stdout>;

impl<W: Write> LineChannel<W> {
    pub fn spawn<R>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines, writer }
    }
}

impl LineChannel<io::Stdout> {
    pub fn stdio() -> Self {
        Self::spawn(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<W: Write> Channel for LineChannel<W> {
    fn receive(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        let line = if timeout.is_zero() {
            match self.lines.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(ChannelError::Closed),
            }
        } else {
            match self.lines.recv_timeout(timeout) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(ChannelError::Closed),
            }
        };
        Ok(Some(line?))
    }

    fn send(&mut self, message: &str) -> Result<(), ChannelError> {
        // One message per line; embedded newlines would split it.
        let line = message.replace('\n', " ");
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}
