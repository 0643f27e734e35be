//! Output queues and the drain tasks that feed them
//!
//! Each child stream gets one unbounded queue and one drain task. The task is
//! the only producer and keeps reading so the child never blocks on a full
//! pipe; the driver is the only consumer.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long an unterminated fragment waits for its newline before it is
/// queued on its own. Prompts usually end without one.
pub const PARTIAL_FLUSH: Duration = Duration::from_millis(50);

const READ_BUF_SIZE: usize = 4096;

/// Which child stream an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Consumer side of one stream's queue
#[derive(Debug, Clone)]
pub struct OutputQueue {
    stream: Stream,
    rx: flume::Receiver<String>,
}

impl OutputQueue {
    /// Create a queue and the sender its drain task will own
    pub fn channel(stream: Stream) -> (flume::Sender<String>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { stream, rx })
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Remove and concatenate everything queued right now, without waiting
    pub fn drain(&self) -> String {
        self.rx.try_iter().collect()
    }

    /// Wait for the next item; `None` once the producer is gone and the
    /// queue is empty
    pub async fn next(&self) -> Option<String> {
        self.rx.recv_async().await.ok()
    }

    /// The producer has finished and nothing is left to read
    pub fn is_finished(&self) -> bool {
        self.rx.is_disconnected() && self.rx.is_empty()
    }
}

/// Spawn a task relaying `reader` into `tx` line by line.
///
/// The task ends at end of stream, on a read error, when the queue's consumer
/// is dropped, or when `cancel` fires. An unterminated fragment still pending
/// at that point is queued before the task ends.
pub fn spawn_drain<R>(
    stream: Stream,
    reader: R,
    tx: flume::Sender<String>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        drain(stream, reader, tx, cancel).await;
        tracing::debug!("{} drain finished", stream);
    })
}

async fn drain<R>(stream: Stream, mut reader: R, tx: flume::Sender<String>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUF_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = if pending.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                read = reader.read(&mut buf) => read,
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => {
                    emit(&tx, stream, pending);
                    return;
                }
                read = tokio::time::timeout(PARTIAL_FLUSH, reader.read(&mut buf)) => match read {
                    Ok(read) => read,
                    Err(_) => {
                        let complete = complete_utf8_len(&pending);
                        if complete > 0 && !emit(&tx, stream, pending.drain(..complete).collect()) {
                            return;
                        }
                        continue;
                    }
                },
            }
        };

        match read {
            Ok(0) => {
                if !pending.is_empty() {
                    emit(&tx, stream, pending);
                }
                return;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    if !emit(&tx, stream, line) {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read child {}: {}", stream, e);
                if !pending.is_empty() {
                    emit(&tx, stream, pending);
                }
                return;
            }
        }
    }
}

/// Length of `bytes` without a trailing, possibly unfinished, UTF-8 sequence.
///
/// Invalid bytes elsewhere are left for lossy decoding.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => bytes.len(),
    }
}

/// Queue one item; `false` once nobody is listening
fn emit(tx: &flume::Sender<String>, stream: Stream, bytes: Vec<u8>) -> bool {
    let text = String::from_utf8_lossy(&bytes).into_owned();
    tracing::trace!("{}: {:?}", stream, text);
    tx.send(text).is_ok()
}

/// Everything taken from both queues by one drain call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    pub stdout: String,
    pub stderr: String,
}

impl OutputSnapshot {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    pub fn push(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => self.stdout.push_str(text),
            Stream::Stderr => self.stderr.push_str(text),
        }
    }

    /// Append another snapshot, keeping per-stream order
    pub fn extend(&mut self, other: OutputSnapshot) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
    }

    /// Stdout followed by stderr
    pub fn into_text(self) -> String {
        let mut text = self.stdout;
        text.push_str(&self.stderr);
        text
    }
}

impl fmt::Display for OutputSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stdout, self.stderr)
    }
}
