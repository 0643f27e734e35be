//! Interactive process driver
//!
//! Runs a shell command and holds a one-way, scripted conversation with it:
//! canned answers are written to its stdin while two background drain tasks
//! relay stdout and stderr into queues. The drain tasks are what keeps a
//! chatty child from blocking forever on a pipe nobody reads.
//!
//! # Lifecycle
//!
//! - [`InteractiveCommand::spawn`] launches the child with all three streams
//!   piped.
//! - [`InteractiveCommand::start`] starts the drain tasks.
//! - [`InteractiveCommand::send_line`], [`send_lines`](InteractiveCommand::send_lines)
//!   and [`run_script`](InteractiveCommand::run_script) feed input.
//! - [`InteractiveCommand::drain_all`] takes whatever output has arrived,
//!   never waiting for more.
//! - [`InteractiveCommand::shutdown`] (or dropping the driver) cancels the
//!   drain tasks, so they never outlive the driver even when the child keeps
//!   its output open. A dropped driver also kills its child.
//!
//! Writes are issued from the caller's task and take `&mut self`, so one
//! driver only ever has one writer.

mod output;
mod script;

pub use output::{spawn_drain, OutputQueue, OutputSnapshot, Stream, PARTIAL_FLUSH};
pub use script::{
    Script, ScriptOptions, ScriptReport, ScriptStep, DEFAULT_INTERVAL, DEFAULT_PROMPT_TIMEOUT,
};

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_SHELL_ARG: &str = "-c";

/// How command lines are launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Shell executable that interprets the command line
    pub shell: PathBuf,
    /// Flag telling the shell to run the next argument as a command
    pub shell_arg: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            shell_arg: DEFAULT_SHELL_ARG.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot write to `{command}`: process already exited ({status})")]
    Exited { command: String, status: ExitStatus },
    #[error("failed to write to `{command}`: {source}")]
    Write {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {timeout:?} waiting for {expected:?} from `{command}`")]
    PromptTimeout {
        command: String,
        expected: String,
        timeout: Duration,
    },
    #[error("output of `{command}` closed before {expected:?} appeared")]
    OutputClosed { command: String, expected: String },
    #[error("failed to wait on `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    /// The child could not take the input: it exited or its stdin broke
    pub fn is_write_failure(&self) -> bool {
        matches!(self, ProcessError::Exited { .. } | ProcessError::Write { .. })
    }
}

/// A launched child process plus the queues draining its output
pub struct InteractiveCommand {
    command: String,
    child: Child,
    stdin: Option<ChildStdin>,
    // streams waiting for `start` to hand them to drain tasks
    readers: Option<Readers>,
    stdout: OutputQueue,
    stderr: OutputQueue,
    cancel: CancellationToken,
    drains: Vec<JoinHandle<()>>,
    // output pulled off the queues by `wait_for` but not yet handed out
    backlog: OutputSnapshot,
    // output `wait_for` has not matched against yet
    unmatched: String,
}

struct Readers {
    stdout: ChildStdout,
    stderr: ChildStderr,
    stdout_tx: flume::Sender<String>,
    stderr_tx: flume::Sender<String>,
}

impl std::fmt::Debug for InteractiveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveCommand")
            .field("command", &self.command)
            .field("pid", &self.child.id())
            .field("started", &self.readers.is_none())
            .finish()
    }
}

impl InteractiveCommand {
    /// Launch `command` with the default shell
    pub fn new(command: impl Into<String>) -> Result<Self, ProcessError> {
        Self::spawn(command, &DriverConfig::default())
    }

    /// Launch `command` through `config.shell` with stdin, stdout and stderr
    /// all piped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(command: impl Into<String>, config: &DriverConfig) -> Result<Self, ProcessError> {
        let command = command.into();
        tracing::debug!("Launching `{}` via {}", command, config.shell.display());

        let launch_err = |source: io::Error| ProcessError::Launch {
            command: command.clone(),
            source,
        };

        let mut child = Command::new(&config.shell)
            .arg(&config.shell_arg)
            .arg(&command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_err)?;

        let missing = |name: &str| {
            launch_err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("child {} was not captured", name),
            ))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (stdout_tx, stdout_queue) = OutputQueue::channel(Stream::Stdout);
        let (stderr_tx, stderr_queue) = OutputQueue::channel(Stream::Stderr);

        tracing::info!("Launched `{}` (pid {:?})", command, child.id());

        Ok(Self {
            command,
            child,
            stdin: Some(stdin),
            readers: Some(Readers {
                stdout,
                stderr,
                stdout_tx,
                stderr_tx,
            }),
            stdout: stdout_queue,
            stderr: stderr_queue,
            cancel: CancellationToken::new(),
            drains: Vec::new(),
            backlog: OutputSnapshot::default(),
            unmatched: String::new(),
        })
    }

    /* Getters */

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the drain tasks have been started
    pub fn is_started(&self) -> bool {
        self.readers.is_none()
    }

    /// Start one drain task per output stream.
    ///
    /// Calling it again is a no-op. With `verbose`, prints whatever output is
    /// already queued; this is diagnostic only and may well be empty.
    pub fn start(&mut self, verbose: bool) {
        let Some(readers) = self.readers.take() else {
            return;
        };

        self.drains.push(spawn_drain(
            Stream::Stdout,
            readers.stdout,
            readers.stdout_tx,
            self.cancel.clone(),
        ));
        self.drains.push(spawn_drain(
            Stream::Stderr,
            readers.stderr,
            readers.stderr_tx,
            self.cancel.clone(),
        ));
        tracing::debug!("Started output drains for `{}`", self.command);

        if verbose {
            self.print_output();
        }
    }

    /// Write `text` followed by exactly one newline and flush it.
    ///
    /// Fails with [`ProcessError::Exited`] if the child is already gone.
    pub async fn send_line(&mut self, text: &str, verbose: bool) -> Result<(), ProcessError> {
        if verbose {
            println!("Your input: {}", text);
        }

        if let Some(status) = self.try_status()? {
            return Err(ProcessError::Exited {
                command: self.command.clone(),
                status,
            });
        }

        let write_err = |source: io::Error| ProcessError::Write {
            command: self.command.clone(),
            source,
        };
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            write_err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stdin has been closed",
            ))
        })?;

        let line = format!("{}\n", text.trim_matches('\n'));
        stdin.write_all(line.as_bytes()).await.map_err(write_err)?;
        stdin.flush().await.map_err(write_err)?;
        tracing::debug!("Sent {:?} to `{}`", text, self.command);

        if verbose {
            self.print_output();
        }
        Ok(())
    }

    /// Send each line in order, pausing `interval` between sends.
    ///
    /// The pause paces the exchange against a program that shows its next
    /// prompt only after consuming the previous answer. It is a guess at
    /// readiness, not a guarantee; prefer [`run_script`](Self::run_script)
    /// with expected prompts when the prompts are known.
    pub async fn send_lines<I, S>(
        &mut self,
        lines: I,
        interval: Duration,
        verbose: bool,
    ) -> Result<(), ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            self.send_line(line.as_ref(), verbose).await?;
        }
        Ok(())
    }

    /// Take everything currently queued on both streams.
    ///
    /// Never waits: returns an empty snapshot if nothing has arrived. Order
    /// is preserved within each stream.
    pub fn drain_all(&mut self) -> OutputSnapshot {
        let mut snapshot = std::mem::take(&mut self.backlog);
        snapshot.stdout.push_str(&self.stdout.drain());
        snapshot.stderr.push_str(&self.stderr.drain());
        snapshot
    }

    /// Print a [`drain_all`](Self::drain_all) snapshot to stdout
    pub fn print_output(&mut self) {
        let snapshot = self.drain_all();
        println!("{}", snapshot.stdout);
        println!("{}", snapshot.stderr);
    }

    /// Wait for both drain tasks to reach end of stream, then take all output.
    ///
    /// Gives up after `timeout` and returns whatever has arrived; unfinished
    /// drains keep running until [`shutdown`](Self::shutdown).
    pub async fn collect_output(&mut self, timeout: Duration) -> OutputSnapshot {
        let deadline = Instant::now() + timeout;
        while let Some(handle) = self.drains.first_mut() {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => {
                    if let Err(e) = joined {
                        tracing::warn!("Drain task for `{}` failed: {}", self.command, e);
                    }
                    self.drains.remove(0);
                }
                Err(_) => {
                    tracing::debug!("Output of `{}` still open after {:?}", self.command, timeout);
                    break;
                }
            }
        }
        self.drain_all()
    }

    /// Wait until `expected` shows up in the child's output.
    ///
    /// Output consumed while waiting is kept and returned by the next
    /// [`drain_all`](Self::drain_all). Text up to and including a match is
    /// not matched again by later calls.
    pub async fn wait_for(&mut self, expected: &str, timeout: Duration) -> Result<(), ProcessError> {
        let deadline = Instant::now() + timeout;
        loop {
            // output drained by the caller is not seen here, only queued output
            if let Some(pos) = self.unmatched.find(expected) {
                self.unmatched.drain(..pos + expected.len());
                return Ok(());
            }

            let next = tokio::time::timeout_at(deadline, self.next_output())
                .await
                .map_err(|_| ProcessError::PromptTimeout {
                    command: self.command.clone(),
                    expected: expected.to_string(),
                    timeout,
                })?;

            match next {
                Some((stream, text)) => {
                    self.unmatched.push_str(&text);
                    self.backlog.push(stream, &text);
                }
                None => {
                    return Err(ProcessError::OutputClosed {
                        command: self.command.clone(),
                        expected: expected.to_string(),
                    })
                }
            }
        }
    }

    /// Run a script of answers, honoring expected prompts where given
    pub async fn run_script(
        &mut self,
        script: &Script,
        options: &ScriptOptions,
    ) -> Result<ScriptReport, ProcessError> {
        let mut report = ScriptReport::default();
        for (i, step) in script.steps().iter().enumerate() {
            match &step.expect {
                Some(expected) => {
                    self.wait_for(expected, options.prompt_timeout).await?;
                    report.prompts_matched += 1;
                }
                None if i > 0 && !options.interval.is_zero() => {
                    tokio::time::sleep(options.interval).await;
                }
                None => {}
            }
            self.send_line(&step.answer, options.verbose).await?;
            report.answers_sent += 1;
        }
        Ok(report)
    }

    /// Close the child's stdin, signalling end of input
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Exit status if the child has already exited
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        self.child.try_wait().map_err(|source| ProcessError::Wait {
            command: self.command.clone(),
            source,
        })
    }

    /// Close stdin and wait for the child to exit.
    ///
    /// The drain tasks keep running and finish once the child's pipes close.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.close_stdin();
        let status = self.child.wait().await.map_err(|source| ProcessError::Wait {
            command: self.command.clone(),
            source,
        })?;
        tracing::info!("`{}` exited with {}", self.command, status);
        Ok(status)
    }

    /// Tear the driver down deterministically.
    ///
    /// Cancels and joins the drain tasks, then kills the child if it is still
    /// running. Output queued before the call can still be drained.
    pub async fn shutdown(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        self.close_stdin();
        self.cancel.cancel();
        for handle in self.drains.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("Drain task for `{}` failed: {}", self.command, e);
            }
        }

        if let Some(status) = self.try_status()? {
            return Ok(Some(status));
        }
        tracing::debug!("Killing `{}`", self.command);
        self.child.kill().await.map_err(|source| ProcessError::Wait {
            command: self.command.clone(),
            source,
        })?;
        Ok(None)
    }

    async fn next_output(&self) -> Option<(Stream, String)> {
        tokio::select! {
            Some(text) = self.stdout.next() => Some((Stream::Stdout, text)),
            Some(text) = self.stderr.next() => Some((Stream::Stderr, text)),
            else => None,
        }
    }
}

impl Drop for InteractiveCommand {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
