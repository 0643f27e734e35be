//! Run a scripted conversation with a command until it exits

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use owo_colors::OwoColorize;

use common::process::{InteractiveCommand, OutputSnapshot, ProcessError, Script, ScriptOptions};
use mirrorshell::state::DriverSettings;

/// Upper bound on waiting for output pipes once the child is gone
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct Transcript {
    pub command: String,
    pub answers_sent: usize,
    pub prompts_matched: usize,
    /// `None` when the child had to be killed
    pub status: Option<ExitStatus>,
    pub output: OutputSnapshot,
}

impl Transcript {
    pub fn succeeded(&self) -> bool {
        self.status.map(|s| s.success()).unwrap_or(false)
    }

    pub fn status_text(&self) -> String {
        match self.status {
            Some(status) => status.to_string(),
            None => "killed".to_string(),
        }
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {} {}", "Command:".dimmed(), self.command)?;
        writeln!(f, "  {} {}", "Answers sent:".dimmed(), self.answers_sent)?;
        if self.prompts_matched > 0 {
            writeln!(f, "  {} {}", "Prompts matched:".dimmed(), self.prompts_matched)?;
        }
        let status = if self.succeeded() {
            self.status_text().green().to_string()
        } else {
            self.status_text().red().to_string()
        };
        write!(f, "  {} {}", "Exit:".dimmed(), status)
    }
}

/// Launch `command`, play `script` into it, then wait for it to exit.
///
/// The child gets `driver.prompt_timeout()` to exit after the last answer
/// before it is killed. A failing script tears the child down before the
/// error is returned.
pub async fn converse(
    command: &str,
    driver: &DriverSettings,
    script: &Script,
    verbose: bool,
) -> Result<Transcript, ProcessError> {
    let mut cmd = InteractiveCommand::spawn(command, &driver.driver_config())?;
    cmd.start(verbose);

    let options = ScriptOptions {
        interval: driver.interval(),
        prompt_timeout: driver.prompt_timeout(),
        verbose,
    };
    let report = match cmd.run_script(script, &options).await {
        Ok(report) => report,
        Err(e) => {
            if let Err(shutdown_err) = cmd.shutdown().await {
                tracing::warn!("Failed to stop `{}`: {}", command, shutdown_err);
            }
            return Err(e);
        }
    };

    let status = match tokio::time::timeout(driver.prompt_timeout(), cmd.wait()).await {
        Ok(status) => Some(status?),
        Err(_) => {
            tracing::warn!(
                "`{}` still running {:?} after the last answer, stopping it",
                command,
                driver.prompt_timeout()
            );
            cmd.shutdown().await?
        }
    };

    let output = cmd.collect_output(OUTPUT_GRACE).await;
    cmd.shutdown().await?;

    Ok(Transcript {
        command: command.to_string(),
        answers_sent: report.answers_sent,
        prompts_matched: report.prompts_matched,
        status,
        output,
    })
}
