use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::process::{ProcessError, Script, ScriptStep};
use mirrorshell::state::{AppState, DriverSettings, StateError};

use super::conversation::{converse, Transcript};

#[derive(Args, Debug, Clone)]
pub struct RunScript {
    /// Command line to drive
    #[arg(long)]
    pub command: String,

    /// Answers to send, in order
    #[arg(long = "answer", required = true)]
    pub answers: Vec<String>,

    /// Prompt to wait for before the answer at the same position
    #[arg(long = "expect")]
    pub expects: Vec<String>,

    /// Seconds between blind answers (overrides the config)
    #[arg(long)]
    pub interval: Option<f64>,
}

impl RunScript {
    fn script(&self) -> Result<Script, ScriptError> {
        if self.expects.len() > self.answers.len() {
            return Err(ScriptError::TooManyPrompts {
                prompts: self.expects.len(),
                answers: self.answers.len(),
            });
        }
        let steps = self
            .answers
            .iter()
            .enumerate()
            .map(|(i, answer)| match self.expects.get(i) {
                Some(prompt) if !prompt.is_empty() => ScriptStep::after(prompt, answer),
                _ => ScriptStep::blind(answer),
            })
            .collect();
        Ok(Script::new(steps))
    }
}

#[derive(Debug)]
pub struct ScriptOutput {
    pub transcript: Transcript,
}

impl fmt::Display for ScriptOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = &self.transcript.output;
        if !output.stdout.is_empty() {
            writeln!(f, "{}", "stdout:".bold())?;
            writeln!(f, "{}", output.stdout.trim_end())?;
        }
        if !output.stderr.is_empty() {
            writeln!(f, "{}", "stderr:".bold())?;
            writeln!(f, "{}", output.stderr.trim_end())?;
        }
        write!(f, "{}", self.transcript)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to load config: {0}")]
    State(#[from] StateError),
    #[error("{prompts} prompts given for {answers} answers")]
    TooManyPrompts { prompts: usize, answers: usize },
    #[error("conversation failed: {0}")]
    Process(#[from] ProcessError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for RunScript {
    type Error = ScriptError;
    type Output = ScriptOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let script = self.script()?;

        // driving a command does not need an initialized app dir
        let mut driver = match AppState::load(ctx.config_path.clone()) {
            Ok(state) => state.config.driver,
            Err(StateError::NotInitialized(_)) => DriverSettings::default(),
            Err(e) => return Err(e.into()),
        };
        if let Some(interval) = self.interval {
            driver.interval_secs = interval;
        }

        let transcript = converse(&self.command, &driver, &script, ctx.verbose).await?;
        Ok(ScriptOutput { transcript })
    }
}
