//! Scripted answers for interactive programs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pause between blind answers
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
/// Default wait for an expected prompt
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// One answer, optionally gated on a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Line written to the child's stdin
    pub answer: String,
    /// Text that must appear in the child's output before the answer is
    /// sent. Without it the answer is sent blind after the script interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

impl ScriptStep {
    /// An answer sent without waiting for any prompt
    pub fn blind(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            expect: None,
        }
    }

    /// An answer sent once `prompt` has been seen
    pub fn after(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            expect: Some(prompt.into()),
        }
    }
}

/// Ordered answers, mapped positionally to the program's prompts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    /// A script of blind answers
    pub fn blind<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: answers.into_iter().map(ScriptStep::blind).collect(),
        }
    }

    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn answers(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.answer.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether every answer is sent without prompt feedback
    pub fn is_blind(&self) -> bool {
        self.steps.iter().all(|step| step.expect.is_none())
    }
}

/// Pacing for [`InteractiveCommand::run_script`](super::InteractiveCommand::run_script)
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    /// Pause before each blind answer after the first
    pub interval: Duration,
    /// How long to wait for an expected prompt
    pub prompt_timeout: Duration,
    /// Echo answers and print output snapshots as the script runs
    pub verbose: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
            verbose: false,
        }
    }
}

/// What a script run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub answers_sent: usize,
    pub prompts_matched: usize,
}
