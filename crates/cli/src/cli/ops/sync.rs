use std::fmt;
use std::path::PathBuf;

use clap::Args;
use comfy_table::Table;
use owo_colors::OwoColorize;

use common::mirror::{MirrorSync, SyncError, SyncOutcome};
use mirrorshell::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct SyncPaths {
    /// Local paths to sync, relative to the current directory or absolute
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SyncRow {
    pub path: PathBuf,
    pub result: Result<SyncOutcome, String>,
}

#[derive(Debug)]
pub struct SyncOutput {
    pub rows: Vec<SyncRow>,
}

impl SyncOutput {
    fn failed(&self) -> usize {
        self.rows.iter().filter(|row| row.result.is_err()).count()
    }
}

impl fmt::Display for SyncOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.set_header(vec!["PATH", "RESULT", "MIRROR"]);
        for row in &self.rows {
            match &row.result {
                Ok(outcome) => table.add_row(vec![
                    row.path.display().to_string(),
                    outcome.to_string(),
                    outcome.mirror().display().to_string(),
                ]),
                Err(reason) => table.add_row(vec![
                    row.path.display().to_string(),
                    "failed".to_string(),
                    reason.clone(),
                ]),
            };
        }
        writeln!(f, "{table}")?;

        let failed = self.failed();
        let synced = self.rows.len() - failed;
        if failed == 0 {
            write!(f, "{} {} path(s)", "Synced".green().bold(), synced)
        } else {
            write!(
                f,
                "{} {} path(s), {} {}",
                "Synced".green().bold(),
                synced,
                failed.to_string().red().bold(),
                "failed".red()
            )
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncOpError {
    #[error("failed to load config: {0}")]
    State(#[from] StateError),
    #[error("failed to set up mirror: {0}")]
    Setup(#[from] SyncError),
    #[error("every path failed to sync:\n{0}")]
    AllFailed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for SyncPaths {
    type Error = SyncOpError;
    type Output = SyncOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let engine = MirrorSync::new(state.config.mirror)?;

        let report = engine.batch_sync(&self.paths);
        if report.all_failed() {
            let reasons = report
                .results
                .iter()
                .filter_map(|(path, result)| {
                    result
                        .as_ref()
                        .err()
                        .map(|e| format!("  {}: {}", path.display(), e))
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Err(SyncOpError::AllFailed(reasons));
        }

        let rows = report
            .results
            .into_iter()
            .map(|(path, result)| SyncRow {
                path,
                result: result.map_err(|e| e.to_string()),
            })
            .collect();
        Ok(SyncOutput { rows })
    }
}
