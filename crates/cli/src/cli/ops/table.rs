use std::fmt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use comfy_table::Table as Grid;
use owo_colors::OwoColorize;

use common::mirror::{MirrorSync, SyncError, Table, TabularFormat};
use mirrorshell::state::{AppState, StateError};

/// Delimited text format for CLI selection
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Comma separated
    Csv,
    /// Tab separated
    Tsv,
}

impl From<FormatArg> for TabularFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => TabularFormat::Csv,
            FormatArg::Tsv => TabularFormat::Tsv,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ShowTable {
    /// Local path of a delimited text file
    pub path: PathBuf,

    /// Input format (guessed from the extension when omitted)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
}

#[derive(Debug)]
pub struct TableOutput {
    pub path: PathBuf,
    pub format: TabularFormat,
    pub table: Table,
}

impl fmt::Display for TableOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            return write!(f, "{} is empty", self.path.display());
        }

        let mut grid = Grid::new();
        grid.set_header(self.table.headers.clone());
        for row in &self.table.rows {
            grid.add_row(row.clone());
        }
        writeln!(f, "{grid}")?;
        write!(
            f,
            "{} {} row(s) from {} ({})",
            "Read".green().bold(),
            self.table.rows.len(),
            self.path.display(),
            self.format
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to load config: {0}")]
    State(#[from] StateError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ShowTable {
    type Error = TableError;
    type Output = TableOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let engine = MirrorSync::new(state.config.mirror)?;

        let format = self
            .format
            .map(TabularFormat::from)
            .unwrap_or_else(|| TabularFormat::from_path(&self.path));
        let table = engine.read_tabular_for_sync(&self.path, format)?;

        Ok(TableOutput {
            path: self.path.clone(),
            format,
            table,
        })
    }
}
