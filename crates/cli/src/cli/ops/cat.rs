use std::fmt;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use common::mirror::{MirrorSync, SyncError};
use mirrorshell::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Local path to sync and print
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct CatOutput {
    pub path: PathBuf,
    pub size: usize,
    pub content: String,
}

impl fmt::Display for CatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}  {} {} bytes",
            "File:".dimmed(),
            self.path.display().to_string().bold(),
            "Size:".dimmed(),
            self.size
        )?;
        write!(f, "{}", self.content)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error("failed to load config: {0}")]
    State(#[from] StateError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = CatOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let engine = MirrorSync::new(state.config.mirror)?;

        let mut file = engine.open_for_sync(&self.path, OpenOptions::new().read(true))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|source| CatError::Read {
            path: self.path.clone(),
            source,
        })?;

        Ok(CatOutput {
            path: self.path.clone(),
            size: bytes.len(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
