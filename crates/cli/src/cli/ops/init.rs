use std::fmt;
use std::path::{Path, PathBuf};

use clap::Args;
use owo_colors::OwoColorize;

use common::mirror::{absolutize, MirrorConfig};
use mirrorshell::state::{AppConfig, AppState, DEFAULT_LOCAL_ROOT, DEFAULT_MIRROR_ROOT};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Root of the mirror tree (usually a mounted cloud drive); relative
    /// paths are stored resolved against the current directory
    #[arg(long, default_value = DEFAULT_MIRROR_ROOT)]
    pub mirror_root: PathBuf,

    /// Root of the local working tree
    #[arg(long, default_value = DEFAULT_LOCAL_ROOT)]
    pub local_root: PathBuf,

    /// Remote name the wizard presets create
    #[arg(long)]
    pub conn_name: Option<String>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug)]
pub struct InitOutput {
    pub app_dir: PathBuf,
    pub config_path: PathBuf,
    pub mirror_root: PathBuf,
    pub local_root: PathBuf,
    pub conn_name: String,
}

impl fmt::Display for InitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} mirrorshell at {}",
            "Initialized".green().bold(),
            self.app_dir.display().to_string().bold()
        )?;
        writeln!(f, "  {} {}", "Config:".dimmed(), self.config_path.display())?;
        writeln!(f, "  {} {}", "Mirror root:".dimmed(), self.mirror_root.display())?;
        writeln!(f, "  {} {}", "Local root:".dimmed(), self.local_root.display())?;
        write!(f, "  {} {}", "Remote name:".dimmed(), self.conn_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] mirrorshell::state::StateError),

    #[error("invalid path {path}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn absolute_root(path: &Path) -> Result<PathBuf, InitError> {
    absolutize(path).map_err(|source| InitError::InvalidPath {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = InitOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig {
            mirror: MirrorConfig::new(
                absolute_root(&self.mirror_root)?,
                absolute_root(&self.local_root)?,
            ),
            ..AppConfig::default()
        };
        if let Some(name) = &self.conn_name {
            config.wizard.conn_name = name.clone();
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config), self.force)?;

        Ok(InitOutput {
            app_dir: state.app_dir,
            config_path: state.config_path,
            mirror_root: state.config.mirror.mirror_root,
            local_root: state.config.mirror.local_root,
            conn_name: state.config.wizard.conn_name,
        })
    }
}
