//! Application state: where mirrorshell keeps its configuration and logs
//!
//! Layout of the app directory (default `~/.mirrorshell`):
//!
//! ```text
//! ~/.mirrorshell/
//! ├── config.toml
//! └── log/
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::mirror::MirrorConfig;
use common::process::{
    DriverConfig, Script, ScriptStep, DEFAULT_INTERVAL, DEFAULT_PROMPT_TIMEOUT, DEFAULT_SHELL,
    DEFAULT_SHELL_ARG,
};
use common::wizard::{DEFAULT_ONEDRIVE_CONN, DEFAULT_WIZARD_COMMAND};

pub const APP_DIR_NAME: &str = ".mirrorshell";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_DIR_NAME: &str = "log";
pub const LOG_FILE_NAME: &str = "mirrorshell.log";

pub const DEFAULT_MIRROR_ROOT: &str = "/content/onedrive/notebooks/data";
pub const DEFAULT_LOCAL_ROOT: &str = "/content/notebooks/data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub wizard: WizardSettings,
    /// Overrides `<app dir>/log`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mirror: MirrorConfig::new(DEFAULT_MIRROR_ROOT, DEFAULT_LOCAL_ROOT),
            driver: DriverSettings::default(),
            wizard: WizardSettings::default(),
            log_dir: None,
        }
    }
}

/// How the process driver launches and paces commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub shell: PathBuf,
    pub shell_arg: String,
    /// Pause between blind answers, in seconds
    pub interval_secs: f64,
    /// How long to wait for an expected prompt, in seconds
    pub prompt_timeout_secs: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            shell_arg: DEFAULT_SHELL_ARG.to_string(),
            interval_secs: DEFAULT_INTERVAL.as_secs_f64(),
            prompt_timeout_secs: DEFAULT_PROMPT_TIMEOUT.as_secs(),
        }
    }
}

impl DriverSettings {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            shell: self.shell.clone(),
            shell_arg: self.shell_arg.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(DEFAULT_INTERVAL)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }
}

/// The mount tool's configuration wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardSettings {
    /// Command that opens the wizard
    pub command: String,
    /// Remote name used by the presets
    pub conn_name: String,
    /// Custom answers; when present they replace the preset sequence
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ScriptStep>,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_WIZARD_COMMAND.to_string(),
            conn_name: DEFAULT_ONEDRIVE_CONN.to_string(),
            steps: Vec::new(),
        }
    }
}

impl WizardSettings {
    /// The configured custom script, if any
    pub fn custom_script(&self) -> Option<Script> {
        if self.steps.is_empty() {
            None
        } else {
            Some(Script::new(self.steps.clone()))
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory holding the config file and default log dir
    pub app_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Resolve the app directory: `custom` if given, else `~/.mirrorshell`
    pub fn app_dir(custom: Option<PathBuf>) -> Result<PathBuf, StateError> {
        match custom {
            Some(dir) => Ok(dir),
            None => dirs::home_dir()
                .map(|home| home.join(APP_DIR_NAME))
                .ok_or(StateError::NoHomeDirectory),
        }
    }

    /// Write a fresh config, refusing to clobber an existing one unless `force`
    pub fn init(
        custom: Option<PathBuf>,
        config: Option<AppConfig>,
        force: bool,
    ) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom)?;
        let config_path = app_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() && !force {
            return Err(StateError::AlreadyInitialized(config_path));
        }

        common::fsutil::ensure_dir(&app_dir).map_err(|source| StateError::Io {
            path: app_dir.clone(),
            source,
        })?;

        let config = config.unwrap_or_default();
        let contents = toml::to_string_pretty(&config)?;
        std::fs::write(&config_path, contents).map_err(|source| StateError::Io {
            path: config_path.clone(),
            source,
        })?;
        tracing::info!("Wrote config to {}", config_path.display());

        Ok(Self {
            app_dir,
            config_path,
            config,
        })
    }

    /// Load an existing config
    pub fn load(custom: Option<PathBuf>) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom)?;
        let config_path = app_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized(app_dir));
        }

        let contents =
            std::fs::read_to_string(&config_path).map_err(|source| StateError::Io {
                path: config_path.clone(),
                source,
            })?;
        let config: AppConfig = toml::from_str(&contents)?;

        Ok(Self {
            app_dir,
            config_path,
            config,
        })
    }

    /// Where logs should go before the config is known
    pub fn default_log_dir(app_dir: &Path) -> PathBuf {
        app_dir.join(LOG_DIR_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config
            .log_dir
            .clone()
            .unwrap_or_else(|| Self::default_log_dir(&self.app_dir))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not determine home directory")]
    NoHomeDirectory,
    #[error("not initialized: no config in {0} (run `mirrorshell init`)")]
    NotInitialized(PathBuf),
    #[error("config already exists at {0} (use --force to overwrite)")]
    AlreadyInitialized(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
