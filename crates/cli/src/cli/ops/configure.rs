use std::fmt;

use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;

use common::process::{ProcessError, Script};
use common::wizard::{WizardPreset, DEFAULT_WEBDAV_CONN, DEFAULT_WEBDAV_PORT};
use mirrorshell::state::{AppState, StateError};

use super::conversation::{converse, Transcript};

/// Remote kind for CLI selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    /// Microsoft OneDrive (needs --token)
    #[default]
    Onedrive,
    /// WebDAV bridge on localhost
    Webdav,
}

#[derive(Args, Debug, Clone)]
pub struct Configure {
    /// Remote kind; when omitted, custom wizard steps from the config win
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Remote name (defaults to the configured name, or `aliyundrive` for webdav)
    #[arg(long)]
    pub conn_name: Option<String>,

    /// Token printed by `rclone authorize "onedrive"`
    #[arg(long, env = "MIRRORSHELL_ONEDRIVE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Port of the local WebDAV bridge
    #[arg(long, default_value_t = DEFAULT_WEBDAV_PORT)]
    pub port: u16,

    /// Seconds between blind answers (overrides the config)
    #[arg(long)]
    pub interval: Option<f64>,

    /// Wizard command (overrides the config)
    #[arg(long)]
    pub command: Option<String>,

    /// Echo answers and the wizard's output while it runs
    #[arg(long)]
    pub show_output: bool,
}

#[derive(Debug)]
pub struct ConfigureOutput {
    pub remote: String,
    pub transcript: Transcript,
}

impl fmt::Display for ConfigureOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", "Configured".green().bold(), self.remote.bold())?;
        write!(f, "{}", self.transcript)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    #[error("failed to load config: {0}")]
    State(#[from] StateError),
    #[error("--token is required for the onedrive preset")]
    MissingToken,
    #[error("wizard conversation failed: {0}")]
    Process(#[from] ProcessError),
    #[error("wizard `{command}` did not finish cleanly ({status})\n{output}")]
    WizardFailed {
        command: String,
        status: String,
        output: String,
    },
}

impl Configure {
    /// Pick the answer sequence and describe the remote it creates
    fn plan(&self, state: &AppState) -> Result<(String, Script), ConfigureError> {
        let wizard = &state.config.wizard;
        if self.preset.is_none() {
            if let Some(script) = wizard.custom_script() {
                return Ok((format!("custom script ({} steps)", script.len()), script));
            }
        }

        let preset = match self.preset.unwrap_or_default() {
            PresetArg::Onedrive => {
                let token = self.token.clone().ok_or(ConfigureError::MissingToken)?;
                WizardPreset::onedrive(token)
                    .with_conn_name(self.conn_name.as_deref().unwrap_or(&wizard.conn_name))
            }
            PresetArg::Webdav => WizardPreset::WebDav {
                conn_name: self
                    .conn_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WEBDAV_CONN.to_string()),
                port: self.port,
            },
        };
        Ok((preset.to_string(), preset.script()))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Configure {
    type Error = ConfigureError;
    type Output = ConfigureOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let (remote, script) = self.plan(&state)?;

        let mut driver = state.config.driver.clone();
        if let Some(interval) = self.interval {
            driver.interval_secs = interval;
        }
        let command = self
            .command
            .clone()
            .unwrap_or_else(|| state.config.wizard.command.clone());

        tracing::info!("Running `{}` for {}", command, remote);
        let verbose = self.show_output || ctx.verbose;
        let transcript = converse(&command, &driver, &script, verbose).await?;

        if !transcript.succeeded() {
            return Err(ConfigureError::WizardFailed {
                command,
                status: transcript.status_text(),
                output: transcript.output.to_string(),
            });
        }

        Ok(ConfigureOutput { remote, transcript })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::op::{Op, OpContext};
    use common::process::ScriptStep;
    use mirrorshell::state::AppConfig;
    use std::path::Path;
    use tempfile::TempDir;

    fn configure(preset: Option<PresetArg>) -> Configure {
        Configure {
            preset,
            conn_name: None,
            token: None,
            port: DEFAULT_WEBDAV_PORT,
            interval: Some(0.0),
            command: None,
            show_output: false,
        }
    }

    fn init(dir: &Path, config: AppConfig) -> AppState {
        AppState::init(Some(dir.to_path_buf()), Some(config), false).unwrap()
    }

    #[test]
    fn test_plan_onedrive_needs_token() {
        let temp = TempDir::new().unwrap();
        let state = init(temp.path(), AppConfig::default());

        let err = configure(None).plan(&state).unwrap_err();
        assert!(matches!(err, ConfigureError::MissingToken));

        let mut op = configure(Some(PresetArg::Onedrive));
        op.token = Some("{\"access_token\":\"t\"}".to_string());
        let (remote, script) = op.plan(&state).unwrap();
        assert_eq!(remote, "onedrive remote 'onedrive'");
        assert!(script.answers().any(|a| a.contains("access_token")));
    }

    #[test]
    fn test_plan_webdav_defaults() {
        let temp = TempDir::new().unwrap();
        let state = init(temp.path(), AppConfig::default());

        let mut op = configure(Some(PresetArg::Webdav));
        op.port = 9000;
        let (remote, script) = op.plan(&state).unwrap();
        assert_eq!(remote, "webdav remote 'aliyundrive' on port 9000");
        assert!(script.answers().any(|a| a == "http://127.0.0.1:9000"));
    }

    #[test]
    fn test_plan_prefers_custom_steps() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.wizard.steps = vec![ScriptStep::blind("q")];
        let state = init(temp.path(), config);

        let (remote, script) = configure(None).plan(&state).unwrap();
        assert_eq!(remote, "custom script (1 steps)");
        assert_eq!(script.len(), 1);

        // an explicit preset still wins
        let (_, script) = configure(Some(PresetArg::Webdav)).plan(&state).unwrap();
        assert!(script.len() > 1);
    }

    #[tokio::test]
    async fn test_configure_runs_custom_wizard() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.wizard.command = r#"printf 'e/n/q> '; read choice; echo "picked $choice""#.to_string();
        config.wizard.steps = vec![ScriptStep::after("e/n/q> ", "q")];
        init(temp.path(), config);

        let ctx = OpContext::new(Some(temp.path().to_path_buf()), false);
        let output = configure(None).execute(&ctx).await.unwrap();
        assert_eq!(output.transcript.prompts_matched, 1);
        assert!(output.transcript.output.stdout.contains("picked q"));
    }

    #[tokio::test]
    async fn test_configure_reports_failed_wizard() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.wizard.steps = vec![ScriptStep::blind("q")];
        init(temp.path(), config);

        let mut op = configure(None);
        op.command = Some("read x; echo broken >&2; exit 1".to_string());
        let ctx = OpContext::new(Some(temp.path().to_path_buf()), false);
        let err = op.execute(&ctx).await.unwrap_err();

        assert!(matches!(err, ConfigureError::WizardFailed { .. }));
        assert!(err.to_string().contains("broken"));
    }
}
