//! Answer sequences for the `rclone config` wizard
//!
//! Each preset lists, in order, the answers a person would type to create a
//! remote. The sequences are positional: they assume the prompt order and the
//! storage-type menu numbering of the rclone release they were written
//! against, and a different release can silently produce a wrong remote.
//! Steps carry no expected prompts; add them through a custom script when the
//! prompt texts are known.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::process::Script;

/// Command that opens the interactive wizard
pub const DEFAULT_WIZARD_COMMAND: &str = "rclone config";
pub const DEFAULT_ONEDRIVE_CONN: &str = "onedrive";
pub const DEFAULT_WEBDAV_CONN: &str = "aliyundrive";
pub const DEFAULT_WEBDAV_PORT: u16 = 8081;

/// Storage-type menu entries in the wizard
const ONEDRIVE_STORAGE_TYPE: &str = "27";
const WEBDAV_STORAGE_TYPE: &str = "40";
/// "Other site/service or software" in the WebDAV vendor menu
const WEBDAV_VENDOR_OTHER: &str = "5";
const WEBDAV_USER: &str = "admin";
const WEBDAV_PASS: &str = "admin";

/// A remote the wizard knows how to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WizardPreset {
    /// Microsoft OneDrive, authorized with a token from `rclone authorize "onedrive"`
    OneDrive {
        conn_name: String,
        config_token: String,
    },
    /// A WebDAV bridge listening on localhost
    WebDav { conn_name: String, port: u16 },
}

impl WizardPreset {
    pub fn onedrive(config_token: impl Into<String>) -> Self {
        WizardPreset::OneDrive {
            conn_name: DEFAULT_ONEDRIVE_CONN.to_string(),
            config_token: config_token.into(),
        }
    }

    pub fn webdav() -> Self {
        WizardPreset::WebDav {
            conn_name: DEFAULT_WEBDAV_CONN.to_string(),
            port: DEFAULT_WEBDAV_PORT,
        }
    }

    pub fn conn_name(&self) -> &str {
        match self {
            WizardPreset::OneDrive { conn_name, .. } | WizardPreset::WebDav { conn_name, .. } => {
                conn_name
            }
        }
    }

    /// Rename the remote being created
    pub fn with_conn_name(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            WizardPreset::OneDrive { conn_name, .. } | WizardPreset::WebDav { conn_name, .. } => {
                *conn_name = name.into()
            }
        }
        self
    }

    /// The answers, in prompt order
    pub fn script(&self) -> Script {
        match self {
            WizardPreset::OneDrive {
                conn_name,
                config_token,
            } => Script::blind([
                "n", // new remote
                conn_name.as_str(),
                ONEDRIVE_STORAGE_TYPE,
                "",
                "",
                "1",
                "n",
                "n", // no browser in a notebook, paste the token instead
                config_token.as_str(),
                "",
                "1",
                "y",
                "q",
            ]),
            WizardPreset::WebDav { conn_name, port } => {
                let url = format!("http://127.0.0.1:{}", port);
                Script::blind([
                    "n",
                    conn_name.as_str(),
                    WEBDAV_STORAGE_TYPE,
                    url.as_str(),
                    WEBDAV_VENDOR_OTHER,
                    WEBDAV_USER,
                    "y", // type in own password
                    WEBDAV_PASS,
                    WEBDAV_PASS,
                    "",
                    "n",
                    "y",
                    "q",
                ])
            }
        }
    }
}

impl fmt::Display for WizardPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardPreset::OneDrive { conn_name, .. } => write!(f, "onedrive remote '{}'", conn_name),
            WizardPreset::WebDav { conn_name, port } => {
                write!(f, "webdav remote '{}' on port {}", conn_name, port)
            }
        }
    }
}
