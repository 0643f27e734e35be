//! Build information reported by `mirrorshell version`

use std::fmt;

use serde::Serialize;

/// Static build metadata for a binary
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub package: String,
    pub version: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

impl BuildInfo {
    /// Assemble build info from values captured at the caller's compile time.
    ///
    /// Use the [`build_info!`](crate::build_info) macro rather than calling
    /// this directly so the package name and version belong to the binary.
    pub fn from_env(
        package: &str,
        version: &str,
        build_timestamp: Option<&str>,
        build_profile: Option<&str>,
    ) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
            build_timestamp: build_timestamp.unwrap_or("unknown").to_string(),
            build_profile: build_profile.unwrap_or("unknown").to_string(),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (built {}, {})",
            self.package, self.version, self.build_timestamp, self.build_profile
        )
    }
}

/// Capture [`BuildInfo`] for the crate invoking the macro
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo::from_env(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            option_env!("BUILD_TIMESTAMP"),
            option_env!("BUILD_PROFILE"),
        )
    };
}
