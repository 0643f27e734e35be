// App state (configuration, paths)
pub mod state;

pub use state::{AppConfig, AppState, DriverSettings, StateError, WizardSettings};

/// Build info for the `mirrorshell` binary.
///
/// Expanded here so the package name and the build-script values belong to
/// this crate rather than to `common`.
pub fn build_info() -> common::version::BuildInfo {
    common::build_info!()
}
