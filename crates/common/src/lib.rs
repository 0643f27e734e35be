//! Core building blocks for mirrorshell
//!
//! Two independent components live here:
//!
//! - [`process`]: drives an interactive command-line program by feeding it
//!   scripted answers while background tasks keep its output pipes drained.
//! - [`mirror`]: keeps single paths of a local working tree consistent with a
//!   mirror tree by comparing modification times.
//!
//! [`wizard`] holds the canned answer sequences used to configure the mount
//! tool, and [`fsutil`] the small directory helpers shared by both.

pub mod fsutil;
pub mod mirror;
pub mod process;
pub mod version;
pub mod wizard;

pub mod prelude {
    pub use crate::mirror::{MirrorConfig, MirrorSync, SyncError, SyncOutcome};
    pub use crate::process::{
        DriverConfig, InteractiveCommand, OutputSnapshot, ProcessError, Script, ScriptOptions,
        ScriptStep,
    };
}
