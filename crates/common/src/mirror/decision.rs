//! The per-path synchronization decision

use std::time::SystemTime;

/// What a single sync call does for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy local → mirror
    Push,
    /// Copy mirror → local
    Pull,
    /// Both sides present and the mirror is at least as new
    Skip,
    /// Neither side holds the file
    Missing,
}

/// Decide from the modification time of each side (`None` = absent).
///
/// Ties favor [`SyncAction::Skip`], which is what makes a repeated sync of an
/// unchanged pair write nothing.
pub fn decide(local: Option<SystemTime>, mirror: Option<SystemTime>) -> SyncAction {
    match (local, mirror) {
        (Some(_), None) => SyncAction::Push,
        (Some(local), Some(mirror)) if mirror < local => SyncAction::Push,
        (Some(_), Some(_)) => SyncAction::Skip,
        (None, Some(_)) => SyncAction::Pull,
        (None, None) => SyncAction::Missing,
    }
}
