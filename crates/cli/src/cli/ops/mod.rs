pub mod cat;
pub mod configure;
mod conversation;
pub mod init;
pub mod script;
pub mod sync;
pub mod table;
pub mod version;

pub use cat::Cat;
pub use configure::Configure;
pub use init::Init;
pub use script::RunScript;
pub use sync::SyncPaths;
pub use table::ShowTable;
pub use version::Version;
