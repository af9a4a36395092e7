pub mod folder_lock;
pub mod password;
pub mod session_actor;

pub use folder_lock::{FolderLockService, UnlockOutcome};
pub use session_actor::SessionHandle;
