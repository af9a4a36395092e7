use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of `folder_locks`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FolderLock {
    pub folder_id: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a password-set did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockChange {
    Created,
    Updated,
}
