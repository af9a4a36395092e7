//! SQL DDL for the folder lock table.

/// SQLite schema:
/// - `folder_id` is the provider-assigned id and the PRIMARY KEY, so there is
///   at most one lock per folder
/// - `password_hash` holds an Argon2 PHC string or a legacy SHA-256 hex digest
/// - timestamps are RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS folder_locks (
    folder_id TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
