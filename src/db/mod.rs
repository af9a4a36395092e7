//! Database module: the folder lock table.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite)
//! - `sqlite.rs`: queries against the pool

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{FolderLock, LockChange};
pub use schema::SQLITE_INIT;
pub use sqlite::{FolderLockStorage, SqlitePool};
