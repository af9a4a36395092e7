pub mod drive;
pub mod folder_lock;
pub mod google_oauth;
