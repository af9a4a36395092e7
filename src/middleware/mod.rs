pub mod session;

pub use session::{ApiSession, DriveSession};
