pub mod endpoints;
pub mod token;

pub use endpoints::GoogleOauthEndpoints;
pub use token::DriveToken;
