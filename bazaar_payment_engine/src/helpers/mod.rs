mod download_token;

pub use download_token::{sign_download_token, verify_download_token, DownloadClaim, DownloadTokenError};
