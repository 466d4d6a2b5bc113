use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to initiate link session: {0}")]
    Initiation(String),
    #[error("gateway request failed: {0}")]
    Gateway(String),
    #[error("verification request failed: {0}")]
    Verification(String),
    #[error("invalid account id: {0}")]
    InvalidAccount(String),
    #[error("checkout could not be completed: {0}")]
    Checkout(String),
    #[cfg(feature = "gateway-http")]
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}
