use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No API key for {provider}: pass --api-key or set {env}")]
    MissingApiKey {
        provider: &'static str,
        env: &'static str,
    },

    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
