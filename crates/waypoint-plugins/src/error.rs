use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid credentials file {path}: {message}")]
    Credentials { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
