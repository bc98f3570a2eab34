use thiserror::Error;
use waypoint_core::DriverError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Chrome not found: {0}")]
    ChromeNotFound(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

impl From<Error> for DriverError {
    fn from(err: Error) -> Self {
        DriverError::Interaction(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
