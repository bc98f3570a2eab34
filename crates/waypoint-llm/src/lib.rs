//! Chat completion client used by the interaction engine to make decisions.

mod client;
mod error;

pub use client::{ChatClient, ClientConfig, Provider};
pub use error::{Error, Result};
