use crate::model::{ElementHandle, ElementKind};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a browser driver implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element query failed: {0}")]
    Query(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Stale element handle: {0:?}")]
    StaleHandle(ElementHandle),

    #[error("Browser session is closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    #[error("HTTP status {status} while loading {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to load {url}: {source}")]
    Transport { url: String, source: DriverError },

    #[error("Timed out after {timeout:?} loading {url}")]
    Timeout { url: String, timeout: Duration },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Element mapping failed: {0}")]
pub struct MappingError(#[from] pub DriverError);

/// Failures of the language model service itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed model response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("No usable action in model response: {0:?}")]
    NoActions(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Element {0} is not in the current snapshot")]
    ElementNotFound(u32),

    #[error("Element {0} is not an editable text surface")]
    NotEditable(u32),

    #[error("Element {element} is {actual}, expected {expected}")]
    WrongKind {
        element: u32,
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Plugin '{plugin}' failed in {hook}: {message}")]
    Failed {
        plugin: String,
        hook: &'static str,
        message: String,
    },

    #[error("Plugin '{plugin}' panicked in {hook}")]
    Panicked { plugin: String, hook: &'static str },
}

impl PluginError {
    /// Convenience for plugin authors returning a failure from a hook.
    pub fn failed(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        PluginError::Failed {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
