//! Interaction engine for LLM-driven browser automation.
//!
//! A run walks a single browser session through the decide-act-verify loop:
//! map the page into numbered elements, ask a language model what to do,
//! execute the resulting actions, and check whether the task is finished.

pub mod action;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod llm;
pub mod mapper;
pub mod model;
pub mod plugin;
pub mod prompt;

pub use action::{Action, COMPLETION_SENTINEL, Decision, parse_decision};
pub use config::{DetectionMethod, EngineConfig, format_url};
pub use driver::{BrowserDriver, DriverResult, NavigationResponse};
pub use engine::{CompletionSignal, InteractionLoop, IterationRecord, RunReport, StopReason};
pub use error::{
    ActionError, DecisionError, DriverError, Error, MappingError, ModelError, NavigationError,
    PluginError, Result,
};
pub use executor::{ActionExecutor, ActionOutcome};
pub use llm::{ChatMessage, LanguageModel, Role};
pub use mapper::ElementMapper;
pub use model::{
    BoundingBox, ElementHandle, ElementKind, MappedElement, RawElement, RawLabel, Snapshot,
    TaskState,
};
pub use plugin::{HookContext, Plugin, PluginPayload, PluginPipeline, PluginResult};

pub use tokio_util::sync::CancellationToken;
