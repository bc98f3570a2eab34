use crate::action::{Action, Decision, parse_decision};
use crate::config::{EngineConfig, format_url};
use crate::driver::BrowserDriver;
use crate::error::{ActionError, DecisionError, Error, NavigationError};
use crate::executor::ActionExecutor;
use crate::llm::LanguageModel;
use crate::mapper::ElementMapper;
use crate::model::{Snapshot, TaskState};
use crate::plugin::{HookContext, PluginPipeline};
use crate::prompt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a completed run learned it was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    /// The model answered with the completion sentinel.
    Sentinel,
    /// The yes/no completion check answered yes.
    CompletionCheck,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Completed {
        signal: CompletionSignal,
    },
    IterationLimit {
        limit: u32,
    },
    NavigationExhausted {
        url: String,
        attempts: u32,
        #[serde(serialize_with = "display")]
        error: NavigationError,
    },
    ActionFailed {
        /// 1-based position of the failing action in its batch.
        index: usize,
        action: Action,
        #[serde(serialize_with = "display")]
        error: ActionError,
        /// Actions of the batch that ran before the failure.
        completed: Vec<Action>,
    },
    DecisionFailed {
        #[serde(serialize_with = "display")]
        error: DecisionError,
    },
    Cancelled,
}

impl StopReason {
    pub fn is_completed(&self) -> bool {
        matches!(self, StopReason::Completed { .. })
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Completed {
                signal: CompletionSignal::Sentinel,
            } => write!(f, "task completed (model signalled done)"),
            StopReason::Completed {
                signal: CompletionSignal::CompletionCheck,
            } => write!(f, "task completed (completion check)"),
            StopReason::IterationLimit { limit } => {
                write!(f, "stopped after reaching the {} iteration limit", limit)
            }
            StopReason::NavigationExhausted {
                url,
                attempts,
                error,
            } => write!(
                f,
                "navigation to {} failed after {} attempts: {}",
                url, attempts, error
            ),
            StopReason::ActionFailed {
                index,
                action,
                error,
                ..
            } => write!(f, "action {} ({}) failed: {}", index, action.name(), error),
            StopReason::DecisionFailed { error } => write!(f, "decision failed: {}", error),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// What one pass of the loop observed and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub url: String,
    pub elements: usize,
    pub decision: Option<String>,
    /// Actions that ran, as decided (before plugin rewrites).
    pub actions: Vec<Action>,
}

impl IterationRecord {
    fn new(iteration: u32, url: &str) -> Self {
        Self {
            iteration,
            url: url.to_string(),
            elements: 0,
            decision: None,
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub state: TaskState,
    pub stop_reason: StopReason,
    pub iterations: Vec<IterationRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.stop_reason.is_completed()
    }
}

/// States of the decide-act-verify machine.
#[derive(Debug)]
enum LoopState {
    Navigating { url: String },
    Mapping,
    AwaitingDecision { snapshot: Snapshot },
    Acting { snapshot: Snapshot, actions: Vec<Action> },
    Verifying,
    Finished(StopReason),
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            LoopState::Navigating { .. } => "navigating",
            LoopState::Mapping => "mapping",
            LoopState::AwaitingDecision { .. } => "awaiting_decision",
            LoopState::Acting { .. } => "acting",
            LoopState::Verifying => "verifying",
            LoopState::Finished(_) => "finished",
        }
    }
}

/// Drives one browser session through the decide-act-verify loop.
pub struct InteractionLoop {
    driver: Arc<dyn BrowserDriver>,
    model: Arc<dyn LanguageModel>,
    plugins: PluginPipeline,
    config: EngineConfig,
    mapper: ElementMapper,
    executor: ActionExecutor,
    cancel: CancellationToken,
}

impl InteractionLoop {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        model: Arc<dyn LanguageModel>,
        plugins: PluginPipeline,
        config: EngineConfig,
    ) -> Self {
        let mapper = ElementMapper::new(config.detection, config.show_visuals);
        let executor = ActionExecutor::new(config.idle_timeout());
        Self {
            driver,
            model,
            plugins,
            config,
            mapper,
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the task to a terminal state, then close the browser session.
    pub async fn run(self, url: &str, task: &str) -> RunReport {
        let started_at = Utc::now();
        let mut state = TaskState::new(format_url(url), task);
        let mut records = Vec::new();

        tracing::info!("Starting task: {}", task);
        tracing::debug!("Plugins: {:?}", self.plugins.names());
        self.plugins.initialize().await;

        let mut current = LoopState::Navigating {
            url: state.url.clone(),
        };
        let stop_reason = loop {
            if let LoopState::Finished(reason) = current {
                break reason;
            }
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping before {}", current.name());
                break StopReason::Cancelled;
            }
            tracing::debug!(iteration = state.iteration, "Entering state {}", current.name());
            current = self.step(current, &mut state, &mut records).await;
        };

        match &stop_reason {
            StopReason::Completed { .. } => tracing::info!("Run finished: {}", stop_reason),
            _ => tracing::warn!("Run finished: {}", stop_reason),
        }

        self.teardown().await;

        RunReport {
            state,
            stop_reason,
            iterations: records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn step(
        &self,
        current: LoopState,
        state: &mut TaskState,
        records: &mut Vec<IterationRecord>,
    ) -> LoopState {
        match current {
            LoopState::Navigating { url } => {
                if state.iteration >= self.config.max_iterations {
                    return LoopState::Finished(StopReason::IterationLimit {
                        limit: self.config.max_iterations,
                    });
                }
                state.iteration += 1;
                tracing::info!("--- Iteration {} ---", state.iteration);
                records.push(IterationRecord::new(state.iteration, &url));

                match self.navigate(&url).await {
                    Ok(final_url) => {
                        state.url = final_url;
                        LoopState::Mapping
                    }
                    Err((attempts, error)) => {
                        self.plugins.on_error(&Error::Navigation(error.clone())).await;
                        LoopState::Finished(StopReason::NavigationExhausted {
                            url,
                            attempts,
                            error,
                        })
                    }
                }
            }

            LoopState::Mapping => {
                let snapshot = match self.mapper.scan(self.driver.as_ref(), &state.url).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!("Mapping failed, continuing with no elements: {}", e);
                        self.plugins.on_error(&Error::Mapping(e)).await;
                        Snapshot::new(state.url.clone())
                    }
                };
                if let Some(record) = records.last_mut() {
                    record.url = state.url.clone();
                    record.elements = snapshot.len();
                }
                self.plugins.on_navigation(&state.url, &snapshot).await;
                LoopState::AwaitingDecision { snapshot }
            }

            LoopState::AwaitingDecision { snapshot } => {
                let ctx = HookContext {
                    url: &state.url,
                    task: &state.task,
                    snapshot: &snapshot,
                };
                let raw = match self.decide(&ctx).await {
                    Ok(raw) => raw,
                    Err(error) => {
                        self.plugins.on_error(&Error::Decision(error.clone())).await;
                        return LoopState::Finished(StopReason::DecisionFailed { error });
                    }
                };
                if let Some(record) = records.last_mut() {
                    record.decision = Some(raw.clone());
                }

                let decision = parse_decision(&raw);
                self.plugins.post_decision(&decision, &ctx).await;

                match decision {
                    Decision::Complete => {
                        state.done = true;
                        LoopState::Finished(StopReason::Completed {
                            signal: CompletionSignal::Sentinel,
                        })
                    }
                    Decision::Actions(actions) if actions.is_empty() => {
                        let error = DecisionError::NoActions(raw);
                        self.plugins.on_error(&Error::Decision(error.clone())).await;
                        LoopState::Finished(StopReason::DecisionFailed { error })
                    }
                    Decision::Actions(actions) => LoopState::Acting { snapshot, actions },
                }
            }

            LoopState::Acting { snapshot, actions } => {
                let ctx = HookContext {
                    url: &state.url,
                    task: &state.task,
                    snapshot: &snapshot,
                };
                let mut completed = Vec::with_capacity(actions.len());
                for (position, action) in actions.into_iter().enumerate() {
                    let action = action.resolve(&snapshot);
                    let result = self
                        .executor
                        .execute(self.driver.as_ref(), &self.plugins, action.clone(), &ctx)
                        .await;
                    if let Err(error) = result {
                        if let Some(record) = records.last_mut() {
                            record.actions = completed.clone();
                        }
                        return LoopState::Finished(StopReason::ActionFailed {
                            index: position + 1,
                            action,
                            error,
                            completed,
                        });
                    }
                    completed.push(action);
                }
                if let Some(record) = records.last_mut() {
                    record.actions = completed;
                }
                LoopState::Verifying
            }

            LoopState::Verifying => {
                match self.driver.current_url().await {
                    Ok(url) => state.url = url,
                    Err(e) => tracing::warn!("Could not read current URL, keeping {}: {}", state.url, e),
                }

                if self.config.completion_check && self.check_completed(state).await {
                    state.done = true;
                    return LoopState::Finished(StopReason::Completed {
                        signal: CompletionSignal::CompletionCheck,
                    });
                }

                LoopState::Navigating {
                    url: state.url.clone(),
                }
            }

            LoopState::Finished(reason) => LoopState::Finished(reason),
        }
    }

    /// Load a URL with bounded retries and exponential backoff.
    ///
    /// Returns the final URL, or the attempt count and last error.
    async fn navigate(&self, url: &str) -> Result<String, (u32, NavigationError)> {
        let retries = self.config.navigation_retries.max(1);
        let timeout = self.config.navigation_timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(attempt, "Navigating to {} (attempt {}/{})", url, attempt, retries);

            let error = match tokio::time::timeout(timeout, self.driver.navigate(url)).await {
                Ok(Ok(response)) => match response.status {
                    Some(status) if response.is_error_status() => NavigationError::Status {
                        url: url.to_string(),
                        status,
                    },
                    _ => {
                        let final_url = if response.final_url.is_empty() {
                            url.to_string()
                        } else {
                            response.final_url
                        };
                        tracing::info!("Page loaded: {}", final_url);
                        return Ok(final_url);
                    }
                },
                Ok(Err(source)) => NavigationError::Transport {
                    url: url.to_string(),
                    source,
                },
                Err(_) => NavigationError::Timeout {
                    url: url.to_string(),
                    timeout,
                },
            };

            tracing::warn!(attempt, "{}", error);
            if attempt >= retries {
                tracing::error!("Failed to navigate to {} after {} attempts", url, attempt);
                return Err((attempt, error));
            }

            let delay = self.config.retry_backoff() * 2u32.saturating_pow(attempt - 1);
            tracing::info!("Retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// One bounded model call for the next batch of actions.
    async fn decide(&self, ctx: &HookContext<'_>) -> Result<String, DecisionError> {
        let plugin_data = self.plugins.pre_decision(ctx).await;
        let messages = prompt::decision_messages(ctx.task, ctx.url, ctx.snapshot, &plugin_data);

        let timeout = self.config.model_timeout();
        let raw = tokio::time::timeout(timeout, self.model.complete(&messages))
            .await
            .map_err(|_| DecisionError::Timeout(timeout))??;

        tracing::info!("Model decision: {}", raw.trim());
        Ok(raw)
    }

    async fn check_completed(&self, state: &TaskState) -> bool {
        let timeout = self.config.model_timeout();
        let check = prompt::is_task_completed(self.model.as_ref(), &state.task, &state.url);
        match tokio::time::timeout(timeout, check).await {
            Ok(done) => done,
            Err(_) => {
                tracing::warn!("Completion check timed out after {:?}", timeout);
                false
            }
        }
    }

    async fn teardown(&self) {
        tracing::info!("Closing browser session");
        if let Err(e) = self.driver.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }
        self.plugins.cleanup().await;
    }
}
