use crate::action::Action;
use crate::driver::BrowserDriver;
use crate::error::{ActionError, Error};
use crate::model::{ElementKind, MappedElement, Snapshot};
use crate::plugin::{HookContext, PluginPipeline};
use std::time::Duration;

/// What happened when an action ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// The action as executed, after plugin rewrites.
    pub action: Action,
    /// Whether the page reached network quiescence before the timeout.
    pub settled: bool,
}

/// Translates actions into driver calls.
pub struct ActionExecutor {
    idle_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    /// Run one action attempt wrapped in the plugin hooks.
    ///
    /// `pre_action` and `post_action` fire exactly once. A failure reaches
    /// `on_error` before it is returned.
    pub async fn execute(
        &self,
        driver: &dyn BrowserDriver,
        plugins: &PluginPipeline,
        action: Action,
        ctx: &HookContext<'_>,
    ) -> Result<ActionOutcome, ActionError> {
        let action = plugins.pre_action(action, ctx).await;

        tracing::info!("Performing {}", describe_action(&action, ctx.snapshot));
        let result = self.perform(driver, &action, ctx.snapshot).await;

        plugins.post_action(&action, result.is_ok()).await;

        match result {
            Ok(()) => {
                let settled = self.settle(driver).await;
                Ok(ActionOutcome { action, settled })
            }
            Err(e) => {
                tracing::error!("Action {} failed: {}", action.name(), e);
                plugins.on_error(&Error::Action(e.clone())).await;
                Err(e)
            }
        }
    }

    async fn perform(
        &self,
        driver: &dyn BrowserDriver,
        action: &Action,
        snapshot: &Snapshot,
    ) -> Result<(), ActionError> {
        match action {
            Action::Click { element } => {
                let target = lookup(snapshot, *element)?;
                driver.click(target.handle).await?;
            }
            Action::Input { element, text } => {
                let target = lookup(snapshot, *element)?;
                self.fill(driver, target, text).await?;
            }
            Action::InputAndSubmit { element, text } => {
                let target = lookup(snapshot, *element)?;
                self.fill(driver, target, text).await?;
                driver.press_submit_key().await?;
            }
            Action::Submit => {
                driver.press_submit_key().await?;
            }
            Action::Select { element, value } => {
                let target = lookup(snapshot, *element)?;
                if target.kind != ElementKind::Dropdown {
                    return Err(ActionError::WrongKind {
                        element: *element,
                        expected: ElementKind::Dropdown,
                        actual: target.kind,
                    });
                }
                driver.select_option(target.handle, value).await?;
            }
        }
        Ok(())
    }

    async fn fill(
        &self,
        driver: &dyn BrowserDriver,
        target: &MappedElement,
        text: &str,
    ) -> Result<(), ActionError> {
        if !driver.is_editable(target.handle).await? {
            return Err(ActionError::NotEditable(target.id));
        }
        driver.fill(target.handle, text).await?;
        Ok(())
    }

    /// Bounded wait for network quiescence. Never fails the action.
    async fn settle(&self, driver: &dyn BrowserDriver) -> bool {
        match tokio::time::timeout(self.idle_timeout, driver.wait_for_idle()).await {
            Ok(Ok(())) => {
                tracing::debug!("Page settled after action");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Waiting for page to settle failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Page did not settle within {:?}, continuing",
                    self.idle_timeout
                );
                false
            }
        }
    }
}

fn lookup(snapshot: &Snapshot, element: u32) -> Result<&MappedElement, ActionError> {
    snapshot
        .get(element)
        .ok_or(ActionError::ElementNotFound(element))
}

/// Log line for an action. Typed text is left out, it may be a secret.
fn describe_action(action: &Action, snapshot: &Snapshot) -> String {
    match action.element() {
        Some(id) => match snapshot.get(id) {
            Some(target) => format!("{} on element {} ({})", action.name(), id, target.description),
            None => format!("{} on element {}", action.name(), id),
        },
        None => action.name().to_string(),
    }
}
