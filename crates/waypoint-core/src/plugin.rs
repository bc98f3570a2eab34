use crate::action::{Action, Decision};
use crate::error::{Error, PluginError};
use crate::model::Snapshot;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Key/value data contributed by plugins before a decision.
pub type PluginPayload = serde_json::Map<String, serde_json::Value>;

pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Read-only view of the loop handed to plugin hooks.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub url: &'a str,
    pub task: &'a str,
    pub snapshot: &'a Snapshot,
}

/// An extension of the interaction loop.
///
/// Every hook has a no-op default, so a plugin implements only what it needs.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self) -> PluginResult<()> {
        Ok(())
    }

    async fn cleanup(&self) -> PluginResult<()> {
        Ok(())
    }

    async fn on_navigation(&self, _url: &str, _snapshot: &Snapshot) -> PluginResult<()> {
        Ok(())
    }

    async fn pre_decision(&self, _ctx: &HookContext<'_>) -> PluginResult<PluginPayload> {
        Ok(PluginPayload::new())
    }

    async fn post_decision(&self, _decision: &Decision, _ctx: &HookContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    async fn pre_action(&self, action: Action, _ctx: &HookContext<'_>) -> PluginResult<Action> {
        Ok(action)
    }

    async fn post_action(&self, _action: &Action, _success: bool) -> PluginResult<()> {
        Ok(())
    }

    async fn on_error(&self, _error: &Error) -> PluginResult<()> {
        Ok(())
    }
}

/// Plugins in registration order.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        tracing::info!("Registered plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub async fn initialize(&self) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "initialize", p.initialize())),
        )
        .await;
    }

    pub async fn cleanup(&self) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "cleanup", p.cleanup())),
        )
        .await;
    }

    pub async fn on_navigation(&self, url: &str, snapshot: &Snapshot) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "on_navigation", p.on_navigation(url, snapshot))),
        )
        .await;
    }

    /// Collect payloads sequentially; on a key collision the plugin
    /// registered last wins.
    pub async fn pre_decision(&self, ctx: &HookContext<'_>) -> PluginPayload {
        let mut merged = PluginPayload::new();
        for plugin in &self.plugins {
            let Some(payload) = guarded(plugin.as_ref(), "pre_decision", plugin.pre_decision(ctx)).await
            else {
                continue;
            };
            for (key, value) in payload {
                if merged.contains_key(&key) {
                    tracing::debug!(
                        plugin = plugin.name(),
                        "Plugin overrides pre-decision key '{}'",
                        key
                    );
                }
                merged.insert(key, value);
            }
        }
        merged
    }

    pub async fn post_decision(&self, decision: &Decision, ctx: &HookContext<'_>) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "post_decision", p.post_decision(decision, ctx))),
        )
        .await;
    }

    /// Thread the action through every plugin in registration order.
    pub async fn pre_action(&self, action: Action, ctx: &HookContext<'_>) -> Action {
        let mut current = action;
        for plugin in &self.plugins {
            if let Some(next) =
                guarded(plugin.as_ref(), "pre_action", plugin.pre_action(current.clone(), ctx)).await
            {
                if next != current {
                    tracing::debug!(plugin = plugin.name(), "Plugin rewrote action: {}", next.name());
                }
                current = next;
            }
        }
        current
    }

    pub async fn post_action(&self, action: &Action, success: bool) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "post_action", p.post_action(action, success))),
        )
        .await;
    }

    pub async fn on_error(&self, error: &Error) {
        join_all(
            self.plugins
                .iter()
                .map(|p| guarded(p.as_ref(), "on_error", p.on_error(error))),
        )
        .await;
    }
}

/// Run one hook, turning an error or panic into a logged "no contribution".
async fn guarded<T, F>(plugin: &dyn Plugin, hook: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = PluginResult<T>>,
{
    let error = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => e,
        Err(_) => PluginError::Panicked {
            plugin: plugin.name().to_string(),
            hook,
        },
    };
    tracing::error!(plugin = plugin.name(), hook, "{}", error);
    None
}
