use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use waypoint_core::{Action, Decision, Error, HookContext, Plugin, PluginResult, Snapshot};

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySummary {
    pub navigations: u64,
    pub decisions: u64,
    pub completions: u64,
    pub actions_succeeded: u64,
    pub actions_failed: u64,
    pub errors: u64,
}

impl TelemetrySummary {
    pub fn actions_attempted(&self) -> u64 {
        self.actions_succeeded + self.actions_failed
    }
}

/// Counts loop events.
#[derive(Debug, Default)]
pub struct TelemetryPlugin {
    navigations: AtomicU64,
    decisions: AtomicU64,
    completions: AtomicU64,
    actions_succeeded: AtomicU64,
    actions_failed: AtomicU64,
    errors: AtomicU64,
}

impl TelemetryPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            navigations: self.navigations.load(Ordering::Relaxed),
            decisions: self.decisions.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            actions_succeeded: self.actions_succeeded.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Plugin for TelemetryPlugin {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn cleanup(&self) -> PluginResult<()> {
        let summary = self.summary();
        tracing::info!(
            navigations = summary.navigations,
            decisions = summary.decisions,
            actions = summary.actions_attempted(),
            failed = summary.actions_failed,
            errors = summary.errors,
            "Run telemetry"
        );
        Ok(())
    }

    async fn on_navigation(&self, url: &str, snapshot: &Snapshot) -> PluginResult<()> {
        self.navigations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("telemetry: navigation to {} ({} elements)", url, snapshot.len());
        Ok(())
    }

    async fn post_decision(&self, decision: &Decision, _ctx: &HookContext<'_>) -> PluginResult<()> {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        if *decision == Decision::Complete {
            self.completions.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!("telemetry: decision with {} actions", decision.actions().len());
        Ok(())
    }

    async fn post_action(&self, action: &Action, success: bool) -> PluginResult<()> {
        if success {
            self.actions_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.actions_failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!("telemetry: {} {}", action.name(), if success { "ok" } else { "failed" });
        Ok(())
    }

    async fn on_error(&self, error: &Error) -> PluginResult<()> {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("telemetry: error {}", error);
        Ok(())
    }
}
