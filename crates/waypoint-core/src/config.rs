use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How interactive candidates are found on a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    #[default]
    Dom,
    /// Screenshot-based detection. Not implemented: yields no candidates.
    Vision,
}

/// Tunables for one interaction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_iterations: u32,
    pub navigation_retries: u32,
    pub navigation_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub idle_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub completion_check: bool,
    pub show_visuals: bool,
    pub detection: DetectionMethod,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            navigation_retries: 3,
            navigation_timeout_secs: 60,
            retry_backoff_ms: 1000,
            idle_timeout_secs: 30,
            model_timeout_secs: 120,
            completion_check: true,
            show_visuals: false,
            detection: DetectionMethod::Dom,
        }
    }
}

impl EngineConfig {
    /// Load a config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading engine config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".to_string()));
        }
        if self.navigation_retries == 0 {
            return Err(Error::Config(
                "navigation_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

/// Prepend `https://` to a URL that has no http(s) scheme.
pub fn format_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
