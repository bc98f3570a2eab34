use crate::config::DetectionMethod;
use crate::driver::BrowserDriver;
use crate::error::MappingError;
use crate::model::{ElementKind, RawElement, RawLabel, Snapshot};
use std::collections::HashMap;

/// Input types that render as buttons even though the tag is `input`.
const BUTTON_INPUT_TYPES: &[&str] = &["submit", "button", "reset"];

/// Label text keyed by the id it is associated with.
pub type LabelMap = HashMap<String, String>;

/// Turns raw DOM candidates into a numbered, described element registry.
pub struct ElementMapper {
    method: DetectionMethod,
    show_visuals: bool,
}

impl ElementMapper {
    pub fn new(method: DetectionMethod, show_visuals: bool) -> Self {
        Self {
            method,
            show_visuals,
        }
    }

    /// Visible interactive candidates in detection order.
    pub async fn detect(&self, driver: &dyn BrowserDriver) -> Result<Vec<RawElement>, MappingError> {
        match self.method {
            DetectionMethod::Vision => {
                tracing::warn!("Vision-based detection is not available, no elements detected");
                Ok(Vec::new())
            }
            DetectionMethod::Dom => {
                let candidates = driver.query_interactive_candidates().await?;
                let total = candidates.len();
                let visible: Vec<RawElement> = candidates.into_iter().filter(|c| c.visible).collect();
                tracing::debug!("Detected {} visible candidates out of {}", visible.len(), total);
                Ok(visible)
            }
        }
    }

    /// Read the page's labels into a lookup map.
    pub async fn labels(&self, driver: &dyn BrowserDriver) -> Result<LabelMap, MappingError> {
        if self.method == DetectionMethod::Vision {
            return Ok(LabelMap::new());
        }
        Ok(build_label_map(&driver.query_labels().await?))
    }

    /// Number and describe candidates, dropping those without a description.
    pub fn map(&self, url: &str, raw: Vec<RawElement>, labels: &LabelMap) -> Snapshot {
        let mut snapshot = Snapshot::new(url);
        for element in raw {
            let Some(description) = describe(&element, labels) else {
                tracing::debug!("Skipping <{}> without description", element.tag);
                continue;
            };
            snapshot.push(element.handle, classify(&element), description, element.bounding_box);
        }
        snapshot
    }

    /// Full mapping pass: detect, resolve labels, number, and mark.
    pub async fn scan(&self, driver: &dyn BrowserDriver, url: &str) -> Result<Snapshot, MappingError> {
        let labels = self.labels(driver).await?;
        let raw = self.detect(driver).await?;
        let snapshot = self.map(url, raw, &labels);

        tracing::info!("Mapped {} interactive elements on {}", snapshot.len(), url);

        if self.show_visuals {
            self.mark(driver, &snapshot).await;
        }

        Ok(snapshot)
    }

    /// Draw numbered badges. Failures are logged and skipped.
    async fn mark(&self, driver: &dyn BrowserDriver, snapshot: &Snapshot) {
        for element in snapshot.iter() {
            let Some(bbox) = element.bounding_box else {
                tracing::debug!("No bounding box for element {}, not marking", element.id);
                continue;
            };
            if let Err(e) = driver
                .draw_badge(element.id, bbox, element.kind.badge_color())
                .await
            {
                tracing::debug!("Failed to mark element {}: {}", element.id, e);
            }
        }
    }
}

/// Build the label lookup. A `for` attribute takes precedence over the
/// label's own id; later labels overwrite earlier ones.
pub fn build_label_map(labels: &[RawLabel]) -> LabelMap {
    let mut map = LabelMap::new();
    for label in labels {
        let text = label.text.trim();
        if text.is_empty() {
            continue;
        }
        let key = non_empty(label.for_id.as_deref()).or_else(|| non_empty(label.own_id.as_deref()));
        if let Some(key) = key {
            map.insert(key.to_string(), text.to_string());
        }
    }
    map
}

pub fn classify(element: &RawElement) -> ElementKind {
    let tag = element.tag.to_ascii_lowercase();
    if tag == "select" {
        return ElementKind::Dropdown;
    }
    if tag == "input" || tag == "textarea" {
        let input_type = element
            .input_type
            .as_deref()
            .unwrap_or("")
            .to_ascii_lowercase();
        if !BUTTON_INPUT_TYPES.contains(&input_type.as_str()) {
            return ElementKind::Input;
        }
    }
    ElementKind::Clickable
}

/// First non-empty of: label, inner text, aria-label, placeholder.
pub fn describe(element: &RawElement, labels: &LabelMap) -> Option<String> {
    let label = element
        .dom_id
        .as_deref()
        .and_then(|id| labels.get(id))
        .map(String::as_str);

    [
        label,
        element.inner_text.as_deref(),
        element.aria_label.as_deref(),
        element.placeholder.as_deref(),
    ]
    .into_iter()
    .find_map(non_empty)
    .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
