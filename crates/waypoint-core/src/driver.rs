use crate::error::DriverError;
use crate::model::{BoundingBox, ElementHandle, RawElement, RawLabel};
use async_trait::async_trait;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Result of loading a URL.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationResponse {
    /// HTTP status of the main document, when the driver can observe it.
    pub status: Option<u16>,
    pub final_url: String,
}

impl NavigationResponse {
    pub fn is_error_status(&self) -> bool {
        self.status.is_some_and(|status| status >= 400)
    }
}

/// The narrow browser capability the engine consumes.
///
/// One driver instance is one browser session, exclusively owned by a
/// single interaction loop.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<NavigationResponse>;

    /// All interactive candidates in DOM order, visible or not.
    async fn query_interactive_candidates(&self) -> DriverResult<Vec<RawElement>>;

    async fn query_labels(&self) -> DriverResult<Vec<RawLabel>>;

    async fn click(&self, handle: ElementHandle) -> DriverResult<()>;

    async fn fill(&self, handle: ElementHandle, text: &str) -> DriverResult<()>;

    async fn select_option(&self, handle: ElementHandle, value: &str) -> DriverResult<()>;

    async fn press_submit_key(&self) -> DriverResult<()>;

    async fn is_editable(&self, handle: ElementHandle) -> DriverResult<bool>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Resolve once the page has no pending network activity.
    ///
    /// Callers bound this with their own timeout.
    async fn wait_for_idle(&self) -> DriverResult<()>;

    /// Overlay a numbered badge on the page.
    async fn draw_badge(&self, _number: u32, _bbox: BoundingBox, _color: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn close(&self) -> DriverResult<()>;
}
