use crate::network::NetworkTracker;
use crate::{ChromeFinder, Error, ProfileManager, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use waypoint_core::driver::DriverResult;
use waypoint_core::{
    BoundingBox, BrowserDriver, DriverError, ElementHandle, NavigationResponse, RawElement,
    RawLabel,
};

pub const WINDOW_SIZE: (u32, u32) = (1280, 720);

const INTERACTIVE_SELECTOR: &str = r#"a, button, [role="button"], input, textarea, select"#;

/// Network must stay quiet this long to count as idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Describes one element as JSON. Coordinates are page-relative.
const PROBE_FN: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    const visible = rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
    const text = (this.innerText || '').replace(/\s+/g, ' ').trim();
    return JSON.stringify({
        tag: this.tagName.toLowerCase(),
        input_type: typeof this.type === 'string' ? this.type : null,
        dom_id: this.id || null,
        inner_text: text ? text.slice(0, 200) : null,
        aria_label: this.getAttribute('aria-label'),
        placeholder: this.getAttribute('placeholder'),
        bounding_box: visible ? {
            x: rect.left + window.scrollX,
            y: rect.top + window.scrollY,
            width: rect.width,
            height: rect.height
        } : null,
        visible: visible
    });
}"#;

const LABELS_SCRIPT: &str = r#"Array.from(document.querySelectorAll('label')).map(l => ({
    for_id: l.htmlFor || null,
    own_id: l.id || null,
    text: (l.innerText || '').replace(/\s+/g, ' ').trim()
}))"#;

const STATUS_SCRIPT: &str = r#"(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : null;
})()"#;

const EDITABLE_FN: &str = r#"function() {
    if (this.isContentEditable) return JSON.stringify(!this.disabled);
    const tag = this.tagName.toLowerCase();
    if (tag !== 'input' && tag !== 'textarea') return JSON.stringify(false);
    const blocked = ['submit', 'button', 'reset', 'checkbox', 'radio', 'file', 'image', 'hidden', 'range', 'color'];
    return JSON.stringify(!this.disabled && !this.readOnly && !blocked.includes((this.type || '').toLowerCase()));
}"#;

const CLEAR_FN: &str = r#"function() {
    if (this.isContentEditable) { this.textContent = ''; } else { this.value = ''; }
    this.dispatchEvent(new Event('input', { bubbles: true }));
    return JSON.stringify(true);
}"#;

/// How to start the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub chrome_path: Option<PathBuf>,
    /// Named persistent profile; a temporary one when unset.
    pub profile: Option<String>,
    pub headless: bool,
}

/// Elements of the most recent candidate query.
///
/// A handle packs the query generation in its high 32 bits and the index in
/// the low 32, so handles from an earlier query are detectably stale.
struct Registry<T> {
    generation: u32,
    items: Vec<Arc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            items: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    fn replace(&mut self, items: Vec<Arc<T>>) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.items = items;
        self.generation
    }

    fn handle(generation: u32, index: usize) -> ElementHandle {
        ElementHandle((u64::from(generation) << 32) | index as u64)
    }

    fn get(&self, handle: ElementHandle) -> DriverResult<Arc<T>> {
        let generation = (handle.0 >> 32) as u32;
        let index = (handle.0 & 0xffff_ffff) as usize;
        if generation != self.generation {
            return Err(DriverError::StaleHandle(handle));
        }
        self.items
            .get(index)
            .cloned()
            .ok_or(DriverError::StaleHandle(handle))
    }
}

#[derive(Debug, Deserialize)]
struct Probe {
    tag: String,
    input_type: Option<String>,
    dom_id: Option<String>,
    inner_text: Option<String>,
    aria_label: Option<String>,
    placeholder: Option<String>,
    bounding_box: Option<BoundingBox>,
    visible: bool,
}

impl Probe {
    fn into_raw(self, handle: ElementHandle) -> RawElement {
        RawElement {
            handle,
            tag: self.tag,
            input_type: self.input_type,
            dom_id: self.dom_id,
            inner_text: self.inner_text.map(|t| single_line(&t)),
            aria_label: self.aria_label.map(|t| single_line(&t)),
            placeholder: self.placeholder.map(|t| single_line(&t)),
            bounding_box: self.bounding_box,
            visible: self.visible,
        }
    }
}

/// Collapse runs of whitespace so a description fits on one layout line.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A single Chrome session driven over CDP.
pub struct CdpDriver {
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: Page,
    network: Arc<Mutex<NetworkTracker>>,
    registry: Mutex<Registry<Element>>,
    closed: AtomicBool,
    handler_task: JoinHandle<()>,
    network_task: JoinHandle<()>,
    _profile: ProfileManager,
}

impl CdpDriver {
    /// Launch Chrome and open the page this driver controls.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let chrome = ChromeFinder::new(options.chrome_path.clone()).find()?;
        let profile = match &options.profile {
            Some(name) => ProfileManager::named(name)?,
            None => ProfileManager::temporary()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome)
            .user_data_dir(profile.path())
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::Launch)?;

        tracing::info!(
            headless = options.headless,
            "Launching Chrome: {}",
            chrome.display()
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;

        let network = Arc::new(Mutex::new(NetworkTracker::new()));
        let network_task = track_network(&page, network.clone()).await?;

        tracing::info!("Browser ready, profile at {}", profile.path().display());

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            page,
            network,
            registry: Mutex::new(Registry::default()),
            closed: AtomicBool::new(false),
            handler_task,
            network_task,
            _profile: profile,
        })
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    fn element(&self, handle: ElementHandle) -> DriverResult<Arc<Element>> {
        self.ensure_open()?;
        lock(&self.registry).get(handle)
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType) -> DriverResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13);
        if kind == DispatchKeyEventType::KeyDown {
            builder = builder.text("\r");
        }
        let params = builder.build().map_err(DriverError::Interaction)?;
        self.page.execute(params).await.map_err(interaction)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> DriverResult<NavigationResponse> {
        self.ensure_open()?;
        lock(&self.network).reset();

        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        let status = match self.page.evaluate(STATUS_SCRIPT).await {
            Ok(result) => result.into_value::<Option<u16>>().ok().flatten(),
            Err(e) => {
                tracing::debug!("Could not read navigation status: {}", e);
                None
            }
        };
        let final_url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        tracing::debug!(?status, "Navigated to {}", final_url);
        Ok(NavigationResponse { status, final_url })
    }

    async fn query_interactive_candidates(&self) -> DriverResult<Vec<RawElement>> {
        self.ensure_open()?;
        let elements: Vec<Arc<Element>> = self
            .page
            .find_elements(INTERACTIVE_SELECTOR)
            .await
            .map_err(query)?
            .into_iter()
            .map(Arc::new)
            .collect();
        let generation = lock(&self.registry).replace(elements.clone());

        let mut candidates = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            match call_json::<Probe>(element, PROBE_FN).await {
                Ok(probe) => {
                    candidates.push(probe.into_raw(Registry::<Element>::handle(generation, index)))
                }
                Err(e) => tracing::debug!("Skipping candidate {} that could not be probed: {}", index, e),
            }
        }
        Ok(candidates)
    }

    async fn query_labels(&self) -> DriverResult<Vec<RawLabel>> {
        self.ensure_open()?;
        self.page
            .evaluate(LABELS_SCRIPT)
            .await
            .map_err(query)?
            .into_value::<Vec<RawLabel>>()
            .map_err(|e| DriverError::Query(format!("unexpected label data: {}", e)))
    }

    async fn click(&self, handle: ElementHandle) -> DriverResult<()> {
        let element = self.element(handle)?;
        element.click().await.map_err(interaction)?;
        Ok(())
    }

    async fn fill(&self, handle: ElementHandle, text: &str) -> DriverResult<()> {
        let element = self.element(handle)?;
        call_json::<bool>(&element, CLEAR_FN).await?;
        element.focus().await.map_err(interaction)?;
        element.type_str(text).await.map_err(interaction)?;
        Ok(())
    }

    async fn select_option(&self, handle: ElementHandle, value: &str) -> DriverResult<()> {
        let element = self.element(handle)?;
        let wanted = serde_json::to_string(value).map_err(|e| DriverError::Interaction(e.to_string()))?;
        let function = format!(
            r#"function() {{
                const wanted = {wanted}.trim().toLowerCase();
                const options = Array.from(this.options || []);
                const match = options.find(o => o.value.toLowerCase() === wanted)
                    || options.find(o => o.text.trim().toLowerCase() === wanted);
                if (!match) return JSON.stringify(false);
                this.value = match.value;
                this.dispatchEvent(new Event('input', {{ bubbles: true }}));
                this.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return JSON.stringify(true);
            }}"#
        );
        if !call_json::<bool>(&element, &function).await? {
            return Err(DriverError::Interaction(format!(
                "no option matching {:?}",
                value
            )));
        }
        Ok(())
    }

    async fn press_submit_key(&self) -> DriverResult<()> {
        self.ensure_open()?;
        self.dispatch_key(DispatchKeyEventType::KeyDown).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp).await
    }

    async fn is_editable(&self, handle: ElementHandle) -> DriverResult<bool> {
        let element = self.element(handle)?;
        call_json::<bool>(&element, EDITABLE_FN).await
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.ensure_open()?;
        self.page
            .url()
            .await
            .map_err(query)?
            .ok_or_else(|| DriverError::Query("page has no URL".to_string()))
    }

    async fn wait_for_idle(&self) -> DriverResult<()> {
        loop {
            self.ensure_open()?;
            let idle = lock(&self.network).is_idle(Instant::now(), QUIET_WINDOW);
            if idle {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn draw_badge(&self, number: u32, bbox: BoundingBox, color: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let color = serde_json::to_string(color).map_err(|e| DriverError::Interaction(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                const badge = document.createElement('div');
                badge.className = 'waypoint-badge';
                badge.textContent = '{number}';
                Object.assign(badge.style, {{
                    position: 'absolute',
                    left: '{x}px',
                    top: '{y}px',
                    background: {color},
                    color: 'black',
                    font: 'bold 12px sans-serif',
                    padding: '1px 4px',
                    borderRadius: '3px',
                    zIndex: '2147483647',
                    pointerEvents: 'none'
                }});
                document.body.appendChild(badge);
                return true;
            }})()"#,
            x = bbox.x,
            y = bbox.y,
        );
        self.page.evaluate(script).await.map_err(interaction)?;
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            browser.close().await.map_err(interaction)?;
            if let Err(e) = browser.wait().await {
                tracing::debug!("Waiting for Chrome to exit failed: {}", e);
            }
        }
        self.network_task.abort();
        self.handler_task.abort();
        tracing::info!("Browser closed");
        Ok(())
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.network_task.abort();
        self.handler_task.abort();
    }
}

/// Feed request lifecycle events into the tracker until the page goes away.
async fn track_network(page: &Page, tracker: Arc<Mutex<NetworkTracker>>) -> Result<JoinHandle<()>> {
    let mut started = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let mut failed = page.event_listener::<EventLoadingFailed>().await?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = started.next() => {
                    tracing::trace!("Request: {} {}", event.request.method, event.request.url);
                    lock(&tracker).request_started(
                        event.request_id.inner().to_string(),
                        event.request.url.clone(),
                    );
                }
                Some(event) = finished.next() => {
                    lock(&tracker).request_finished(event.request_id.inner());
                }
                Some(event) = failed.next() => {
                    tracing::trace!("Request failed: {}", event.error_text);
                    lock(&tracker).request_finished(event.request_id.inner());
                }
                else => break,
            }
        }
    }))
}

/// Call a function on an element that returns `JSON.stringify(...)`.
async fn call_json<T: DeserializeOwned>(element: &Element, function: &str) -> DriverResult<T> {
    let returns = element.call_js_fn(function, false).await.map_err(query)?;
    if let Some(details) = returns.exception_details {
        return Err(DriverError::Query(format!("script threw: {}", details.text)));
    }
    let raw = returns
        .result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| DriverError::Query("script returned no value".to_string()))?;
    serde_json::from_str(raw).map_err(|e| DriverError::Query(format!("unexpected script result: {}", e)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn query(err: chromiumoxide::error::CdpError) -> DriverError {
    DriverError::Query(err.to_string())
}

fn interaction(err: chromiumoxide::error::CdpError) -> DriverError {
    DriverError::Interaction(err.to_string())
}
