#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;
use waypoint_core::driver::DriverResult;
use waypoint_core::{
    BrowserDriver, ChatMessage, DriverError, ElementHandle, EngineConfig, LanguageModel,
    ModelError, NavigationResponse, RawElement, RawLabel,
};

/// A driver call, as recorded by [`FakeDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    Click(ElementHandle),
    Fill(ElementHandle, String),
    Select(ElementHandle, String),
    Submit,
    Close,
}

#[derive(Default)]
struct FakeState {
    candidates: Vec<RawElement>,
    labels: Vec<RawLabel>,
    navigations: VecDeque<DriverResult<Option<u16>>>,
    url: String,
    failing_clicks: HashSet<ElementHandle>,
    read_only: HashSet<ElementHandle>,
    failing_query: bool,
    never_idle: bool,
    hanging_navigations: usize,
    navigated_at: Vec<Instant>,
    calls: Vec<Call>,
}

/// In-memory browser with a fixed page.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new(candidates: Vec<RawElement>) -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().candidates = candidates;
        driver
    }

    pub fn with_labels(self, labels: Vec<RawLabel>) -> Self {
        self.state.lock().unwrap().labels = labels;
        self
    }

    /// Queue navigation outcomes. Once drained, navigation answers 200.
    pub fn with_navigations(self, outcomes: Vec<DriverResult<Option<u16>>>) -> Self {
        self.state.lock().unwrap().navigations = outcomes.into();
        self
    }

    pub fn failing_click(self, handle: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_clicks
            .insert(ElementHandle(handle));
        self
    }

    pub fn read_only(self, handle: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .read_only
            .insert(ElementHandle(handle));
        self
    }

    /// Candidate and label queries fail.
    pub fn failing_query(self) -> Self {
        self.state.lock().unwrap().failing_query = true;
        self
    }

    /// `wait_for_idle` never resolves.
    pub fn never_idle(self) -> Self {
        self.state.lock().unwrap().never_idle = true;
        self
    }

    /// The first `count` navigations never resolve.
    pub fn hanging_navigation(self, count: usize) -> Self {
        self.state.lock().unwrap().hanging_navigations = count;
        self
    }

    /// When each navigation attempt started.
    pub fn navigated_at(&self) -> Vec<Instant> {
        self.state.lock().unwrap().navigated_at.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn known(&self, handle: ElementHandle) -> DriverResult<()> {
        let state = self.state.lock().unwrap();
        if state.candidates.iter().any(|c| c.handle == handle) {
            Ok(())
        } else {
            Err(DriverError::StaleHandle(handle))
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> DriverResult<NavigationResponse> {
        self.record(Call::Navigate(url.to_string()));
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.navigated_at.push(Instant::now());
            let hang = state.hanging_navigations > 0;
            state.hanging_navigations = state.hanging_navigations.saturating_sub(1);
            hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        let status = state.navigations.pop_front().unwrap_or(Ok(Some(200)))?;
        state.url = url.to_string();
        Ok(NavigationResponse {
            status,
            final_url: url.to_string(),
        })
    }

    async fn query_interactive_candidates(&self) -> DriverResult<Vec<RawElement>> {
        let state = self.state.lock().unwrap();
        if state.failing_query {
            return Err(DriverError::Query("execution context was destroyed".to_string()));
        }
        Ok(state.candidates.clone())
    }

    async fn query_labels(&self) -> DriverResult<Vec<RawLabel>> {
        let state = self.state.lock().unwrap();
        if state.failing_query {
            return Err(DriverError::Query("execution context was destroyed".to_string()));
        }
        Ok(state.labels.clone())
    }

    async fn click(&self, handle: ElementHandle) -> DriverResult<()> {
        self.known(handle)?;
        self.record(Call::Click(handle));
        if self.state.lock().unwrap().failing_clicks.contains(&handle) {
            return Err(DriverError::Interaction("element is covered".to_string()));
        }
        Ok(())
    }

    async fn fill(&self, handle: ElementHandle, text: &str) -> DriverResult<()> {
        self.known(handle)?;
        self.record(Call::Fill(handle, text.to_string()));
        Ok(())
    }

    async fn select_option(&self, handle: ElementHandle, value: &str) -> DriverResult<()> {
        self.known(handle)?;
        self.record(Call::Select(handle, value.to_string()));
        Ok(())
    }

    async fn press_submit_key(&self) -> DriverResult<()> {
        self.record(Call::Submit);
        Ok(())
    }

    async fn is_editable(&self, handle: ElementHandle) -> DriverResult<bool> {
        self.known(handle)?;
        Ok(!self.state.lock().unwrap().read_only.contains(&handle))
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn wait_for_idle(&self) -> DriverResult<()> {
        let never_idle = self.state.lock().unwrap().never_idle;
        if never_idle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Model that replays queued answers, then repeats a fallback if one is set.
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| Ok(a.to_string())).collect()),
            ..Default::default()
        }
    }

    pub fn constant(answer: &str) -> Self {
        Self {
            fallback: Some(answer.to_string()),
            ..Default::default()
        }
    }

    pub fn failing(error: ModelError) -> Self {
        Self {
            answers: Mutex::new(VecDeque::from([Err(error)])),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        if let Some(answer) = self.answers.lock().unwrap().pop_front() {
            return answer;
        }
        self.fallback
            .clone()
            .ok_or_else(|| ModelError::Transport("script exhausted".to_string()))
    }
}

pub fn button(handle: u64, text: &str) -> RawElement {
    RawElement {
        handle: ElementHandle(handle),
        tag: "button".to_string(),
        inner_text: Some(text.to_string()),
        visible: true,
        ..Default::default()
    }
}

pub fn text_input(handle: u64, placeholder: &str) -> RawElement {
    RawElement {
        handle: ElementHandle(handle),
        tag: "input".to_string(),
        input_type: Some("text".to_string()),
        placeholder: Some(placeholder.to_string()),
        visible: true,
        ..Default::default()
    }
}

pub fn dropdown(handle: u64, text: &str) -> RawElement {
    RawElement {
        handle: ElementHandle(handle),
        tag: "select".to_string(),
        aria_label: Some(text.to_string()),
        visible: true,
        ..Default::default()
    }
}

pub fn label(for_id: &str, text: &str) -> RawLabel {
    RawLabel {
        for_id: Some(for_id.to_string()),
        own_id: None,
        text: text.to_string(),
    }
}

/// Defaults with no backoff and no completion check.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_backoff_ms: 0,
        completion_check: false,
        ..Default::default()
    }
}
