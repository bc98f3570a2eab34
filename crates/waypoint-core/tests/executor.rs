mod common;

use async_trait::async_trait;
use common::{Call, FakeDriver, button, dropdown, text_input};
use std::sync::Arc;
use std::sync::Mutex;
use waypoint_core::{
    Action, ActionError, ActionExecutor, DetectionMethod, ElementHandle, ElementKind,
    ElementMapper, Error, HookContext, Plugin, PluginPipeline, PluginResult, Snapshot,
};

/// Records every hook invocation.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn pre_action(&self, action: Action, _ctx: &HookContext<'_>) -> PluginResult<Action> {
        self.events
            .lock()
            .unwrap()
            .push(format!("pre:{}", action.name()));
        Ok(action)
    }

    async fn post_action(&self, action: &Action, success: bool) -> PluginResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("post:{}:{}", action.name(), success));
        Ok(())
    }

    async fn on_error(&self, error: &Error) -> PluginResult<()> {
        self.events.lock().unwrap().push(format!("error:{}", error));
        Ok(())
    }
}

/// Replaces a placeholder in typed text.
struct Substitute;

#[async_trait]
impl Plugin for Substitute {
    fn name(&self) -> &str {
        "substitute"
    }

    async fn pre_action(&self, action: Action, _ctx: &HookContext<'_>) -> PluginResult<Action> {
        Ok(match action {
            Action::Input { element, text } => Action::Input {
                element,
                text: text.replace("{{secret}}", "hunter2"),
            },
            other => other,
        })
    }
}

async fn snapshot_of(driver: &FakeDriver) -> Snapshot {
    ElementMapper::new(DetectionMethod::Dom, false)
        .scan(driver, "https://example.com")
        .await
        .unwrap()
}

fn ctx<'a>(snapshot: &'a Snapshot) -> HookContext<'a> {
    HookContext {
        url: "https://example.com",
        task: "test",
        snapshot,
    }
}

fn executor() -> ActionExecutor {
    ActionExecutor::new(std::time::Duration::from_secs(1))
}

#[tokio::test]
async fn test_hooks_fire_once_around_success() {
    let driver = FakeDriver::new(vec![button(7, "Submit")]);
    let snapshot = snapshot_of(&driver).await;
    let recorder = Arc::new(Recorder::default());
    let plugins = PluginPipeline::new().with(recorder.clone());

    let outcome = executor()
        .execute(&driver, &plugins, Action::Click { element: 1 }, &ctx(&snapshot))
        .await
        .unwrap();

    assert!(outcome.settled);
    assert_eq!(driver.calls(), vec![Call::Click(ElementHandle(7))]);
    assert_eq!(recorder.events(), vec!["pre:click", "post:click:true"]);
}

#[tokio::test]
async fn test_unknown_element_fails_and_reports() {
    let driver = FakeDriver::new(vec![button(7, "Submit")]);
    let snapshot = snapshot_of(&driver).await;
    let recorder = Arc::new(Recorder::default());
    let plugins = PluginPipeline::new().with(recorder.clone());

    let err = executor()
        .execute(&driver, &plugins, Action::Click { element: 9 }, &ctx(&snapshot))
        .await
        .unwrap_err();

    assert_eq!(err, ActionError::ElementNotFound(9));
    assert!(driver.calls().is_empty());
    assert_eq!(
        recorder.events(),
        vec![
            "pre:click".to_string(),
            "post:click:false".to_string(),
            "error:Element 9 is not in the current snapshot".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_input_requires_editable_surface() {
    let driver = FakeDriver::new(vec![text_input(4, "Locked")]).read_only(4);
    let snapshot = snapshot_of(&driver).await;

    let err = executor()
        .execute(
            &driver,
            &PluginPipeline::new(),
            Action::Input {
                element: 1,
                text: "hello".to_string(),
            },
            &ctx(&snapshot),
        )
        .await
        .unwrap_err();

    assert_eq!(err, ActionError::NotEditable(1));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_select_requires_dropdown() {
    let driver = FakeDriver::new(vec![text_input(4, "Name"), dropdown(5, "Size")]);
    let snapshot = snapshot_of(&driver).await;

    let err = executor()
        .execute(
            &driver,
            &PluginPipeline::new(),
            Action::Select {
                element: 1,
                value: "L".to_string(),
            },
            &ctx(&snapshot),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ActionError::WrongKind {
            element: 1,
            expected: ElementKind::Dropdown,
            actual: ElementKind::Input,
        }
    );

    executor()
        .execute(
            &driver,
            &PluginPipeline::new(),
            Action::Select {
                element: 2,
                value: "L".to_string(),
            },
            &ctx(&snapshot),
        )
        .await
        .unwrap();
    assert_eq!(
        driver.calls(),
        vec![Call::Select(ElementHandle(5), "L".to_string())]
    );
}

#[tokio::test]
async fn test_pre_action_rewrite_is_what_runs() {
    let driver = FakeDriver::new(vec![text_input(4, "Password")]);
    let snapshot = snapshot_of(&driver).await;
    let plugins = PluginPipeline::new().with(Arc::new(Substitute));

    let outcome = executor()
        .execute(
            &driver,
            &plugins,
            Action::Input {
                element: 1,
                text: "{{secret}}".to_string(),
            },
            &ctx(&snapshot),
        )
        .await
        .unwrap();

    assert_eq!(outcome.action.text(), Some("hunter2"));
    assert_eq!(
        driver.calls(),
        vec![Call::Fill(ElementHandle(4), "hunter2".to_string())]
    );
}

#[tokio::test]
async fn test_bare_submit_needs_no_element() {
    let driver = FakeDriver::new(vec![]);
    let snapshot = Snapshot::new("https://example.com");

    executor()
        .execute(&driver, &PluginPipeline::new(), Action::Submit, &ctx(&snapshot))
        .await
        .unwrap();

    assert_eq!(driver.calls(), vec![Call::Submit]);
}

#[tokio::test(start_paused = true)]
async fn test_unsettled_page_is_not_a_failure() {
    let driver = FakeDriver::new(vec![button(7, "Load more")]).never_idle();
    let snapshot = snapshot_of(&driver).await;
    let recorder = Arc::new(Recorder::default());
    let plugins = PluginPipeline::new().with(recorder.clone());

    let outcome = ActionExecutor::new(std::time::Duration::from_secs(30))
        .execute(&driver, &plugins, Action::Click { element: 1 }, &ctx(&snapshot))
        .await
        .unwrap();

    assert!(!outcome.settled);
    assert_eq!(outcome.action, Action::Click { element: 1 });
    assert_eq!(driver.calls(), vec![Call::Click(ElementHandle(7))]);
    assert_eq!(recorder.events(), vec!["pre:click", "post:click:true"]);
}
