use crate::model::{ElementKind, Snapshot};
use serde::{Deserialize, Serialize};

/// The literal a model answers with once the task is finished.
pub const COMPLETION_SENTINEL: &str = "DONE";

const SUBMIT_SUFFIX: &str = "ENTER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click { element: u32 },
    Input { element: u32, text: String },
    InputAndSubmit { element: u32, text: String },
    Submit,
    Select { element: u32, value: String },
}

impl Action {
    /// The element this action targets, if any.
    pub fn element(&self) -> Option<u32> {
        match self {
            Action::Click { element }
            | Action::Input { element, .. }
            | Action::InputAndSubmit { element, .. }
            | Action::Select { element, .. } => Some(*element),
            Action::Submit => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Input { .. } => "input",
            Action::InputAndSubmit { .. } => "input_and_submit",
            Action::Submit => "submit",
            Action::Select { .. } => "select",
        }
    }

    /// Text carried by input-like actions.
    pub fn text(&self) -> Option<&str> {
        match self {
            Action::Input { text, .. } | Action::InputAndSubmit { text, .. } => Some(text),
            Action::Select { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Rewrite the action for the element it targets in `snapshot`.
    ///
    /// The wire format has no select token, so text aimed at a dropdown
    /// becomes a `Select` with that value.
    pub fn resolve(self, snapshot: &Snapshot) -> Action {
        match self {
            Action::Input { element, text } => match snapshot.get(element) {
                Some(target) if target.kind == ElementKind::Dropdown => Action::Select {
                    element,
                    value: text,
                },
                _ => Action::Input { element, text },
            },
            other => other,
        }
    }
}

/// A parsed model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "actions", rename_all = "snake_case")]
pub enum Decision {
    Complete,
    Actions(Vec<Action>),
}

impl Decision {
    pub fn actions(&self) -> &[Action] {
        match self {
            Decision::Complete => &[],
            Decision::Actions(actions) => actions,
        }
    }
}

/// Parse a decision string.
///
/// Either the completion sentinel (any case) or `;`-separated tokens:
/// `N` clicks, `N:text` inputs, `N:text ENTER` inputs and submits, and a
/// bare `ENTER` submits. Malformed tokens are dropped with a warning.
pub fn parse_decision(raw: &str) -> Decision {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(COMPLETION_SENTINEL) {
        return Decision::Complete;
    }

    let actions = trimmed
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let parsed = parse_token(token);
            if parsed.is_none() {
                tracing::warn!("Dropping malformed decision token: {:?}", token);
            }
            parsed
        })
        .collect();

    Decision::Actions(actions)
}

fn parse_token(token: &str) -> Option<Action> {
    match token.split_once(':') {
        Some((number, text)) => {
            let element = parse_element(number)?;
            let text = text.trim();
            match strip_submit_suffix(text) {
                Some(text) => Some(Action::InputAndSubmit {
                    element,
                    text: text.to_string(),
                }),
                None => Some(Action::Input {
                    element,
                    text: text.to_string(),
                }),
            }
        }
        None if token.eq_ignore_ascii_case(SUBMIT_SUFFIX) => Some(Action::Submit),
        None => parse_element(token).map(|element| Action::Click { element }),
    }
}

fn parse_element(number: &str) -> Option<u32> {
    number.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

/// Text before a trailing ` ENTER` word, or empty text for a bare `ENTER`.
fn strip_submit_suffix(text: &str) -> Option<&str> {
    let split = text.len().checked_sub(SUBMIT_SUFFIX.len())?;
    let (head, tail) = (text.get(..split)?, text.get(split..)?);
    if !tail.eq_ignore_ascii_case(SUBMIT_SUFFIX) {
        return None;
    }
    if head.is_empty() || head.ends_with(char::is_whitespace) {
        Some(head.trim_end())
    } else {
        None
    }
}
