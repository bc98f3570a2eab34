use crate::action::COMPLETION_SENTINEL;
use crate::error::ModelError;
use crate::llm::{ChatMessage, LanguageModel};
use crate::model::Snapshot;
use crate::plugin::PluginPayload;

const DECISION_SYSTEM: &str = "You are an AI assistant that navigates web pages. \
Be decisive and avoid repeating actions.";

const COMPLETION_SYSTEM: &str =
    "You are an AI assistant that determines if a web navigation task is completed.";

const EXTRACT_SYSTEM: &str = "You are an AI assistant that extracts the website URL and task \
from a given message. Respond with only the URL and task, separated by a newline.";

/// Messages asking the model for the next batch of actions.
pub fn decision_messages(
    task: &str,
    url: &str,
    snapshot: &Snapshot,
    plugin_data: &PluginPayload,
) -> Vec<ChatMessage> {
    let elements = if snapshot.is_empty() {
        "(no interactive elements found)".to_string()
    } else {
        snapshot.layout()
    };

    let mut prompt = format!(
        "Task: {task}\nCurrent URL: {url}\nPage elements:\n{elements}\n"
    );

    if !plugin_data.is_empty() {
        prompt.push_str("\nAdditional information:\n");
        for (key, value) in plugin_data {
            let value = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            prompt.push_str(&format!("- {}: {}\n", key, value));
        }
    }

    prompt.push_str(&format!(
        "\nDecide the next actions, separated by semicolons:\n\
         - To click an element, respond with just the element number.\n\
         - To input text, respond with the element number followed by a colon and the text.\n\
         - To press Enter after inputting text, append \"ENTER\" to the text.\n\
         - To press Enter on its own, respond with \"ENTER\".\n\
         - If the task is complete, respond with \"{COMPLETION_SENTINEL}\".\n\
         \nYour decision:"
    ));

    vec![ChatMessage::system(DECISION_SYSTEM), ChatMessage::user(prompt)]
}

pub fn completion_check_messages(task: &str, url: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(COMPLETION_SYSTEM),
        ChatMessage::user(format!(
            "Task: {task}\nCurrent URL: {url}\n\n\
             Is the task completed? Respond with 'Yes' if the task is completed, or 'No' if it's not."
        )),
    ]
}

/// Interpret a constrained yes/no answer. Anything but "yes" is a no.
pub fn is_affirmative(answer: &str) -> bool {
    answer
        .trim()
        .trim_end_matches(['.', '!'])
        .eq_ignore_ascii_case("yes")
}

/// Ask whether the task is done. A model failure counts as "not done".
pub async fn is_task_completed(model: &dyn LanguageModel, task: &str, url: &str) -> bool {
    match model.complete(&completion_check_messages(task, url)).await {
        Ok(answer) => {
            tracing::debug!("Completion check answered: {:?}", answer);
            is_affirmative(&answer)
        }
        Err(e) => {
            tracing::warn!("Completion check failed, assuming not done: {}", e);
            false
        }
    }
}

/// Split a free-form request into a start URL and a task.
pub async fn extract_url_and_task(
    model: &dyn LanguageModel,
    message: &str,
) -> Result<(String, String), ModelError> {
    let reply = model
        .complete(&[ChatMessage::system(EXTRACT_SYSTEM), ChatMessage::user(message)])
        .await?;
    parse_url_and_task(&reply).ok_or_else(|| {
        ModelError::Malformed(format!("expected URL and task on separate lines, got {:?}", reply))
    })
}

fn parse_url_and_task(reply: &str) -> Option<(String, String)> {
    let mut lines = reply.lines().map(str::trim).filter(|l| !l.is_empty());
    let url = lines.next()?;
    let task = lines.collect::<Vec<_>>().join(" ");
    if task.is_empty() {
        return None;
    }
    Some((url.to_string(), task))
}
