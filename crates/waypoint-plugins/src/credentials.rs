use crate::{Error, HostPattern, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;
use url::Url;
use waypoint_core::{
    Action, ElementKind, HookContext, Plugin, PluginPayload, PluginResult, Snapshot,
};

/// Stands in for the password in everything the model sees.
pub const PASSWORD_PLACEHOLDER: &str = "{{password}}";
pub const USERNAME_PLACEHOLDER: &str = "{{username}}";

lazy_static! {
    static ref PASSWORD_FIELD: Regex =
        Regex::new(r"(?i)\b(pass(word|code|phrase)?|pwd)\b").unwrap();
    static ref USERNAME_FIELD: Regex =
        Regex::new(r"(?i)\b(user(\s*name|\s*id)?|e-?mail|login(\s*(name|id))?)\b").unwrap();
}

/// What a form field asks for, judged from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Username,
    Password,
    Other,
}

impl FieldClass {
    pub fn of(description: &str) -> Self {
        if PASSWORD_FIELD.is_match(description) {
            FieldClass::Password
        } else if USERNAME_FIELD.is_match(description) {
            FieldClass::Username
        } else {
            FieldClass::Other
        }
    }
}

/// A page offering both a username field and a password field.
pub fn is_login_form(snapshot: &Snapshot) -> bool {
    let classes: Vec<FieldClass> = snapshot
        .iter()
        .filter(|e| e.kind == ElementKind::Input)
        .map(|e| FieldClass::of(&e.description))
        .collect();
    classes.contains(&FieldClass::Username) && classes.contains(&FieldClass::Password)
}

#[derive(Clone, Deserialize)]
pub struct Credential {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials keyed by host pattern; the first matching entry wins.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: Vec<(HostPattern, Credential)>,
}

impl CredentialStore {
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        let entries = credentials
            .into_iter()
            .map(|c| Ok((HostPattern::parse(&c.host)?, c)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Load a JSON array of `{host, username, password}` objects.
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading credentials from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let credentials: Vec<Credential> =
            serde_json::from_str(&content).map_err(|e| Error::Credentials {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::new(credentials)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The credential for a page URL, by its host.
    pub fn lookup(&self, page_url: &str) -> Option<&Credential> {
        let url = Url::parse(page_url).ok()?;
        let host = url.host_str()?;
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(host))
            .map(|(_, credential)| credential)
    }
}

/// Fills login forms from a local credential store without exposing the
/// password to the model.
pub struct CredentialsPlugin {
    store: CredentialStore,
}

impl CredentialsPlugin {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Plugin for CredentialsPlugin {
    fn name(&self) -> &str {
        "credentials"
    }

    async fn initialize(&self) -> PluginResult<()> {
        tracing::info!("Credentials plugin loaded {} entries", self.store.len());
        Ok(())
    }

    async fn pre_decision(&self, ctx: &HookContext<'_>) -> PluginResult<PluginPayload> {
        let mut payload = PluginPayload::new();
        if !is_login_form(ctx.snapshot) {
            return Ok(payload);
        }
        let Some(credential) = self.store.lookup(ctx.url) else {
            tracing::debug!("Login form on {} but no stored credentials", ctx.url);
            return Ok(payload);
        };

        tracing::info!("Login form detected, offering stored credentials for {}", credential.username);
        payload.insert("login_username".to_string(), json!(credential.username));
        payload.insert("login_password".to_string(), json!(PASSWORD_PLACEHOLDER));
        Ok(payload)
    }

    async fn pre_action(&self, action: Action, ctx: &HookContext<'_>) -> PluginResult<Action> {
        let Some(element) = action.element().and_then(|id| ctx.snapshot.get(id)) else {
            return Ok(action);
        };
        if !matches!(action, Action::Input { .. } | Action::InputAndSubmit { .. }) {
            return Ok(action);
        }
        let Some(credential) = self.store.lookup(ctx.url) else {
            return Ok(action);
        };

        let (placeholder, secret) = match FieldClass::of(&element.description) {
            FieldClass::Password => (PASSWORD_PLACEHOLDER, credential.password.as_str()),
            FieldClass::Username => (USERNAME_PLACEHOLDER, credential.username.as_str()),
            FieldClass::Other => return Ok(action),
        };
        let filled = action
            .text()
            .filter(|text| text.contains(placeholder))
            .map(|text| text.replace(placeholder, secret));
        let rewritten = match filled {
            Some(text) => {
                tracing::debug!("Filling stored credential into element {}", element.id);
                with_text(action, text)
            }
            None => action,
        };
        Ok(rewritten)
    }
}

fn with_text(action: Action, text: String) -> Action {
    match action {
        Action::Input { element, .. } => Action::Input { element, text },
        Action::InputAndSubmit { element, .. } => Action::InputAndSubmit { element, text },
        other => other,
    }
}
