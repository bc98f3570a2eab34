//! Plugins shipped with waypoint.

mod credentials;
mod error;
mod host_matcher;
mod telemetry;

pub use credentials::{
    Credential, CredentialStore, CredentialsPlugin, FieldClass, PASSWORD_PLACEHOLDER,
    USERNAME_PLACEHOLDER, is_login_form,
};
pub use error::{Error, Result};
pub use host_matcher::HostPattern;
pub use telemetry::{TelemetryPlugin, TelemetrySummary};
