//! Remote grid execution support.
//!
//! A remote run maps the requested browser/platform onto the grid's
//! capability vocabulary and hands the child process its grid credentials
//! through the environment only. The synthesized capability document written
//! to disk never contains credentials.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::result::{GrabarError, GrabarResult};

/// Environment variable holding the grid user name
pub const REMOTE_USER_VAR: &str = "GRABAR_REMOTE_USER";
/// Environment variable holding the grid access key
pub const REMOTE_KEY_VAR: &str = "GRABAR_REMOTE_KEY";

/// Browsers supported on the remote grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBrowser {
    /// Google Chrome
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl RemoteBrowser {
    /// Grid capability name for this browser
    #[must_use]
    pub const fn capability_name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "MicrosoftEdge",
            Self::Safari => "safari",
        }
    }
}

/// A remote execution target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Grid endpoint host
    pub host: String,
    /// Browser to request
    pub browser: RemoteBrowser,
    /// Platform string as the grid expects it (for example "Windows 11")
    pub platform: String,
    /// Browser version, latest when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
}

impl RemoteTarget {
    /// Create a target for a host/browser/platform triple
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        browser: RemoteBrowser,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            browser,
            platform: platform.into(),
            browser_version: None,
        }
    }

    /// Pin a browser version
    #[must_use]
    pub fn with_browser_version(mut self, version: impl Into<String>) -> Self {
        self.browser_version = Some(version.into());
        self
    }

    /// Capability document for the grid, credential-free by construction
    #[must_use]
    pub fn capabilities(&self, run_name: &str) -> serde_json::Value {
        json!({
            "browserName": self.browser.capability_name(),
            "browserVersion": self.browser_version.as_deref().unwrap_or("latest"),
            "platformName": self.platform,
            "name": run_name,
        })
    }
}

/// Grid credentials, only ever sourced from the environment
#[derive(Clone)]
pub struct RemoteCredentials {
    user: String,
    key: String,
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("user", &self.user)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl RemoteCredentials {
    /// Read credentials from the process environment
    pub fn from_env() -> GrabarResult<Self> {
        let user = read_var(REMOTE_USER_VAR)?;
        let key = read_var(REMOTE_KEY_VAR)?;
        Ok(Self { user, key })
    }

    /// Environment entries to inject into the child process
    #[must_use]
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            (REMOTE_USER_VAR.to_string(), self.user.clone()),
            (REMOTE_KEY_VAR.to_string(), self.key.clone()),
        ]
    }
}

fn read_var(variable: &str) -> GrabarResult<String> {
    match std::env::var(variable) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GrabarError::MissingCredentials {
            variable: variable.to_string(),
        }),
    }
}
