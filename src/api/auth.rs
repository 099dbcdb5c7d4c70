//! Authorization Gate
//!
//! One POST to the access-control webhook decides whether a chat turn may
//! reach the chatflow at all.

use crate::client::HttpClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Status value the webhook uses to grant access
pub const STATUS_SUCCESS: &str = "success";

const DEFAULT_STATUS: &str = "unknown";
const DEFAULT_MESSAGE: &str = "No message provided";

/// User credentials, supplied by the caller for every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub api_key: String,
}

impl Credential {
    pub fn new(user_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Outcome of one webhook call.
///
/// Each field keeps the JSON value the webhook sent; only an absent key
/// falls back to a default. A key present with `null` stays null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    #[serde(default = "default_status")]
    pub status: Value,

    #[serde(default = "default_message")]
    pub message: Value,

    #[serde(default)]
    pub new_balance: Value,
}

fn default_status() -> Value {
    Value::String(DEFAULT_STATUS.to_string())
}

fn default_message() -> Value {
    Value::String(DEFAULT_MESSAGE.to_string())
}

/// Strings verbatim, null as `None`, anything else as its JSON text
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

impl AuthorizationResult {
    /// Whether the chat turn may continue to the chatflow
    pub fn is_success(&self) -> bool {
        self.status.as_str() == Some(STATUS_SUCCESS)
    }

    /// The first line shown to the user for every turn
    pub fn status_line(&self) -> String {
        format!(
            "Webhook status: {}, Message: {}, New Balance: {}\n\n\n",
            render(&self.status),
            render(&self.message),
            render(&self.new_balance)
        )
    }
}

/// Client for the authorization webhook
#[derive(Debug, Clone)]
pub struct AuthGate {
    http: HttpClient,
    url: String,
}

impl AuthGate {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Webhook URL this gate calls
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the webhook whether `credential` may proceed.
    ///
    /// A denial is not an error: it comes back as a result whose status is
    /// not `"success"`. Errors are reserved for transport, HTTP status and
    /// body decoding failures.
    pub async fn authorize(&self, credential: &Credential) -> Result<AuthorizationResult> {
        tracing::debug!(user_id = %credential.user_id, url = %self.url, "authorizing");

        let timeout = self.http.timeouts().webhook();
        let result: AuthorizationResult = self.http.post_json(&self.url, credential, timeout).await?;

        tracing::info!(status = %render(&result.status), "webhook answered");
        Ok(result)
    }
}
