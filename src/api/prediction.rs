//! Chatflow Prediction API
//!
//! Request types and the client for the streaming prediction endpoint.

use crate::api::auth::Credential;
use crate::api::streaming::{decode_events, EventStream, TokenStream};
use crate::client::HttpClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Per-request configuration overrides forwarded to the chatflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideConfig {
    /// Session identifier correlating turns of one conversation
    #[serde(rename = "sessionId")]
    pub session_id: String,

    pub user_id: String,

    pub api_key: String,
}

/// Streaming prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Chatflow / agentflow identifier
    #[serde(rename = "chatflowId")]
    pub chatflow_id: String,

    /// The user's message
    pub question: String,

    #[serde(rename = "overrideConfig")]
    pub override_config: OverrideConfig,

    /// Always true; the adapter only speaks the streaming protocol
    pub streaming: bool,
}

impl PredictionRequest {
    /// Create a streaming request for one user message
    pub fn new(
        flow_id: impl Into<String>,
        prompt: impl Into<String>,
        session_id: impl Into<String>,
        credential: &Credential,
    ) -> Self {
        Self {
            chatflow_id: flow_id.into(),
            question: prompt.into(),
            override_config: OverrideConfig {
                session_id: session_id.into(),
                user_id: credential.user_id.clone(),
                api_key: credential.api_key.clone(),
            },
            streaming: true,
        }
    }
}

/// Client for one chatflow's prediction endpoint
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: HttpClient,
    url: String,
    bearer: Option<String>,
}

impl PredictionClient {
    /// `url` is the full prediction URL, `bearer` the Flowise instance key
    pub fn new(http: HttpClient, url: impl Into<String>, bearer: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            bearer,
        }
    }

    /// Prediction URL this client posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a prediction stream and decode every event.
    ///
    /// Each call opens a new remote stream; the returned stream is not
    /// restartable.
    pub async fn stream_events(&self, request: &PredictionRequest) -> Result<EventStream> {
        tracing::info!(
            url = %self.url,
            session_id = %request.override_config.session_id,
            "opening prediction stream"
        );

        let timeout = self.http.timeouts().prediction();
        let bytes = self
            .http
            .post_stream(&self.url, request, self.bearer.as_deref(), timeout)
            .await?;

        Ok(decode_events(bytes))
    }

    /// Open a prediction stream and keep only display tokens
    pub async fn stream_tokens(&self, request: &PredictionRequest) -> Result<TokenStream<EventStream>> {
        Ok(TokenStream::new(self.stream_events(request).await?))
    }
}
