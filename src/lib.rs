//! Gatechat - webhook-gated chatflow client
//!
//! Checks a user's credentials against an authorization webhook, then
//! forwards the message to a Flowise chatflow and streams the generated
//! tokens back as they arrive.

use futures::StreamExt;
use std::ops::ControlFlow;

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;

use api::{AuthGate, PredictionClient};
use chat::{ChatContext, ChatMessage, ResponseStream, Transcript};
use client::HttpClient;
use config::{ConfigLoader, Settings};
use error::Result;

/// The main chat client
#[derive(Debug, Clone)]
pub struct ChatClient {
    /// Authorization webhook
    gate: AuthGate,

    /// Chatflow prediction endpoint
    prediction: PredictionClient,

    /// Chatflow identifier sent with every request
    flow_id: String,
}

impl ChatClient {
    /// Create a client with a custom config path
    pub fn with_config_path(path: &str) -> Result<Self> {
        let loader = ConfigLoader::from_path(path)?;
        Self::from_settings(loader.settings())
    }

    /// Create a client from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let http = HttpClient::new(&settings.timeouts)?;

        Ok(Self {
            gate: AuthGate::new(http.clone(), settings.webhook_url.clone()),
            prediction: PredictionClient::new(
                http,
                settings.prediction_url(),
                settings.flowise_api_key.clone(),
            ),
            flow_id: settings.flow_id.clone(),
        })
    }

    /// The prediction client, for callers that want raw events
    pub fn prediction(&self) -> &PredictionClient {
        &self.prediction
    }

    /// Display strings for one user message.
    ///
    /// The first item is the webhook status line (or an error message);
    /// generated tokens follow only if the webhook granted access. Failures
    /// end the stream with one descriptive message.
    pub fn respond(&self, context: &ChatContext, prompt: &str) -> ResponseStream {
        chat::generate_response(
            self.gate.clone(),
            self.prediction.clone(),
            self.flow_id.clone(),
            context.clone(),
            prompt.to_string(),
        )
    }

    /// Run one full turn against a caller-owned transcript.
    ///
    /// Records the prompt, forwards every chunk to `on_chunk` as it
    /// arrives, records the concatenated reply and hands the transcript
    /// back. When `on_chunk` breaks, the response stream is dropped (closing
    /// the connection) and the reply recorded so far is kept.
    pub async fn chat_turn<F>(
        &self,
        mut transcript: Transcript,
        context: &ChatContext,
        prompt: &str,
        mut on_chunk: F,
    ) -> Transcript
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        transcript.push(ChatMessage::user(prompt));

        let mut reply = String::new();
        let mut chunks = self.respond(context, prompt);
        while let Some(chunk) = chunks.next().await {
            reply.push_str(&chunk);
            if on_chunk(&chunk).is_break() {
                tracing::debug!("chunk consumer stopped, abandoning response");
                break;
            }
        }

        transcript.push(ChatMessage::assistant(reply));
        transcript
    }
}
