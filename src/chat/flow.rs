//! Response Flow
//!
//! Authorize, then stream. Every failure along the way becomes one final
//! display string; nothing is returned to the caller as a structured error.

use crate::api::{AuthGate, Credential, PredictionClient, PredictionRequest};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Display strings for one chat turn, in order
pub type ResponseStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Who is asking, and in which conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    pub credential: Credential,
    pub session_id: String,
}

impl ChatContext {
    pub fn new(credential: Credential, session_id: impl Into<String>) -> Self {
        Self {
            credential,
            session_id: session_id.into(),
        }
    }
}

/// A session identifier derived from the current time
pub fn generate_session_id() -> String {
    format!("session-{}", Utc::now().format("%Y%m%d%H%M%S%3f"))
}

/// Build the response stream for one user message.
///
/// Nothing is sent until the stream is first polled. The first item is the
/// webhook status line, or the error that prevented getting one. Tokens
/// follow only when the webhook answered `"success"`; the prediction
/// endpoint is never contacted otherwise.
pub fn generate_response(
    gate: AuthGate,
    prediction: PredictionClient,
    flow_id: String,
    context: ChatContext,
    prompt: String,
) -> ResponseStream {
    use async_stream::stream;

    Box::pin(stream! {
        let authorization = match gate.authorize(&context.credential).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "authorization failed");
                yield e.to_string();
                return;
            }
        };

        yield authorization.status_line();

        if !authorization.is_success() {
            tracing::info!(status = %authorization.status, "access denied, not contacting chatflow");
            return;
        }

        let request = PredictionRequest::new(
            flow_id,
            prompt,
            context.session_id.clone(),
            &context.credential,
        );

        let mut tokens = match prediction.stream_tokens(&request).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "prediction request failed");
                yield e.to_string();
                return;
            }
        };

        let mut count = 0usize;
        while let Some(item) = tokens.next().await {
            match item {
                Ok(token) => {
                    count += 1;
                    yield token;
                }
                Err(e) => {
                    tracing::warn!(error = %e, tokens = count, "prediction stream aborted");
                    yield e.to_string();
                    return;
                }
            }
        }

        tracing::debug!(tokens = count, "prediction stream finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_id() {
        let id = generate_session_id();
        assert!(id.starts_with("session-"));
        assert_eq!(id.len(), "session-".len() + 17);
    }
}
