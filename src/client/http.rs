//! HTTP Client
//!
//! Thin wrapper over reqwest with explicit timeouts and uniform status
//! handling for the webhook and the prediction endpoint.

use crate::config::TimeoutConfig;
use crate::error::{GateError, Result};
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;

/// Raw response body, chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// HTTP client shared by the authorization gate and the prediction client
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client (cheap to clone, shares the pool)
    client: Client,

    /// Configured timeouts
    timeouts: TimeoutConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| GateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeouts: timeouts.clone(),
        })
    }

    /// Configured timeouts
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// POST a JSON body and decode a JSON response.
    ///
    /// The status is checked before the body is looked at, so a 401 is
    /// reported as such whatever the server put in the body.
    pub async fn post_json<T, R>(&self, url: &str, body: &T, timeout: Duration) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let response = check_status(response)?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(url, error = %e, "response body is not the expected JSON");
            GateError::MalformedResponse(e.to_string())
        })
    }

    /// POST a JSON body and return the response body as a byte stream.
    ///
    /// Dropping the returned stream drops the response and releases the
    /// connection.
    pub async fn post_stream(
        &self,
        url: &str,
        body: &impl Serialize,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<ByteStream> {
        use async_stream::stream;
        use futures::StreamExt;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/event-stream, application/x-ndjson, */*"),
        );
        if let Some(token) = bearer {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| GateError::Config(format!("Invalid API key format: {}", e)))?,
            );
        }

        let response = self
            .client
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let response = check_status(response)?;

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(GateError::from);
            }
        };

        Ok(Box::pin(s))
    }
}

/// Turn a non-2xx response into the matching error
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!(url = %response.url(), %status, "response received");

    match response.error_for_status_ref() {
        Ok(_) => Ok(response),
        Err(e) => Err(GateError::from_status(status, e.to_string())),
    }
}
