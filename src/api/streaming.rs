//! Streaming Support
//!
//! Decodes the prediction endpoint's line-oriented event stream. The
//! endpoint frames events either as Server-Sent Events (`data:{...}`) or as
//! bare newline-delimited JSON; both carry `{"event": ..., "data": ...}`.

use crate::error::{GateError, Result};
use bytes::Bytes;
use futures::{ready, Stream, StreamExt};
use pin_project_lite::pin_project;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Event kind carrying generated text
pub const EVENT_TOKEN: &str = "token";

/// Event kind marking the end of generation
pub const EVENT_END: &str = "end";

/// One decoded event from the prediction stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Event kind ("start", "token", "metadata", "end", ...)
    pub event: String,

    /// Payload; a string for tokens, arbitrary JSON for other kinds
    pub data: Value,
}

impl StreamEvent {
    pub fn is_token(&self) -> bool {
        self.event == EVENT_TOKEN
    }

    pub fn is_end(&self) -> bool {
        self.event == EVENT_END
    }

    /// Display text of a token event; `None` for other kinds and empty tokens
    pub fn token_text(&self) -> Option<String> {
        if !self.is_token() {
            return None;
        }

        match &self.data {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Typed events, in arrival order; ends after the first error
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Longest line accepted before the stream is declared malformed
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles lines from arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of the current, not yet terminated line; never contains `\n`
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed.
    ///
    /// Decoding happens per complete line, so a multi-byte character split
    /// across chunks is fine. Only the new bytes are scanned, and consumed
    /// lines are drained once per call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        let mut scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buf[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + offset;
            lines.push(decode_line(&self.buf[line_start..end])?);
            line_start = end + 1;
            scan_from = line_start;
        }
        self.buf.drain(..line_start);

        if self.buf.len() > MAX_LINE_BYTES {
            return Err(GateError::MalformedResponse(format!(
                "stream line exceeds {} bytes without a newline",
                MAX_LINE_BYTES
            )));
        }

        Ok(lines)
    }

    /// Flush a final line that had no trailing newline
    pub fn finish(&mut self) -> Result<Vec<String>> {
        if self.buf.is_empty() {
            return Ok(Vec::new());
        }

        let raw = std::mem::take(&mut self.buf);
        Ok(vec![decode_line(&raw)?])
    }
}

fn decode_line(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .map_err(|e| GateError::MalformedResponse(format!("stream line is not UTF-8: {}", e)))
}

/// SSE field lines that carry no payload for us
fn is_sse_field(line: &str) -> bool {
    ["event:", "message:", "id:", "retry:"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Parse one stream line into an event.
///
/// Returns `Ok(None)` for lines that carry no event (blank lines, comments,
/// SSE bookkeeping fields, `[DONE]`).
pub fn parse_event_line(line: &str) -> Result<Option<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let payload = if let Some(data) = line.strip_prefix("data:") {
        data.trim()
    } else if is_sse_field(line) {
        return Ok(None);
    } else {
        line
    };

    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(payload)?;
    let mut object = match value {
        Value::Object(map) => map,
        other => {
            return Err(GateError::MalformedResponse(format!(
                "expected a JSON object, got: {}",
                other
            )))
        }
    };

    let event = match object.remove("event") {
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(GateError::MalformedResponse(format!(
                "event kind must be a string, got: {}",
                other
            )))
        }
        None => return Err(GateError::MissingField("event".to_string())),
    };

    let data = match object.remove("data") {
        Some(data) => data,
        None if event == EVENT_TOKEN => return Err(GateError::MissingField("data".to_string())),
        None => Value::Null,
    };

    Ok(Some(StreamEvent { event, data }))
}

/// Decode a raw body stream into typed events.
///
/// The first transport or decoding error is yielded once and ends the
/// stream; events before it have already been delivered.
pub fn decode_events<S>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    use async_stream::stream;

    Box::pin(stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = LineDecoder::new();

        loop {
            let (lines, finished) = match bytes.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => (Err(e), true),
                None => (decoder.finish(), true),
            };

            let lines = match lines {
                Ok(lines) => lines,
                Err(e) => {
                    tracing::warn!(error = %e, "prediction stream failed");
                    yield Err(e);
                    return;
                }
            };

            for line in lines {
                match parse_event_line(&line) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable prediction event");
                        yield Err(e);
                        return;
                    }
                }
            }

            if finished {
                return;
            }
        }
    })
}

pin_project! {
    /// Display tokens extracted from an event stream.
    ///
    /// Yields the data of every non-empty `token` event in arrival order;
    /// other event kinds are consumed and dropped. After an error item the
    /// stream is finished.
    pub struct TokenStream<S> {
        #[pin]
        events: S,
        done: bool,
    }
}

impl<S> TokenStream<S> {
    pub fn new(events: S) -> Self {
        Self {
            events,
            done: false,
        }
    }
}

impl<S> Stream for TokenStream<S>
where
    S: Stream<Item = Result<StreamEvent>>,
{
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.events.as_mut().poll_next(cx)) {
                Some(Ok(event)) => {
                    if let Some(token) = event.token_text() {
                        return Poll::Ready(Some(Ok(token)));
                    }
                    tracing::debug!(event = %event.event, "skipping non-token event");
                }
                Some(Err(e)) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(chunks: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    #[test]
    fn test_parse_sse_data_line() {
        let event = parse_event_line(r#"data:{"event":"token","data":"Hello"}"#)
            .unwrap()
            .unwrap();
        assert!(event.is_token());
        assert_eq!(event.token_text(), Some("Hello".to_string()));

        let event = parse_event_line(r#"data: {"event":"end","data":"[DONE]"}"#)
            .unwrap()
            .unwrap();
        assert!(event.is_end());
        assert_eq!(event.token_text(), None);
    }

    #[test]
    fn test_parse_bare_ndjson_line() {
        let event = parse_event_line(r#"{"event":"token","data":" world"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.token_text(), Some(" world".to_string()));
    }

    #[test]
    fn test_parse_skips_non_payload_lines() {
        for line in ["", "   ", ": keep-alive", "message:", "event: token", "id: 7", "data: [DONE]"] {
            assert!(parse_event_line(line).unwrap().is_none(), "line {:?}", line);
        }
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_event_line("data: {not json").unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse(_)));

        let err = parse_event_line(r#"{"data":"x"}"#).unwrap_err();
        assert!(matches!(err, GateError::MissingField(ref key) if key == "event"));

        let err = parse_event_line(r#"{"event":"token"}"#).unwrap_err();
        assert!(matches!(err, GateError::MissingField(ref key) if key == "data"));

        let err = parse_event_line("[1, 2]").unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_token_events_may_omit_data() {
        let event = parse_event_line(r#"{"event":"start"}"#).unwrap().unwrap();
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn test_token_text_rules() {
        let empty = StreamEvent {
            event: EVENT_TOKEN.to_string(),
            data: Value::String(String::new()),
        };
        assert_eq!(empty.token_text(), None);

        let structured = StreamEvent {
            event: EVENT_TOKEN.to_string(),
            data: serde_json::json!(7),
        };
        assert_eq!(structured.token_text(), Some("7".to_string()));

        let metadata = StreamEvent {
            event: "metadata".to_string(),
            data: Value::String("chatId".to_string()),
        };
        assert_eq!(metadata.token_text(), None);
    }

    #[test]
    fn test_line_decoder_reassembles_split_lines() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"ev").unwrap().is_empty());
        let lines = decoder.push(b"ent\":1}\r\nsecond\nthi").unwrap();
        assert_eq!(lines, vec!["data: {\"event\":1}", "second"]);
        assert_eq!(decoder.finish().unwrap(), vec!["thi"]);
        assert!(decoder.finish().unwrap().is_empty());
    }

    #[test]
    fn test_line_decoder_split_multibyte_char() {
        let text = "héllo\n".as_bytes();
        // 'é' is two bytes; split between them
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..2]).unwrap().is_empty());
        assert_eq!(decoder.push(&text[2..]).unwrap(), vec!["héllo"]);
    }

    #[test]
    fn test_line_decoder_many_lines_in_one_chunk() {
        let mut chunk = Vec::new();
        for i in 0..1000 {
            chunk.extend_from_slice(format!("line {}\n", i).as_bytes());
        }
        chunk.extend_from_slice(b"tail");

        let mut decoder = LineDecoder::new();
        let lines = decoder.push(&chunk).unwrap();
        assert_eq!(lines.len(), 1000);
        assert_eq!(lines[0], "line 0");
        assert_eq!(lines[999], "line 999");
        assert_eq!(decoder.finish().unwrap(), vec!["tail"]);
    }

    #[test]
    fn test_line_decoder_rejects_unterminated_oversized_line() {
        let mut decoder = LineDecoder::new();
        let block = vec![b'x'; MAX_LINE_BYTES / 2];
        assert!(decoder.push(&block).unwrap().is_empty());
        assert!(decoder.push(&block).unwrap().is_empty());

        let err = decoder.push(b"x").unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse(_)));
    }

    #[test]
    fn test_line_decoder_invalid_utf8() {
        let mut decoder = LineDecoder::new();
        let err = decoder.push(b"\xff\xfe\n").unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_token_stream_filters_and_orders() {
        let events = decode_events(body(vec![
            b"{\"event\":\"start\",\"data\":\"\"}\n{\"event\":\"tok",
            b"en\",\"data\":\"Hel\"}\n{\"event\":\"token\",\"data\":\"\"}\n",
            b"{\"event\":\"metadata\",\"data\":{\"chatId\":\"c1\"}}\n",
            b"{\"event\":\"token\",\"data\":\"lo\"}\n{\"event\":\"end\",\"data\":\"\"}",
        ]));

        let tokens: Vec<String> = TokenStream::new(events)
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_earlier_tokens() {
        let events = decode_events(body(vec![
            b"{\"event\":\"token\",\"data\":\"partial\"}\n",
            b"this is not json\n",
            b"{\"event\":\"token\",\"data\":\"never\"}\n",
        ]));

        let items: Vec<Result<String>> = TokenStream::new(events).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(GateError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"event\":\"token\",\"data\":\"a\"}\n")),
            Err(GateError::Network("connection reset".to_string())),
            Ok(Bytes::from_static(b"{\"event\":\"token\",\"data\":\"b\"}\n")),
        ];

        let items: Vec<Result<String>> =
            TokenStream::new(decode_events(stream::iter(chunks))).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(GateError::Network(_))));
    }

    #[test]
    fn test_early_abandonment() {
        tokio_test::block_on(async {
            let events = decode_events(body(vec![
                b"{\"event\":\"token\",\"data\":\"one\"}\n",
                b"{\"event\":\"token\",\"data\":\"two\"}\n",
            ]));
            let mut tokens = TokenStream::new(events);

            assert_eq!(tokens.next().await.unwrap().unwrap(), "one");
            drop(tokens);
        });
    }
}
