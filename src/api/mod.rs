//! API Module
//!
//! Webhook authorization, chatflow prediction requests and stream decoding.

pub mod auth;
pub mod prediction;
pub mod streaming;

pub use auth::{AuthGate, AuthorizationResult, Credential};
pub use prediction::{OverrideConfig, PredictionClient, PredictionRequest};
pub use streaming::{
    decode_events, parse_event_line, EventStream, LineDecoder, StreamEvent, TokenStream,
};
