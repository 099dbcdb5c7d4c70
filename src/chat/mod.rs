//! Chat Module
//!
//! The authorize-then-stream flow and the caller-owned transcript.

pub mod flow;
pub mod transcript;

pub use flow::{generate_response, generate_session_id, ChatContext, ResponseStream};
pub use transcript::{ChatMessage, Role, Transcript};
