//! Client Module
//!
//! HTTP transport shared by the webhook and the prediction endpoint.

pub mod http;

pub use http::{ByteStream, HttpClient};
