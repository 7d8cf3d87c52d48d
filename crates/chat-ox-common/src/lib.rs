#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared HTTP and streaming plumbing for OpenAI-compatible chat clients
//!
//! This crate owns the parts of a chat-completions client that deal with the wire:
//! building the authenticated request, decoding the `data: {...}` event stream across
//! arbitrary chunk boundaries, and surfacing text deltas as a pull-based stream.

pub mod error;
pub mod openai_format;
pub mod request_builder;
pub mod streaming;

pub use error::CommonRequestError;
pub use openai_format::*;
pub use request_builder::{RequestBuilder, RequestConfig};
pub use streaming::{DeltaDecoder, SseParser, Utf8Decoder};

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
