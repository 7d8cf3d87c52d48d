//! Zhipu AI (GLM) streaming chat client for Rust
//!
//! This crate sends a conversation to an OpenAI-compatible chat-completions endpoint
//! and hands the reply back as a stream of text fragments, with:
//! - layered configuration (explicit values, environment, stored settings, defaults)
//! - a chunk-boundary-safe event stream decoder
//! - conversation sessions that keep partial replies when a stream fails
//!
//! # Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use zhipu_ox::{Message, Zhipu};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Zhipu::new("your-api-key");
//!
//!     let mut stream = client.stream(&[Message::user("Hello, world!")]);
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod request;
pub mod session;

// Re-export main types
pub use client::Zhipu;
pub use config::{
    ConfigOverrides, ConfigResolver, ConfigSource, EnvSource, LayeredConfig, MemoryStore,
    ResolvedConfig, SettingsStore, StoreSource,
};
pub use error::ZhipuRequestError;
pub use message::{Message, Role};
pub use model::Model;
pub use request::ChatRequest;
pub use session::{ChatSession, PendingReply};
