//! # GPT Agent SDK
//!
//! Streamed conversations with OpenAI GPT models over the Responses API.
//!
//! ## Overview
//!
//! - **One-shot queries**: [`query`] sends a single prompt and yields decoded
//!   messages as they stream in
//! - **Multi-turn sessions**: [`ConversationClient`] keeps the turn history and
//!   replays it on every request
//! - **Swappable transport**: the [`Transport`] trait is implemented by
//!   [`OpenAITransport`] (HTTP + SSE) and [`MockTransport`] (scripted, offline)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use gpt_agent_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AgentError> {
//!     let options = AgentOptions::new()
//!         .with_model("gpt-5-codex")
//!         .with_temperature(0.4);
//!
//!     let mut stream = query("Write a haiku about Rust", options).await?;
//!     while let Some(message) = stream.next().await {
//!         match message? {
//!             Message::Assistant(reply) => println!("{}", reply.text()),
//!             Message::Result(result) => println!("[done in {} ms]", result.duration_ms),
//!             Message::Error(error) => eprintln!("error: {}", error.message),
//!             Message::System(_) => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Message flow
//!
//! Raw provider events ([`RawEvent`]) are decoded by a per-response state
//! machine ([`MessageDecoder`]) into zero or more [`Message::Assistant`]
//! followed by exactly one [`Message::Result`]. Malformed or unknown events
//! end the stream with a [`Message::Error`]; messages already yielded stay
//! valid.

pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod mock;
pub mod openai;
pub mod prelude;
pub mod query;
pub mod streaming;
pub mod traits;
pub mod types;

pub use client::{ConversationClient, ResponseStream};
pub use config::{AgentOptions, LegacyOptions, ResponseFormat, SystemPrompt};
pub use error::{AgentError, Result};
pub use history::History;
pub use mock::{MockReply, MockTransport};
pub use openai::{OpenAITransport, RawEvent};
pub use query::{query, query_with_transport};
pub use streaming::{decode_stream, DecoderState, MessageDecoder, MessageStream, StructuredBlock};
pub use traits::{RawEventStream, Transport, TransportRequest};
pub use types::{
    AssistantMessage, ContentBlock, ErrorMessage, Message, ResultMessage, Role, SystemMessage,
    Turn, Usage,
};
