//! Prelude module for convenient imports
//!
//! ```rust
//! use gpt_agent_sdk::prelude::*;
//! ```

pub use crate::{
    query, query_with_transport, AgentError, AgentOptions, AssistantMessage, ContentBlock,
    ConversationClient, ErrorMessage, Message, MessageStream, MockReply, MockTransport,
    OpenAITransport, RawEvent, ResponseFormat, ResultMessage, Role, SystemMessage, SystemPrompt,
    Transport, TransportRequest, Turn, Usage,
};
