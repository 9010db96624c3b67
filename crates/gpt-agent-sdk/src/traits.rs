use crate::config::AgentOptions;
use crate::error::Result;
use crate::openai::RawEvent;
use crate::types::{Role, Turn};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Provider-native events as they arrive; finite and not restartable
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// Backend capable of turning a materialized request into a raw event stream.
///
/// Shipped implementations are [`OpenAITransport`](crate::OpenAITransport)
/// and [`MockTransport`](crate::MockTransport). Both emit the same
/// [`RawEvent`] shape so decoding is transport-agnostic.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire whatever the transport needs before the first send
    /// (e.g. resolve credentials).
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, request: TransportRequest) -> Result<RawEventStream>;

    /// Orderly shutdown at the end of a conversation. Defaults to
    /// [`release`](Self::release).
    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }

    /// Drop held resources without awaiting anything.
    ///
    /// Runs from `close` and from `Drop` of a conversation that was never
    /// closed, so it must be cheap and must not block.
    fn release(&mut self) {}
}

/// Fully materialized request: full ordered history (the new user turn last)
/// plus the configuration it is sent under.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub turns: Vec<Turn>,
    pub options: Arc<AgentOptions>,
}

impl TransportRequest {
    pub fn new(options: Arc<AgentOptions>, turns: Vec<Turn>) -> Self {
        Self { turns, options }
    }

    pub fn model(&self) -> &str {
        self.options.model()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.options.system_prompt_text()
    }

    /// Text of the newest user turn
    pub fn prompt(&self) -> Option<String> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(Turn::text)
    }

    pub fn user_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }
}
