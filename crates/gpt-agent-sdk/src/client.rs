use crate::config::AgentOptions;
use crate::error::{AgentError, Result};
use crate::history::History;
use crate::openai::OpenAITransport;
use crate::streaming::{decode_stream, MessageDecoder};
use crate::traits::{RawEventStream, Transport, TransportRequest};
use crate::types::{ContentBlock, Message, Turn};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Decoded response stream borrowing its client
pub type ResponseStream<'a> = Pin<Box<dyn Stream<Item = Result<Message>> + Send + 'a>>;

struct PendingResponse {
    raw: RawEventStream,
    decoder: MessageDecoder,
}

/// Stateful multi-turn session.
///
/// Every `query` replays the full history (plus the new user turn) through
/// the transport, since the backend keeps no state between calls. History
/// only records completed responses: the assistant turn is appended when the
/// result message passes through [`receive_response`](Self::receive_response).
///
/// ```no_run
/// use futures::StreamExt;
/// use gpt_agent_sdk::{AgentOptions, ConversationClient, Message};
///
/// # async fn run() -> gpt_agent_sdk::Result<()> {
/// let mut client = ConversationClient::open(AgentOptions::new()).await?;
///
/// client.query("Name a prime number").await?;
/// let mut response = client.receive_response()?;
/// while let Some(message) = response.next().await {
///     if let Message::Assistant(reply) = message? {
///         println!("{}", reply.text());
///     }
/// }
/// drop(response);
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConversationClient {
    options: Arc<AgentOptions>,
    transport: Box<dyn Transport>,
    history: History,
    pending: Option<PendingResponse>,
    closed: bool,
}

impl ConversationClient {
    /// Open a session on the OpenAI backend. Fails with an authentication
    /// error when no credential resolves.
    pub async fn open(options: AgentOptions) -> Result<Self> {
        let options = Arc::new(options);
        let transport = OpenAITransport::new(options.clone());
        Self::connect(options, Box::new(transport)).await
    }

    pub async fn open_with_transport<T>(options: AgentOptions, transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::connect(Arc::new(options), Box::new(transport)).await
    }

    async fn connect(options: Arc<AgentOptions>, mut transport: Box<dyn Transport>) -> Result<Self> {
        transport.connect().await?;
        tracing::info!(model = options.model(), "Conversation opened");

        Ok(Self {
            options,
            transport,
            history: History::new(),
            pending: None,
            closed: false,
        })
    }

    /// Send `prompt` with the full history. The user turn is recorded only
    /// once the transport has accepted the request.
    pub async fn query(&mut self, prompt: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(AgentError::State(
                "the previous response has not been received yet".to_string(),
            ));
        }

        let turn = Turn::user(prompt);
        let request = TransportRequest::new(self.options.clone(), self.history.with_next(turn.clone()));
        let decoder = MessageDecoder::for_request(&request);

        tracing::debug!(turns = request.turns.len(), "Replaying conversation history");
        let raw = self.transport.send(request).await?;

        self.history.push(turn);
        self.pending = Some(PendingResponse { raw, decoder });
        Ok(())
    }

    /// Decoded messages for the most recent `query`.
    ///
    /// Dropping the stream early abandons the response: the connection is
    /// released and no assistant turn is recorded.
    pub fn receive_response(&mut self) -> Result<ResponseStream<'_>> {
        self.ensure_open()?;
        let pending = self
            .pending
            .take()
            .ok_or_else(|| AgentError::State("no query is awaiting a response".to_string()))?;
        let history = &mut self.history;

        Ok(Box::pin(async_stream::stream! {
            let mut messages = decode_stream(pending.raw, pending.decoder);
            let mut content: Vec<ContentBlock> = Vec::new();

            while let Some(item) = messages.next().await {
                match &item {
                    Ok(Message::Assistant(reply)) => content.extend(reply.content.iter().cloned()),
                    Ok(Message::Result(_)) => {
                        history.push(Turn::assistant(std::mem::take(&mut content)));
                    }
                    _ => {}
                }
                yield item;
            }
        }))
    }

    /// Release the transport. Any unreceived response is discarded.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(AgentError::State("conversation is already closed".to_string()));
        }
        self.closed = true;
        self.pending = None;
        self.transport.close().await?;

        tracing::info!(turns = self.history.len(), "Conversation closed");
        Ok(())
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn has_pending_response(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(AgentError::State("conversation is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Drop for ConversationClient {
    fn drop(&mut self) {
        if !self.closed {
            self.pending = None;
            self.transport.release();
            tracing::debug!(
                turns = self.history.len(),
                "Conversation dropped without close; transport released"
            );
        }
    }
}
