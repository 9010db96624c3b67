use crate::config::AgentOptions;
use crate::error::Result;
use crate::openai::OpenAITransport;
use crate::streaming::{decode_stream, MessageDecoder, MessageStream};
use crate::traits::{Transport, TransportRequest};
use crate::types::Turn;
use std::sync::Arc;

/// One-shot streamed exchange against the OpenAI backend.
///
/// The prompt is sent as the only user turn. Nothing is retried; transport
/// failures surface as the matching [`AgentError`](crate::AgentError) kind,
/// either from this call or as the last item of the stream.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use gpt_agent_sdk::{query, AgentOptions, Message};
///
/// # async fn run() -> gpt_agent_sdk::Result<()> {
/// let options = AgentOptions::new().with_model("gpt-5-codex");
/// let mut stream = query("Say hello", options).await?;
///
/// while let Some(message) = stream.next().await {
///     if let Message::Assistant(reply) = message? {
///         println!("{}", reply.text());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn query(prompt: impl Into<String>, options: AgentOptions) -> Result<MessageStream> {
    let options = Arc::new(options);
    let mut transport = OpenAITransport::new(options.clone());
    transport.connect().await?;

    // The HTTP client is cloned into the body stream, so the transport
    // itself can go once the request is out.
    query_with_transport(prompt, options, &transport).await
}

/// Same as [`query`] with an injected transport.
pub async fn query_with_transport(
    prompt: impl Into<String>,
    options: Arc<AgentOptions>,
    transport: &dyn Transport,
) -> Result<MessageStream> {
    let request = TransportRequest::new(options, vec![Turn::user(prompt)]);
    let decoder = MessageDecoder::for_request(&request);

    tracing::debug!(model = request.model(), "Starting one-shot query");
    let raw = transport.send(request).await?;

    Ok(decode_stream(raw, decoder))
}
