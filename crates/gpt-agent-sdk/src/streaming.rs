use crate::error::Result;
use crate::openai::{OutputItem, RawEvent, ResponseSnapshot};
use crate::traits::{RawEventStream, TransportRequest};
use crate::types::{
    AssistantMessage, ContentBlock, ErrorMessage, Message, ResultMessage, SystemMessage, Usage,
};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Instant;

/// Lazy, finite sequence of decoded messages for one response
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderState {
    AwaitingBlock,
    InTextBlock { text: String },
    InStructuredBlock(StructuredBlock),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructuredBlock {
    ToolUse {
        call_id: String,
        name: String,
        arguments: String,
    },
    Thinking {
        thinking: String,
        signature: Option<String>,
    },
}

/// Per-response state machine turning raw provider events into messages.
///
/// Deltas accumulate into the open block; a boundary event closes it and
/// appends it to the pending assistant content. A terminal event flushes the
/// assistant message (when it has content) followed by exactly one result.
/// Unknown or malformed input ends decoding with an error message.
pub struct MessageDecoder {
    state: DecoderState,
    content: Vec<ContentBlock>,
    model: String,
    response_id: Option<String>,
    num_turns: u32,
    started_at: Instant,
}

impl MessageDecoder {
    pub fn new(model: impl Into<String>, num_turns: u32) -> Self {
        Self {
            state: DecoderState::AwaitingBlock,
            content: Vec::new(),
            model: model.into(),
            response_id: None,
            num_turns,
            started_at: Instant::now(),
        }
    }

    pub fn for_request(request: &TransportRequest) -> Self {
        Self::new(request.model(), request.user_turns() as u32)
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == DecoderState::Done
    }

    /// Consume one raw event. Events arriving after the terminal one are
    /// ignored.
    pub fn feed(&mut self, event: RawEvent) -> Vec<Message> {
        if self.is_done() {
            return Vec::new();
        }

        match self.step(event) {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(
                    code = error.code.as_deref().unwrap_or("unknown"),
                    "Response decoding stopped: {}",
                    error.message
                );
                self.state = DecoderState::Done;
                vec![Message::Error(error)]
            }
        }
    }

    /// Called when the raw stream ends. Yields an error when no terminal
    /// event was seen.
    pub fn finish(&mut self) -> Option<Message> {
        if self.is_done() {
            return None;
        }
        self.state = DecoderState::Done;
        Some(Message::Error(ErrorMessage::new(
            "incomplete_stream",
            "event stream ended before the response completed",
        )))
    }

    fn step(&mut self, event: RawEvent) -> std::result::Result<Vec<Message>, ErrorMessage> {
        match event {
            RawEvent::Created { response } => {
                self.observe(&response);
                Ok(vec![Message::System(SystemMessage {
                    subtype: "init".to_string(),
                    data: serde_json::json!({
                        "response_id": self.response_id,
                        "model": self.model,
                    }),
                })])
            }
            RawEvent::Queued { response } | RawEvent::InProgress { response } => {
                if let Some(response) = response {
                    self.observe(&response);
                }
                Ok(Vec::new())
            }

            RawEvent::OutputItemAdded { item, .. } => {
                self.close_block()?;
                match item {
                    OutputItem::FunctionCall {
                        call_id,
                        name,
                        arguments,
                        ..
                    } => {
                        self.state = DecoderState::InStructuredBlock(StructuredBlock::ToolUse {
                            call_id,
                            name,
                            arguments,
                        });
                    }
                    OutputItem::Reasoning {
                        encrypted_content, ..
                    } => {
                        self.state = DecoderState::InStructuredBlock(StructuredBlock::Thinking {
                            thinking: String::new(),
                            signature: encrypted_content,
                        });
                    }
                    OutputItem::Message { .. } | OutputItem::Other => {}
                }
                Ok(Vec::new())
            }
            RawEvent::ContentPartAdded { .. } => {
                self.close_block()?;
                self.state = DecoderState::InTextBlock {
                    text: String::new(),
                };
                Ok(Vec::new())
            }

            RawEvent::OutputTextDelta { delta, .. } | RawEvent::RefusalDelta { delta, .. } => {
                self.append_text(delta)?;
                Ok(Vec::new())
            }
            RawEvent::ReasoningSummaryTextDelta { delta, .. }
            | RawEvent::ReasoningTextDelta { delta, .. } => {
                self.append_thinking(delta)?;
                Ok(Vec::new())
            }
            RawEvent::FunctionCallArgumentsDelta { delta, .. } => match &mut self.state {
                DecoderState::InStructuredBlock(StructuredBlock::ToolUse { arguments, .. }) => {
                    arguments.push_str(&delta);
                    Ok(Vec::new())
                }
                _ => Err(ErrorMessage::new(
                    "malformed_event",
                    "function call arguments arrived outside a function call",
                )),
            },

            RawEvent::OutputTextDone { text, .. } | RawEvent::RefusalDone { refusal: text, .. } => {
                self.close_text_with(text)?;
                Ok(Vec::new())
            }
            RawEvent::FunctionCallArgumentsDone { arguments, .. } => {
                if let DecoderState::InStructuredBlock(StructuredBlock::ToolUse {
                    arguments: accumulated,
                    ..
                }) = &mut self.state
                {
                    if accumulated.is_empty() {
                        *accumulated = arguments;
                    }
                }
                self.close_block()?;
                Ok(Vec::new())
            }
            RawEvent::ContentPartDone { .. }
            | RawEvent::ReasoningSummaryTextDone { .. }
            | RawEvent::ReasoningTextDone { .. }
            | RawEvent::OutputItemDone { .. } => {
                self.close_block()?;
                Ok(Vec::new())
            }
            RawEvent::ReasoningSummaryPartAdded { .. }
            | RawEvent::ReasoningSummaryPartDone { .. }
            | RawEvent::OutputTextAnnotationAdded { .. } => Ok(Vec::new()),

            RawEvent::Completed { response } => self.complete(response, "success"),
            RawEvent::Incomplete { response } => self.complete(response, "incomplete"),
            RawEvent::Failed { response } => {
                let error = response.error.unwrap_or_default();
                let message = if error.message.is_empty() {
                    "response failed".to_string()
                } else {
                    error.message
                };
                Err(ErrorMessage {
                    code: error.code.or_else(|| Some("response_failed".to_string())),
                    message,
                    raw: None,
                })
            }
            RawEvent::Error { code, message } => Err(ErrorMessage {
                code: code.or_else(|| Some("provider_error".to_string())),
                message,
                raw: None,
            }),
            RawEvent::Unrecognized {
                event_type,
                payload,
            } => Err(ErrorMessage::new(
                "unrecognized_event",
                format!("unrecognized event type '{}'", event_type),
            )
            .with_raw(payload)),
            RawEvent::Malformed { data, reason } => {
                Err(ErrorMessage::new("malformed_event", reason).with_raw(Value::String(data)))
            }
        }
    }

    fn observe(&mut self, response: &ResponseSnapshot) {
        if let Some(id) = &response.id {
            self.response_id = Some(id.clone());
        }
        if let Some(model) = &response.model {
            self.model = model.clone();
        }
    }

    fn append_text(&mut self, delta: String) -> std::result::Result<(), ErrorMessage> {
        match &mut self.state {
            DecoderState::InTextBlock { text } => text.push_str(&delta),
            _ => {
                self.close_block()?;
                self.state = DecoderState::InTextBlock { text: delta };
            }
        }
        Ok(())
    }

    fn append_thinking(&mut self, delta: String) -> std::result::Result<(), ErrorMessage> {
        match &mut self.state {
            DecoderState::InStructuredBlock(StructuredBlock::Thinking { thinking, .. }) => {
                thinking.push_str(&delta)
            }
            _ => {
                self.close_block()?;
                self.state = DecoderState::InStructuredBlock(StructuredBlock::Thinking {
                    thinking: delta,
                    signature: None,
                });
            }
        }
        Ok(())
    }

    /// `text` from a done event only stands in when no deltas were received.
    fn close_text_with(&mut self, text: String) -> std::result::Result<(), ErrorMessage> {
        if let DecoderState::InTextBlock { text: accumulated } = &mut self.state {
            if accumulated.is_empty() {
                *accumulated = text;
            }
        } else if self.state == DecoderState::AwaitingBlock && !text.is_empty() {
            self.state = DecoderState::InTextBlock { text };
        }
        self.close_block()
    }

    fn close_block(&mut self) -> std::result::Result<(), ErrorMessage> {
        match std::mem::replace(&mut self.state, DecoderState::AwaitingBlock) {
            DecoderState::AwaitingBlock => {}
            DecoderState::Done => self.state = DecoderState::Done,
            DecoderState::InTextBlock { text } => {
                if !text.is_empty() {
                    self.content.push(ContentBlock::Text { text });
                }
            }
            DecoderState::InStructuredBlock(StructuredBlock::Thinking {
                thinking,
                signature,
            }) => {
                if !thinking.is_empty() {
                    self.content.push(ContentBlock::Thinking {
                        thinking,
                        signature,
                    });
                }
            }
            DecoderState::InStructuredBlock(StructuredBlock::ToolUse {
                call_id,
                name,
                arguments,
            }) => {
                let input = if arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&arguments).map_err(|e| {
                        ErrorMessage::new(
                            "malformed_event",
                            format!("invalid arguments for function call '{}': {}", name, e),
                        )
                        .with_raw(Value::String(arguments.clone()))
                    })?
                };
                self.content.push(ContentBlock::ToolUse {
                    id: call_id,
                    name,
                    input,
                });
            }
        }
        Ok(())
    }

    fn complete(
        &mut self,
        response: ResponseSnapshot,
        subtype: &str,
    ) -> std::result::Result<Vec<Message>, ErrorMessage> {
        self.observe(&response);
        self.close_block()?;
        self.state = DecoderState::Done;

        let content = std::mem::take(&mut self.content);
        let text: String = content.iter().filter_map(ContentBlock::as_text).collect();

        let stop_reason = match subtype {
            "incomplete" => response
                .incomplete_details
                .and_then(|d| d.reason)
                .or(response.status),
            _ => response.status,
        };

        let mut messages = Vec::with_capacity(2);
        if !content.is_empty() {
            messages.push(Message::Assistant(AssistantMessage {
                content,
                model: self.model.clone(),
            }));
        }
        messages.push(Message::Result(ResultMessage {
            subtype: subtype.to_string(),
            duration_ms: self.started_at.elapsed().as_millis() as u64,
            is_error: false,
            num_turns: self.num_turns,
            session_id: self.response_id.clone(),
            usage: response.usage.map(Usage::from),
            stop_reason,
            result: if text.is_empty() { None } else { Some(text) },
        }));
        Ok(messages)
    }
}

/// Pipe a raw event stream through a decoder.
///
/// Pulling stops as soon as the decoder reaches its terminal state, which
/// drops the raw stream (and the connection behind it). A transport error
/// is yielded as `Err` and ends the stream.
pub fn decode_stream(raw: RawEventStream, decoder: MessageDecoder) -> MessageStream {
    Box::pin(async_stream::stream! {
        let mut raw = raw;
        let mut decoder = decoder;
        let mut failed = false;

        while let Some(item) = raw.next().await {
            match item {
                Ok(event) => {
                    for message in decoder.feed(event) {
                        yield Ok(message);
                    }
                    if decoder.is_done() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Transport failed mid-stream: {}", e);
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }
        drop(raw);

        if !failed {
            if let Some(message) = decoder.finish() {
                yield Ok(message);
            }
        }
    })
}
