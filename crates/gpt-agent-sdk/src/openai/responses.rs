// OpenAI Responses API streaming events
// https://platform.openai.com/docs/api-reference/responses-streaming

use crate::types::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every `type` the decoder knows how to interpret (or safely ignore).
const KNOWN_EVENT_TYPES: &[&str] = &[
    "response.created",
    "response.queued",
    "response.in_progress",
    "response.output_item.added",
    "response.output_item.done",
    "response.content_part.added",
    "response.content_part.done",
    "response.output_text.delta",
    "response.output_text.done",
    "response.output_text.annotation.added",
    "response.refusal.delta",
    "response.refusal.done",
    "response.function_call_arguments.delta",
    "response.function_call_arguments.done",
    "response.reasoning_summary_part.added",
    "response.reasoning_summary_part.done",
    "response.reasoning_summary_text.delta",
    "response.reasoning_summary_text.done",
    "response.reasoning_text.delta",
    "response.reasoning_text.done",
    "response.completed",
    "response.incomplete",
    "response.failed",
    "error",
];

/// Raw streamed event, one per SSE `data:` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RawEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponseSnapshot },

    #[serde(rename = "response.queued")]
    Queued {
        #[serde(default)]
        response: Option<ResponseSnapshot>,
    },

    #[serde(rename = "response.in_progress")]
    InProgress {
        #[serde(default)]
        response: Option<ResponseSnapshot>,
    },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        #[serde(default)]
        output_index: u32,
        item: OutputItem,
    },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        #[serde(default)]
        output_index: u32,
        item: OutputItem,
    },

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        #[serde(default)]
        part: Option<Value>,
    },

    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        #[serde(default)]
        part: Option<Value>,
    },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },

    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "response.output_text.annotation.added")]
    OutputTextAnnotationAdded {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        annotation: Option<Value>,
    },

    #[serde(rename = "response.refusal.delta")]
    RefusalDelta {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },

    #[serde(rename = "response.refusal.done")]
    RefusalDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        #[serde(default)]
        refusal: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        #[serde(default)]
        output_index: u32,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        arguments: String,
    },

    #[serde(rename = "response.reasoning_summary_part.added")]
    ReasoningSummaryPartAdded {
        #[serde(default)]
        output_index: u32,
    },

    #[serde(rename = "response.reasoning_summary_part.done")]
    ReasoningSummaryPartDone {
        #[serde(default)]
        output_index: u32,
    },

    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        #[serde(default)]
        output_index: u32,
        delta: String,
    },

    #[serde(rename = "response.reasoning_summary_text.done")]
    ReasoningSummaryTextDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "response.reasoning_text.delta")]
    ReasoningTextDelta {
        #[serde(default)]
        output_index: u32,
        delta: String,
    },

    #[serde(rename = "response.reasoning_text.done")]
    ReasoningTextDone {
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "response.completed")]
    Completed { response: ResponseSnapshot },

    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponseSnapshot },

    #[serde(rename = "response.failed")]
    Failed { response: ResponseSnapshot },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: String,
    },

    /// Well-formed payload with a `type` outside the known set
    #[serde(skip)]
    Unrecognized { event_type: String, payload: Value },

    /// Payload that could not be read as an event
    #[serde(skip)]
    Malformed { data: String, reason: String },
}

/// Output item announced by `response.output_item.added` / `.done`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<Value>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    Reasoning {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        summary: Vec<Value>,
        #[serde(default)]
        encrypted_content: Option<String>,
    },
    // web_search_call, file_search_call, ...
    #[serde(other)]
    Other,
}

/// The `response` object carried by lifecycle events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<WireUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_details: Option<IncompleteDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputTokensDetails {
    pub cached_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputTokensDetails {
    pub reasoning_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncompleteDetails {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireError {
    pub code: Option<String>,
    pub message: String,
}

impl WireUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            ..Self::default()
        }
    }
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            reasoning_tokens: usage.output_tokens_details.and_then(|d| d.reasoning_tokens),
            cached_input_tokens: usage.input_tokens_details.and_then(|d| d.cached_tokens),
        }
    }
}

impl RawEvent {
    /// Parse one SSE data payload. Never fails: unreadable payloads become
    /// [`RawEvent::Malformed`] and unknown types [`RawEvent::Unrecognized`],
    /// leaving the decision to the decoder.
    pub fn parse(data: &str) -> Self {
        match serde_json::from_str::<Value>(data) {
            Ok(value) => Self::from_value(value),
            Err(e) => Self::Malformed {
                data: data.to_string(),
                reason: e.to_string(),
            },
        }
    }

    pub fn from_value(value: Value) -> Self {
        let event_type = match value.get("type").and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => {
                return Self::Malformed {
                    data: value.to_string(),
                    reason: "missing event type".to_string(),
                }
            }
        };

        if !KNOWN_EVENT_TYPES.contains(&event_type.as_str()) {
            return Self::Unrecognized {
                event_type,
                payload: value,
            };
        }

        match serde_json::from_value::<RawEvent>(value.clone()) {
            Ok(event) => event,
            Err(e) => Self::Malformed {
                data: value.to_string(),
                reason: format!("invalid {} event: {}", event_type, e),
            },
        }
    }

    /// Wire `type` of this event
    pub fn event_type(&self) -> &str {
        match self {
            Self::Created { .. } => "response.created",
            Self::Queued { .. } => "response.queued",
            Self::InProgress { .. } => "response.in_progress",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::OutputItemDone { .. } => "response.output_item.done",
            Self::ContentPartAdded { .. } => "response.content_part.added",
            Self::ContentPartDone { .. } => "response.content_part.done",
            Self::OutputTextDelta { .. } => "response.output_text.delta",
            Self::OutputTextDone { .. } => "response.output_text.done",
            Self::OutputTextAnnotationAdded { .. } => "response.output_text.annotation.added",
            Self::RefusalDelta { .. } => "response.refusal.delta",
            Self::RefusalDone { .. } => "response.refusal.done",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::ReasoningSummaryPartAdded { .. } => "response.reasoning_summary_part.added",
            Self::ReasoningSummaryPartDone { .. } => "response.reasoning_summary_part.done",
            Self::ReasoningSummaryTextDelta { .. } => "response.reasoning_summary_text.delta",
            Self::ReasoningSummaryTextDone { .. } => "response.reasoning_summary_text.done",
            Self::ReasoningTextDelta { .. } => "response.reasoning_text.delta",
            Self::ReasoningTextDone { .. } => "response.reasoning_text.done",
            Self::Completed { .. } => "response.completed",
            Self::Incomplete { .. } => "response.incomplete",
            Self::Failed { .. } => "response.failed",
            Self::Error { .. } => "error",
            Self::Unrecognized { event_type, .. } => event_type,
            Self::Malformed { .. } => "malformed",
        }
    }

    // ------------------------------------------------------------------
    // Constructors in the provider's shape, mainly for scripting mocks
    // ------------------------------------------------------------------

    pub fn created(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Created {
            response: ResponseSnapshot {
                id: Some(id.into()),
                model: Some(model.into()),
                status: Some("in_progress".to_string()),
                ..ResponseSnapshot::default()
            },
        }
    }

    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self::OutputTextDelta {
            output_index: 0,
            content_index: 0,
            delta: delta.into(),
        }
    }

    /// Closes the open text block; `text` is only used when no deltas arrived
    pub fn text_done(text: impl Into<String>) -> Self {
        Self::OutputTextDone {
            output_index: 0,
            content_index: 0,
            text: text.into(),
        }
    }

    pub fn reasoning_delta(delta: impl Into<String>) -> Self {
        Self::ReasoningSummaryTextDelta {
            output_index: 0,
            delta: delta.into(),
        }
    }

    pub fn function_call_added(call_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::OutputItemAdded {
            output_index: 0,
            item: OutputItem::FunctionCall {
                id: None,
                call_id: call_id.into(),
                name: name.into(),
                arguments: String::new(),
            },
        }
    }

    pub fn function_call_arguments_delta(delta: impl Into<String>) -> Self {
        Self::FunctionCallArgumentsDelta {
            output_index: 0,
            delta: delta.into(),
        }
    }

    pub fn function_call_arguments_done(arguments: impl Into<String>) -> Self {
        Self::FunctionCallArgumentsDone {
            output_index: 0,
            arguments: arguments.into(),
        }
    }

    pub fn completed(usage: Option<WireUsage>) -> Self {
        Self::Completed {
            response: ResponseSnapshot {
                status: Some("completed".to_string()),
                usage,
                ..ResponseSnapshot::default()
            },
        }
    }

    pub fn completed_with_usage(input_tokens: u32, output_tokens: u32) -> Self {
        Self::completed(Some(WireUsage::new(input_tokens, output_tokens)))
    }

    pub fn incomplete(reason: impl Into<String>) -> Self {
        Self::Incomplete {
            response: ResponseSnapshot {
                status: Some("incomplete".to_string()),
                incomplete_details: Some(IncompleteDetails {
                    reason: Some(reason.into()),
                }),
                ..ResponseSnapshot::default()
            },
        }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            response: ResponseSnapshot {
                status: Some("failed".to_string()),
                error: Some(WireError {
                    code: Some(code.into()),
                    message: message.into(),
                }),
                ..ResponseSnapshot::default()
            },
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}
