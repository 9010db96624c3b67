// HTTP transport for the OpenAI Responses API (direct, no SDK)

use crate::buffer_utils::parse_sse_stream;
use crate::config::AgentOptions;
use crate::error::{AgentError, Result};
use crate::traits::{RawEventStream, Transport, TransportRequest};
use crate::types::{ContentBlock, Role, Turn};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const ORGANIZATION_HEADER: &str = "openai-organization";
const PROJECT_HEADER: &str = "openai-project";

/// Real transport: one streaming `POST {base}/responses` per send.
///
/// `connect` resolves the credential and builds the HTTP client, so a
/// missing key fails there rather than on the first query. `send` on an
/// unconnected transport builds a client for that call only.
pub struct OpenAITransport {
    options: Arc<AgentOptions>,
    base_url: String,
    http_client: Option<reqwest::Client>,
}

impl OpenAITransport {
    pub fn new(options: Arc<AgentOptions>) -> Self {
        let base_url = options.resolve_base_url();
        Self {
            options,
            base_url,
            http_client: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_connected(&self) -> bool {
        self.http_client.is_some()
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        let api_key = self.options.resolve_api_key()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
                AgentError::Authentication("API key is not a valid header value".to_string())
            })?,
        );

        if let Some(organization) = self.options.resolve_organization() {
            headers.insert(
                HeaderName::from_static(ORGANIZATION_HEADER),
                header_value(ORGANIZATION_HEADER, &organization)?,
            );
        }
        if let Some(project) = self.options.resolve_project() {
            headers.insert(
                HeaderName::from_static(PROJECT_HEADER),
                header_value(PROJECT_HEADER, &project)?,
            );
        }
        for (name, value) in &self.options.extra_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AgentError::Configuration(format!("invalid header name '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value(name, value)?);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout_ms) = self.options.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Transport for OpenAITransport {
    async fn connect(&mut self) -> Result<()> {
        if self.http_client.is_none() {
            self.options.log_ignored_legacy();
            self.http_client = Some(self.build_client()?);
            tracing::debug!(base_url = %self.base_url, "OpenAI transport connected");
        }
        Ok(())
    }

    async fn send(&self, request: TransportRequest) -> Result<RawEventStream> {
        let http_client = match &self.http_client {
            Some(client) => client.clone(),
            None => {
                self.options.log_ignored_legacy();
                self.build_client()?
            }
        };

        let payload = build_request_payload(&request)?;
        let url = format!("{}/responses", self.base_url);
        tracing::debug!(
            model = request.model(),
            turns = request.turns.len(),
            "Sending streaming request to {}",
            url
        );

        let response = http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(AgentError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AgentError::from_reqwest));
        Ok(parse_sse_stream(bytes))
    }

    fn release(&mut self) {
        if self.http_client.take().is_some() {
            tracing::debug!("OpenAI transport released");
        }
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AgentError::Configuration(format!("invalid value for header '{}'", name)))
}

async fn status_error(response: reqwest::Response) -> AgentError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(status = status.as_u16(), "Responses API request failed");

    match status.as_u16() {
        401 | 403 => AgentError::Authentication(format!(
            "provider rejected the credential ({}): {}",
            status, body
        )),
        429 => AgentError::RateLimit {
            message: body,
            retry_after,
        },
        code => AgentError::Api { status: code, body },
    }
}

/// Build the Responses API request body for a materialized request.
///
/// The system prompt (when any) comes first, then every turn in order.
/// Adjacent text blocks of a turn share one message item; tool calls and
/// tool results become their own items. Thinking blocks are not replayed.
pub fn build_request_payload(request: &TransportRequest) -> Result<Value> {
    let options = &request.options;

    let mut input = Vec::with_capacity(request.turns.len() + 1);
    if let Some(system_prompt) = request.system_prompt() {
        input.push(json!({
            "role": "system",
            "content": [{ "type": "input_text", "text": system_prompt }],
        }));
    }
    for turn in &request.turns {
        convert_turn(turn, &mut input)?;
    }

    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model()));
    body.insert("input".to_string(), Value::Array(input));
    body.insert("stream".to_string(), Value::Bool(true));

    if let Some(temperature) = options.temperature {
        body.insert("temperature".to_string(), float_value("temperature", temperature)?);
    }
    if let Some(max_tokens) = options.max_output_tokens {
        if max_tokens == 0 {
            return Err(AgentError::Configuration(
                "max_output_tokens must be positive".to_string(),
            ));
        }
        body.insert("max_output_tokens".to_string(), json!(max_tokens));
    }
    if let Some(format) = &options.response_format {
        body.insert("text".to_string(), json!({ "format": format.to_wire() }));
    }

    Ok(Value::Object(body))
}

fn convert_turn(turn: &Turn, items: &mut Vec<Value>) -> Result<()> {
    let text_type = match turn.role {
        Role::User => "input_text",
        Role::Assistant => "output_text",
    };

    let mut parts: Vec<Value> = Vec::new();
    for block in &turn.content {
        match block {
            ContentBlock::Text { text } => {
                parts.push(json!({ "type": text_type, "text": text }));
            }
            ContentBlock::Thinking { .. } => {}
            ContentBlock::ToolUse { id, name, input } => {
                flush_message(turn.role, &mut parts, items);
                items.push(json!({
                    "type": "function_call",
                    "call_id": id,
                    "name": name,
                    "arguments": serde_json::to_string(input)?,
                }));
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                flush_message(turn.role, &mut parts, items);
                let output = match content {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => serde_json::to_string(other)?,
                    None => String::new(),
                };
                items.push(json!({
                    "type": "function_call_output",
                    "call_id": tool_use_id,
                    "output": output,
                }));
            }
        }
    }
    flush_message(turn.role, &mut parts, items);

    Ok(())
}

fn flush_message(role: Role, parts: &mut Vec<Value>, items: &mut Vec<Value>) {
    if !parts.is_empty() {
        items.push(json!({
            "role": role.as_str(),
            "content": std::mem::take(parts),
        }));
    }
}

// Round-trip through the decimal form so 0.4f32 is sent as 0.4
fn float_value(name: &str, value: f32) -> Result<Value> {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AgentError::Configuration(format!("{} must be a finite number", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResponseFormat, SystemPrompt};

    fn request(options: AgentOptions, turns: Vec<Turn>) -> TransportRequest {
        TransportRequest::new(Arc::new(options), turns)
    }

    #[test]
    fn test_minimal_payload() {
        let payload =
            build_request_payload(&request(AgentOptions::new(), vec![Turn::user("hi")])).unwrap();

        assert_eq!(
            payload,
            json!({
                "model": "gpt-5-codex",
                "input": [
                    { "role": "user", "content": [{ "type": "input_text", "text": "hi" }] }
                ],
                "stream": true,
            })
        );
    }

    #[test]
    fn test_sampling_and_format() {
        let options = AgentOptions::new()
            .with_model("gpt-5")
            .with_temperature(0.4)
            .with_max_output_tokens(256)
            .with_response_format(ResponseFormat::json_object());
        let payload = build_request_payload(&request(options, vec![Turn::user("hi")])).unwrap();

        assert_eq!(payload["model"], "gpt-5");
        assert_eq!(payload["temperature"], json!(0.4));
        assert_eq!(payload["max_output_tokens"], 256);
        assert_eq!(payload["text"], json!({ "format": { "type": "json_object" } }));
    }

    #[test]
    fn test_schema_format_forwarded_verbatim() {
        let schema = json!({ "type": "json_schema", "name": "answer", "schema": { "type": "object" } });
        let options = AgentOptions::new().with_response_format(ResponseFormat::Schema(schema.clone()));
        let payload = build_request_payload(&request(options, vec![Turn::user("hi")])).unwrap();

        assert_eq!(payload["text"]["format"], schema);
    }

    #[test]
    fn test_system_prompt_prepended() {
        let options = AgentOptions::new().with_system_prompt("Be terse.");
        let payload = build_request_payload(&request(options, vec![Turn::user("hi")])).unwrap();

        let input = payload["input"].as_array().unwrap();
        assert_eq!(input.len(), 2);
        assert_eq!(input[0]["role"], "system");
        assert_eq!(input[0]["content"][0]["text"], "Be terse.");
        assert_eq!(input[1]["role"], "user");
    }

    #[test]
    fn test_preset_without_append_sends_no_system_item() {
        let options = AgentOptions::new().with_system_prompt(SystemPrompt::Preset {
            preset: "default".to_string(),
            append: None,
        });
        let payload = build_request_payload(&request(options, vec![Turn::user("hi")])).unwrap();

        assert_eq!(payload["input"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_history_replay_shapes() {
        let turns = vec![
            Turn::user("weather in Paris?"),
            Turn::assistant(vec![
                ContentBlock::Thinking {
                    thinking: "need a lookup".to_string(),
                    signature: None,
                },
                ContentBlock::text("Checking."),
                ContentBlock::tool_use("call_1", "get_weather", json!({ "city": "Paris" })),
            ]),
            Turn::new(
                Role::User,
                vec![ContentBlock::tool_result("call_1", "18C, clear")],
            ),
            Turn::assistant(vec![]),
            Turn::user("thanks"),
        ];
        let payload = build_request_payload(&request(AgentOptions::new(), turns)).unwrap();
        let input = payload["input"].as_array().unwrap();

        assert_eq!(input.len(), 5);
        assert_eq!(input[0]["content"][0]["type"], "input_text");
        assert_eq!(input[1]["role"], "assistant");
        assert_eq!(input[1]["content"][0]["type"], "output_text");
        assert_eq!(input[1]["content"].as_array().unwrap().len(), 1);
        assert_eq!(input[2]["type"], "function_call");
        assert_eq!(input[2]["arguments"], r#"{"city":"Paris"}"#);
        assert_eq!(input[3]["type"], "function_call_output");
        assert_eq!(input[3]["output"], "18C, clear");
        assert_eq!(input[4]["content"][0]["text"], "thanks");
    }

    #[test]
    fn test_non_finite_temperature_is_configuration_error() {
        for temperature in [f32::NAN, f32::INFINITY] {
            let options = AgentOptions::new().with_temperature(temperature);
            let error = build_request_payload(&request(options, vec![Turn::user("hi")]))
                .unwrap_err();

            match error {
                AgentError::Configuration(message) => assert!(message.contains("temperature")),
                other => panic!("Expected Configuration, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_zero_max_output_tokens_is_configuration_error() {
        let options = AgentOptions::new().with_max_output_tokens(0);

        assert!(matches!(
            build_request_payload(&request(options, vec![Turn::user("hi")])),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn test_key_with_control_characters_is_authentication_error() {
        let options = AgentOptions::new().with_api_key("sk-bad\nkey");
        let transport = OpenAITransport::new(Arc::new(options));

        assert!(transport.build_client().unwrap_err().is_authentication());
    }

    #[test]
    fn test_release_drops_client() {
        let options = AgentOptions::new().with_api_key("sk-test");
        let mut transport = OpenAITransport::new(Arc::new(options));
        transport.http_client = Some(transport.build_client().unwrap());
        assert!(transport.is_connected());

        transport.release();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_invalid_extra_header_is_configuration_error() {
        let options = AgentOptions::new()
            .with_api_key("sk-test")
            .with_header("bad header", "x");
        let transport = OpenAITransport::new(Arc::new(options));

        assert!(matches!(
            transport.build_client(),
            Err(AgentError::Configuration(_))
        ));
    }
}
