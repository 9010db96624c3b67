// Configuration for agent sessions and one-shot queries

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MODEL: &str = "gpt-5-codex";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ORGANIZATION_ENV: &str = "OPENAI_ORG_ID";
pub const PROJECT_ENV: &str = "OPENAI_PROJECT_ID";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Output shape directive
///
/// Either a shorthand name (`"text"`, `"json_object"`) or an arbitrary
/// structured payload forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseFormat {
    Named(String),
    Schema(Value),
}

impl ResponseFormat {
    pub fn text() -> Self {
        Self::Named("text".to_string())
    }

    pub fn json_object() -> Self {
        Self::Named("json_object".to_string())
    }

    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self::Schema(serde_json::json!({
            "type": "json_schema",
            "name": name.into(),
            "schema": schema,
            "strict": true,
        }))
    }

    /// Value placed under `text.format` in the request body
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Named(name) => serde_json::json!({ "type": name }),
            Self::Schema(schema) => schema.clone(),
        }
    }
}

impl From<&str> for ResponseFormat {
    fn from(s: &str) -> Self {
        Self::Named(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),

    /// Named preset; only the appended text reaches the model
    Preset {
        preset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        append: Option<String>,
    },
}

impl SystemPrompt {
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Preset { append, .. } => append.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

impl From<&str> for SystemPrompt {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SystemPrompt {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Options kept for source compatibility with the CLI-based SDK surface.
/// They are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyOptions {
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub mcp_servers: Option<Value>,
    pub permission_mode: Option<String>,
    pub continue_conversation: bool,
    pub resume: Option<String>,
    pub max_turns: Option<u32>,
    pub permission_prompt_tool_name: Option<String>,
    pub cwd: Option<String>,
    pub settings: Option<String>,
    pub add_dirs: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub extra_args: BTreeMap<String, Option<String>>,
    pub max_buffer_size: Option<usize>,
    pub user: Option<String>,
    pub include_partial_messages: bool,
    pub fork_session: bool,
    pub setting_sources: Option<Vec<String>>,
}

impl LegacyOptions {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Agent configuration
///
/// Built once by the caller, then shared read-only (behind an `Arc`) by the
/// transport and the conversation client.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
    pub model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_organization: Option<String>,
    pub openai_project: Option<String>,
    pub openai_base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub system_prompt: Option<SystemPrompt>,
    pub extra_headers: BTreeMap<String, String>,
    pub request_timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub legacy: LegacyOptions,
}

impl AgentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.openai_organization = Some(organization.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.openai_project = Some(project.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.openai_base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Zero is rejected with a configuration error when the request is built
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_response_format(mut self, format: impl Into<ResponseFormat>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<SystemPrompt>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyOptions) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn model(&self) -> &str {
        non_blank(self.model.as_deref()).unwrap_or(DEFAULT_MODEL)
    }

    pub fn system_prompt_text(&self) -> Option<&str> {
        self.system_prompt.as_ref().and_then(SystemPrompt::text)
    }

    /// Explicit key first, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_organization(&self) -> Option<String> {
        resolve(self.openai_organization.as_deref(), ORGANIZATION_ENV, |name| {
            std::env::var(name).ok()
        })
    }

    pub fn resolve_project(&self) -> Option<String> {
        resolve(self.openai_project.as_deref(), PROJECT_ENV, |name| {
            std::env::var(name).ok()
        })
    }

    pub fn resolve_base_url(&self) -> String {
        resolve(self.openai_base_url.as_deref(), BASE_URL_ENV, |name| {
            std::env::var(name).ok()
        })
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub(crate) fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(self.openai_api_key.as_deref(), API_KEY_ENV, lookup).ok_or_else(|| {
            AgentError::Authentication(format!(
                "an OpenAI API key must be provided via AgentOptions::openai_api_key or the {} environment variable",
                API_KEY_ENV
            ))
        })
    }

    pub(crate) fn log_ignored_legacy(&self) {
        if !self.legacy.is_empty() {
            tracing::debug!(
                "Ignoring legacy options that have no effect with the Responses API backend"
            );
        }
    }
}

impl fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("model", &self.model)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_organization", &self.openai_organization)
            .field("openai_project", &self.openai_project)
            .field("openai_base_url", &self.openai_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("response_format", &self.response_format)
            .field("system_prompt", &self.system_prompt)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("legacy", &self.legacy)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn resolve<F>(explicit: Option<&str>, env_name: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = non_blank(explicit) {
        return Some(value.trim().to_string());
    }
    lookup(env_name)
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let options = AgentOptions::new().with_api_key("sk-explicit");
        let key = options
            .resolve_api_key_with(|_| Some("sk-env".to_string()))
            .unwrap();
        assert_eq!(key, "sk-explicit");
    }

    #[test]
    fn test_env_key_fallback() {
        let options = AgentOptions::new();
        let key = options
            .resolve_api_key_with(|name| {
                assert_eq!(name, API_KEY_ENV);
                Some("sk-env".to_string())
            })
            .unwrap();
        assert_eq!(key, "sk-env");
    }

    #[test]
    fn test_missing_key_is_authentication_error() {
        let options = AgentOptions::new().with_api_key("   ");
        let err = options.resolve_api_key_with(no_env).unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_default_model() {
        assert_eq!(AgentOptions::new().model(), DEFAULT_MODEL);
        assert_eq!(AgentOptions::new().with_model("gpt-5").model(), "gpt-5");
    }

    #[test]
    fn test_response_format_wire() {
        assert_eq!(
            ResponseFormat::json_object().to_wire(),
            serde_json::json!({"type": "json_object"})
        );

        let schema = ResponseFormat::json_schema("answer", serde_json::json!({"type": "object"}));
        let wire = schema.to_wire();
        assert_eq!(wire["type"], "json_schema");
        assert_eq!(wire["name"], "answer");
    }

    #[test]
    fn test_response_format_deserializes_string_or_object() {
        let named: ResponseFormat = serde_json::from_str(r#""text""#).unwrap();
        assert_eq!(named, ResponseFormat::text());

        let schema: ResponseFormat =
            serde_json::from_str(r#"{"type":"json_schema","name":"x","schema":{}}"#).unwrap();
        assert!(matches!(schema, ResponseFormat::Schema(_)));
    }

    #[test]
    fn test_system_prompt_preset_uses_append() {
        let preset: SystemPrompt =
            serde_json::from_str(r#"{"type":"preset","preset":"coder","append":"Be brief."}"#)
                .unwrap();
        assert_eq!(preset.text(), Some("Be brief."));

        let bare: SystemPrompt =
            serde_json::from_str(r#"{"type":"preset","preset":"coder"}"#).unwrap();
        assert_eq!(bare.text(), None);
    }

    #[test]
    fn test_legacy_fields_accepted() {
        let json = r#"{
            "model": "gpt-5",
            "allowed_tools": ["Bash"],
            "permission_mode": "acceptEdits",
            "max_turns": 3
        }"#;
        let options: AgentOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.model(), "gpt-5");
        assert_eq!(options.legacy.allowed_tools, vec!["Bash".to_string()]);
        assert_eq!(options.legacy.max_turns, Some(3));
        assert!(!options.legacy.is_empty());
    }

    #[test]
    fn test_debug_redacts_key() {
        let options = AgentOptions::new().with_api_key("sk-secret");
        let debug = format!("{:?}", options);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let options = AgentOptions::new().with_base_url("http://localhost:8080/v1/");
        assert_eq!(options.resolve_base_url(), "http://localhost:8080/v1");
    }
}
