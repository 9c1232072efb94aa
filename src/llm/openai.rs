use std::env;
use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionRequest, LlmClient, OpenAiError, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_KEY_FILE: &str = "openai_api_key.txt";
// whole-document requests on reasoning models routinely take minutes
const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Sent only when set; reasoning models reject it.
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OpenAiClientConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.api_key = load_api_key();
        if let Ok(base) = env::var("OPENAI_BASE_URL") {
            cfg.base_url = base;
        }
        cfg.temperature = env::var("OPENAI_TEMPERATURE").ok().and_then(|v| v.trim().parse().ok());
        if let Some(secs) = env::var("OPENAI_TIMEOUT_SECS").ok().and_then(|v| v.trim().parse().ok()) {
            cfg.timeout = Duration::from_secs(secs);
        }
        cfg
    }
}

// OPENAI_API_KEY wins; otherwise the first non-comment line of OPENAI_API_KEY_FILE
fn load_api_key() -> Option<String> {
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    let path = env::var("OPENAI_API_KEY_FILE").unwrap_or_else(|_| DEFAULT_KEY_FILE.to_string());
    parse_key_file(&fs::read_to_string(path).ok()?)
}

fn parse_key_file(content: &str) -> Option<String> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))?;
    let value = line.split_once('=').map_or(line, |(_, v)| v.trim());
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_string())
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    api_key: String,
    endpoint: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiClientConfig) -> Result<Self, OpenAiError> {
        let api_key = cfg.api_key.ok_or(OpenAiError::MissingApiKey)?;
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            temperature: cfg.temperature,
        })
    }

    fn wire_request<'a>(&self, req: &'a CompletionRequest) -> WireRequest<'a> {
        WireRequest {
            model: &req.model,
            temperature: self.temperature,
            messages: [
                WireMessage { role: "system", content: &req.system },
                WireMessage { role: "user", content: &req.user },
            ],
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, OpenAiError> {
        if request.user.trim().is_empty() {
            return Err(OpenAiError::EmptyPrompt);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.wire_request(&request))
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<WireErrorEnvelope>(&bytes)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).trim().to_string());
            return Err(OpenAiError::Api { status, message });
        }

        let parsed: WireResponse = serde_json::from_slice(&bytes).map_err(OpenAiError::Decode)?;
        Ok(parsed.into_completion())
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: [WireMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

impl WireResponse {
    fn into_completion(self) -> Completion {
        let content = self.choices.into_iter().find_map(|c| c.message.content).unwrap_or_default();
        let usage = self.usage.map(|u| TokenUsage { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens });
        Completion { content, usage }
    }
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(temperature: Option<f32>) -> OpenAiClient {
        OpenAiClient::new(OpenAiClientConfig {
            api_key: Some("test".into()),
            base_url: "http://localhost:9/v1/".into(),
            temperature,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".into(),
            system: "You summarize documents.".into(),
            user: "Chunk 1/2 | lines 1-40".into(),
        }
    }

    #[test]
    fn wire_request_carries_system_then_user() {
        let req = request();
        let value = serde_json::to_value(client(None).wire_request(&req)).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Chunk 1/2 | lines 1-40");
        assert!(value.get("temperature").is_none());

        let value = serde_json::to_value(client(Some(0.5)).wire_request(&req)).unwrap();
        assert_eq!(value["temperature"], 0.5);
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(client(None).endpoint, "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn client_requires_a_key() {
        let cfg = OpenAiClientConfig { api_key: None, ..OpenAiClientConfig::default() };
        assert!(matches!(OpenAiClient::new(cfg), Err(OpenAiError::MissingApiKey)));
    }

    #[test]
    fn response_takes_first_message_content() {
        let body = r###"{"choices":[{"message":{"content":null}},{"message":{"content":"## Summary"}}],
                       "usage":{"prompt_tokens":120,"completion_tokens":30,"total_tokens":150}}"###;
        let parsed: WireResponse = serde_json::from_str(body).unwrap();
        let completion = parsed.into_completion();
        assert_eq!(completion.content, "## Summary");
        assert_eq!(completion.usage, Some(TokenUsage { prompt_tokens: 120, completion_tokens: 30 }));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_sending() {
        let req = CompletionRequest { user: "  ".into(), ..request() };
        assert!(matches!(client(None).complete(req).await, Err(OpenAiError::EmptyPrompt)));
    }

    #[test]
    fn key_file_accepts_assignment_or_bare_key() {
        assert_eq!(parse_key_file("# comment\n\nOPENAI_API_KEY=\"sk-abc\"\n"), Some("sk-abc".into()));
        assert_eq!(parse_key_file("  sk-bare  \n"), Some("sk-bare".into()));
        assert_eq!(parse_key_file("# only comments\n"), None);
        assert_eq!(parse_key_file("KEY=''"), None);
    }
}
