use std::fmt;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum OpenAiError {
    MissingApiKey,
    EmptyPrompt,
    Http(reqwest::Error),
    Timeout,
    Api { status: StatusCode, message: String },
    Decode(serde_json::Error),
    MockQueueEmpty,
}

impl From<reqwest::Error> for OpenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { OpenAiError::Timeout } else { OpenAiError::Http(err) }
    }
}

impl fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenAiError::MissingApiKey => write!(f, "OPENAI_API_KEY is not set and no key file was found"),
            OpenAiError::EmptyPrompt => write!(f, "completion request has an empty user prompt"),
            OpenAiError::Http(err) => write!(f, "http error: {err}"),
            OpenAiError::Timeout => write!(f, "request timed out"),
            OpenAiError::Api { status, message } => write!(f, "api error {status}: {message}"),
            OpenAiError::Decode(err) => write!(f, "decode error: {err}"),
            OpenAiError::MockQueueEmpty => write!(f, "mock client response queue is empty"),
        }
    }
}

impl std::error::Error for OpenAiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenAiError::Http(err) => Some(err),
            OpenAiError::Decode(err) => Some(err),
            _ => None,
        }
    }
}
