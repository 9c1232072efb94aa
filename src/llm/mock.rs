use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Completion, CompletionRequest, LlmClient, OpenAiError};

/// Replays queued responses in order and records every request it receives.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<Completion, OpenAiError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    pub fn new() -> Self { Self::default() }

    pub fn push_reply(&self, content: &str) {
        self.push_response(Ok(Completion { content: content.to_string(), usage: None }));
    }

    pub fn push_response(&self, resp: Result<Completion, OpenAiError>) {
        self.responses.lock().unwrap().push_back(resp);
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, OpenAiError> {
        self.calls.lock().unwrap().push(request);
        self.responses.lock().unwrap().pop_front().unwrap_or(Err(OpenAiError::MockQueueEmpty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_reports_empty() {
        let mock = MockClient::new();
        mock.push_reply("hi");
        let req = CompletionRequest { model: "m".into(), system: "s".into(), user: "u".into() };

        assert_eq!(mock.complete(req.clone()).await.unwrap().content, "hi");
        assert!(matches!(mock.complete(req.clone()).await, Err(OpenAiError::MockQueueEmpty)));
        assert_eq!(mock.calls(), vec![req.clone(), req]);
    }
}
