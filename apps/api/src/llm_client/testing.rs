//! Scripted `CompletionBackend` for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Completion, CompletionBackend, CompletionRequest, LlmError, Provider, Usage};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

pub struct StubBackend {
    responder: Responder,
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn new(
        responder: impl Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(LlmError::EmptyContent))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = (self.responder)(request)?;
        Ok(Completion {
            text,
            provider: request.provider.unwrap_or(Provider::Anthropic),
            model: "stub".to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }
}
