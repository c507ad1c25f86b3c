//! AI dispatcher: one model call per inbound turn.
//!
//! Any transport, authorization, or model error becomes the fixed apologetic
//! fallback reply. The raw error is logged and never reaches the client.

use axkan_types::llm::{ChatTurn, CompletionRequest, Usage};
use tracing::{Instrument, error, field, info_span, warn};

use crate::llm::provider::LlmProvider;

/// Sent when the model call fails.
pub const FALLBACK_REPLY: &str =
    "Disculpa, tuve un problema procesando tu mensaje. Podrías repetirlo por favor?";

/// The model's answer for a turn.
#[derive(Debug, Clone)]
pub struct AiReply {
    /// Raw model text, or [`FALLBACK_REPLY`].
    pub text: String,
    /// True when the call failed and the fallback stands in.
    pub fallback: bool,
    pub usage: Option<Usage>,
}

impl AiReply {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_REPLY.to_string(),
            fallback: true,
            usage: None,
        }
    }
}

/// Calls the model with the system prompt and sanitized context.
pub struct AiDispatcher<'a, L> {
    llm: &'a L,
    model: &'a str,
    max_tokens: u32,
}

impl<'a, L: LlmProvider> AiDispatcher<'a, L> {
    pub fn new(llm: &'a L, model: &'a str, max_tokens: u32) -> Self {
        Self {
            llm,
            model,
            max_tokens,
        }
    }

    pub async fn dispatch(&self, system: String, turns: Vec<ChatTurn>) -> AiReply {
        if turns.is_empty() {
            warn!("context is empty after sanitizing, skipping model call");
            return AiReply::fallback();
        }

        let request = CompletionRequest {
            model: self.model.to_string(),
            messages: turns,
            system: Some(system),
            max_tokens: self.max_tokens,
            temperature: None,
        };

        let span = info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.llm.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.response.id = field::Empty,
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
        );

        match self.llm.complete(&request).instrument(span.clone()).await {
            Ok(response) if !response.content.trim().is_empty() => {
                span.record("gen_ai.response.id", response.id.as_str());
                span.record("gen_ai.usage.input_tokens", response.usage.input_tokens);
                span.record("gen_ai.usage.output_tokens", response.usage.output_tokens);
                AiReply {
                    text: response.content,
                    fallback: false,
                    usage: Some(response.usage),
                }
            }
            Ok(response) => {
                warn!(response_id = %response.id, "model returned an empty reply, using fallback");
                AiReply::fallback()
            }
            Err(e) => {
                error!(provider = self.llm.name(), error = %e, "model call failed, using fallback");
                AiReply::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axkan_types::llm::{CompletionResponse, LlmError};
    use std::sync::Mutex;

    struct MockProvider {
        result: Result<&'static str, ()>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            match self.result {
                Ok(text) => Ok(CompletionResponse {
                    id: "msg_1".into(),
                    content: text.into(),
                    model: request.model.clone(),
                    stop_reason: Some("end_turn".into()),
                    usage: Usage {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                }),
                Err(()) => Err(LlmError::AuthenticationFailed),
            }
        }
    }

    fn provider(result: Result<&'static str, ()>) -> MockProvider {
        MockProvider {
            result,
            seen: Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let llm = provider(Ok("Hola! Bienvenido"));
        let dispatcher = AiDispatcher::new(&llm, "claude-test", 300);

        let reply = dispatcher
            .dispatch("system".into(), vec![ChatTurn::user("hola")])
            .await;

        assert!(!reply.fallback);
        assert_eq!(reply.text, "Hola! Bienvenido");
        let seen = llm.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.max_tokens, 300);
        assert_eq!(seen.system.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn test_dispatch_error_becomes_fallback() {
        let llm = provider(Err(()));
        let reply = AiDispatcher::new(&llm, "claude-test", 300)
            .dispatch("system".into(), vec![ChatTurn::user("hola")])
            .await;
        assert!(reply.fallback);
        assert_eq!(reply.text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_empty_reply_or_context_becomes_fallback() {
        let llm = provider(Ok("   "));
        let dispatcher = AiDispatcher::new(&llm, "claude-test", 300);
        assert!(dispatcher.dispatch("s".into(), vec![ChatTurn::user("hola")]).await.fallback);
        assert!(dispatcher.dispatch("s".into(), vec![]).await.fallback);
    }
}
