use std::sync::Arc;

use paperchat_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::providers::{ChatMessage, ChatRole, LlmProvider, LlmRequest};

/// How many chunks are retrieved per question.
const DEFAULT_RETRIEVAL_K: usize = 4;
const DEFAULT_TEMPERATURE: f64 = 0.3;

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions \
about an uploaded document. Ground every answer in the excerpts below and in \
the conversation so far. If the excerpts do not contain the answer, say so.";

/// One answered question of the current conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Produces retrieval-grounded answers from the current vector index.
pub struct AnswerEngine {
    llm: Arc<dyn LlmProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    retrieval_k: usize,
}

impl AnswerEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            llm,
            embeddings,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    /// Answer `question` against `index`, with `history` as conversational
    /// context. Hosted-model failures surface directly; nothing is retried.
    #[instrument(skip_all, fields(history_len = history.len()))]
    pub async fn answer(
        &self,
        question: &str,
        history: &[Turn],
        index: &VectorIndex,
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(Error::Validation("question must not be empty".into()));
        }
        if index.is_empty() {
            return Err(Error::NoDocumentIndexed);
        }

        let query_embedding = self
            .embeddings
            .embed_query(question)
            .await
            .map_err(|e| Error::Answer(e.to_string()))?;
        let retrieved = index.search(&query_embedding, self.retrieval_k);
        debug!("retrieved {} chunks for question", retrieved.len());

        let mut context = String::new();
        for (i, chunk) in retrieved.iter().enumerate() {
            context.push_str(&format!("[excerpt {}]\n{}\n\n", i + 1, chunk.content));
        }

        let system = format!("{SYSTEM_PROMPT}\n\n{context}");

        let mut messages = Vec::with_capacity(history.len() * 2 + 1);
        for turn in history {
            messages.push(ChatMessage {
                role: ChatRole::User,
                content: turn.question.clone(),
            });
            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: turn.answer.clone(),
            });
        }
        messages.push(ChatMessage {
            role: ChatRole::User,
            content: question.to_string(),
        });

        let request = LlmRequest {
            model: String::new(),
            messages,
            system: Some(system),
            max_tokens: None,
            temperature: Some(DEFAULT_TEMPERATURE),
        };

        let response = self.llm.complete(&request).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerEngine, Turn};
    use crate::embeddings::EmbeddingProvider;
    use crate::index::VectorIndex;
    use crate::providers::{ChatRole, LlmProvider, LlmRequest, LlmResponse};
    use async_trait::async_trait;
    use paperchat_common::{Error, Result};
    use std::sync::{Arc, Mutex};

    /// Records the request it saw and returns a canned answer.
    struct StubLlm {
        seen: Mutex<Option<LlmRequest>>,
        fail: bool,
    }

    impl StubLlm {
        fn new(fail: bool) -> Self {
            Self {
                seen: Mutex::new(None),
                fail,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_id(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            if self.fail {
                return Err(Error::Answer("model unreachable".into()));
            }
            Ok(LlmResponse {
                text: "a grounded answer".to_string(),
                model: "stub".to_string(),
                usage: None,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct StubEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        fn provider_id(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-embed"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| fake_embedding(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(fake_embedding(text))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    /// Deterministic toy embedding: direction picked by a keyword.
    fn fake_embedding(text: &str) -> Vec<f32> {
        if text.contains("owls") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        }
    }

    fn owl_index() -> VectorIndex {
        VectorIndex::new(
            vec![
                "owls hunt at night".to_string(),
                "the weather was mild".to_string(),
            ],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
    }

    fn engine(llm: Arc<StubLlm>) -> AnswerEngine {
        AnswerEngine::new(llm, Arc::new(StubEmbeddings)).with_retrieval_k(1)
    }

    #[tokio::test]
    async fn answer_returns_model_text() {
        let llm = Arc::new(StubLlm::new(false));
        let engine = engine(Arc::clone(&llm));

        let answer = engine
            .answer("tell me about owls", &[], &owl_index())
            .await
            .expect("answer should succeed");

        assert_eq!(answer, "a grounded answer");
    }

    #[tokio::test]
    async fn prompt_contains_retrieved_chunk_and_question() {
        let llm = Arc::new(StubLlm::new(false));
        let engine = engine(Arc::clone(&llm));

        engine
            .answer("tell me about owls", &[], &owl_index())
            .await
            .expect("answer should succeed");

        let request = llm.seen.lock().unwrap().clone().expect("request captured");
        let system = request.system.expect("system prompt set");
        assert!(system.contains("owls hunt at night"));
        assert!(!system.contains("the weather was mild"));
        assert_eq!(request.messages.last().unwrap().content, "tell me about owls");
        assert_eq!(request.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn history_becomes_alternating_chat_messages() {
        let llm = Arc::new(StubLlm::new(false));
        let engine = engine(Arc::clone(&llm));

        let history = vec![Turn {
            question: "first question".to_string(),
            answer: "first answer".to_string(),
        }];

        engine
            .answer("tell me about owls", &history, &owl_index())
            .await
            .expect("answer should succeed");

        let request = llm.seen.lock().unwrap().clone().expect("request captured");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, ChatRole::User);
        assert_eq!(request.messages[0].content, "first question");
        assert_eq!(request.messages[1].role, ChatRole::Assistant);
        assert_eq!(request.messages[1].content, "first answer");
    }

    #[tokio::test]
    async fn empty_index_is_rejected() {
        let llm = Arc::new(StubLlm::new(false));
        let engine = engine(llm);

        let result = engine
            .answer("anything", &[], &VectorIndex::new(vec![], vec![]))
            .await;

        assert!(matches!(result, Err(Error::NoDocumentIndexed)));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let llm = Arc::new(StubLlm::new(false));
        let engine = engine(llm);

        let result = engine.answer("   ", &[], &owl_index()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn model_failure_surfaces_unretried() {
        let llm = Arc::new(StubLlm::new(true));
        let engine = engine(llm);

        let result = engine
            .answer("tell me about owls", &[], &owl_index())
            .await;

        match result {
            Err(Error::Answer(message)) => assert!(message.contains("model unreachable")),
            other => panic!("expected answer error, got {other:?}"),
        }
    }
}
