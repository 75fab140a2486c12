pub mod document;
pub mod embeddings;
pub mod engine;
pub mod gemini;
pub mod index;
pub mod indexer;
pub mod openai;
pub mod providers;
pub mod splitter;

pub use embeddings::EmbeddingProvider;
pub use engine::{AnswerEngine, Turn};
pub use gemini::{GeminiEmbeddingProvider, GeminiProvider};
pub use index::VectorIndex;
pub use indexer::DocumentIndexer;
pub use openai::{OpenAiEmbeddingProvider, OpenAiProvider};
pub use providers::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse};
