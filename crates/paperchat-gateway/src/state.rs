use std::sync::Arc;

use dashmap::DashMap;
use paperchat_config::AppConfig;
use paperchat_db::ChatStore;
use paperchat_rag::{AnswerEngine, DocumentIndexer, Turn, VectorIndex};
use tokio::sync::RwLock;

/// Shared application state accessible from all request handlers.
///
/// The vector index is a process-wide single slot: each successful upload
/// replaces it wholesale, and it is never persisted. Transcripts are scoped
/// per conversation id, so concurrent conversations do not share context.
pub struct AppState {
    pub config: AppConfig,
    pub store: ChatStore,
    pub indexer: DocumentIndexer,
    pub engine: AnswerEngine,
    index: RwLock<Option<Arc<VectorIndex>>>,
    transcripts: DashMap<i64, Vec<Turn>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: ChatStore,
        indexer: DocumentIndexer,
        engine: AnswerEngine,
    ) -> Self {
        Self {
            config,
            store,
            indexer,
            engine,
            index: RwLock::new(None),
            transcripts: DashMap::new(),
        }
    }

    /// The current document index, if one has been built this process.
    pub async fn current_index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    pub async fn has_index(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Swap in a freshly built index. The write lock is held only for the
    /// swap itself; indexing runs before this is called.
    pub async fn install_index(&self, index: VectorIndex) {
        *self.index.write().await = Some(Arc::new(index));
    }

    /// Snapshot of the transcript for one conversation.
    pub fn transcript(&self, conversation_id: i64) -> Vec<Turn> {
        self.transcripts
            .get(&conversation_id)
            .map(|t| t.value().clone())
            .unwrap_or_default()
    }

    pub fn record_turn(&self, conversation_id: i64, question: String, answer: String) {
        self.transcripts
            .entry(conversation_id)
            .or_default()
            .push(Turn { question, answer });
    }
}

pub type SharedState = Arc<AppState>;
