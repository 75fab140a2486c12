use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use paperchat_common::Error;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::SharedState;

#[derive(Deserialize)]
pub struct QueryRequest {
    pub question: Option<String>,
    pub conversation_id: Option<i64>,
}

/// GET /api/conversations — all conversations, newest first.
pub async fn list_conversations(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.list_conversations() {
        Ok(conversations) => (StatusCode::OK, Json(serde_json::json!(conversations))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/history/{id} — messages of one conversation. An id that was
/// never created yields an empty list, not an error.
pub async fn conversation_history(
    State(state): State<SharedState>,
    Path(conversation_id): Path<i64>,
) -> impl IntoResponse {
    match state.store.list_messages(conversation_id) {
        Ok(messages) => (StatusCode::OK, Json(serde_json::json!(messages))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/new_chat — create a conversation and return its id.
pub async fn new_chat(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.create_conversation() {
        Ok(conversation_id) => {
            info!("started conversation {conversation_id}");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": "New chat started",
                    "conversation_id": conversation_id,
                })),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// POST /api/upload — save the multipart "file" field and rebuild the
/// session vector index from it. On failure the previous index stays.
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return error_response(&Error::Validation(format!(
                            "failed to read uploaded file: {e}"
                        )));
                    }
                }
                break;
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(&Error::Validation(format!("invalid multipart body: {e}")));
            }
        }
    }

    let Some((filename, bytes)) = file else {
        return error_response(&Error::Validation("No file part".into()));
    };

    // Strip any client-supplied directories before joining the uploads dir.
    let filename = std::path::Path::new(&filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    if filename.is_empty() {
        return error_response(&Error::Validation("No selected file".into()));
    }

    let filepath = state.config.uploads_dir.join(&filename);
    if let Err(e) = tokio::fs::write(&filepath, &bytes).await {
        return error_response(&Error::Indexing(format!(
            "Error processing file: failed to save upload: {e}"
        )));
    }

    match state.indexer.index_document(&filepath).await {
        Ok(index) => {
            state.install_index(index).await;
            info!("indexed upload '{filename}'");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": format!("File '{filename}' processed and ready for questions."),
                })),
            )
                .into_response()
        }
        Err(e) => error_response(&Error::Indexing(format!("Error processing file: {e}"))),
    }
}

/// POST /api/query — answer a question against the current index and append
/// the (question, answer) pair to the conversation's history.
pub async fn query(
    State(state): State<SharedState>,
    Json(body): Json<QueryRequest>,
) -> impl IntoResponse {
    let index = match state.current_index().await {
        Some(index) => index,
        None => return error_response(&Error::NoDocumentIndexed),
    };

    let (question, conversation_id) = match (body.question, body.conversation_id) {
        (Some(question), Some(conversation_id)) if !question.trim().is_empty() => {
            (question, conversation_id)
        }
        _ => {
            return error_response(&Error::Validation(
                "Missing question or conversation_id".into(),
            ));
        }
    };

    let history = state.transcript(conversation_id);

    let answer = match state.engine.answer(&question, &history, &index).await {
        Ok(answer) => answer,
        Err(e) => return error_response(&Error::Answer(format!("Error getting answer: {e}"))),
    };

    state.record_turn(conversation_id, question.clone(), answer.clone());
    if let Err(e) = state.store.append_turn(conversation_id, &question, &answer) {
        return error_response(&Error::Answer(format!("Error getting answer: {e}")));
    }

    (StatusCode::OK, Json(serde_json::json!({ "answer": answer }))).into_response()
}

/// GET /api/status — a small liveness summary.
pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    let conversations = state.store.list_conversations().map(|c| c.len()).unwrap_or(0);
    Json(serde_json::json!({
        "status": "running",
        "conversations": conversations,
        "document_indexed": state.has_index().await,
    }))
}

/// Shape an error as `{"error": ...}` with its status code and log it; no
/// error escapes a handler.
fn error_response(err: &Error) -> axum::response::Response {
    let status = match err {
        Error::Validation(_) | Error::NoDocumentIndexed => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!("request failed: {err}");
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
