use async_trait::async_trait;
use paperchat_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::providers::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse, Usage};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Generative Language chat provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_request(&self, request: &LlmRequest) -> (String, GenerateContentRequest) {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let contents = request
            .messages
            .iter()
            .map(Content::from_message)
            .collect();

        let system_instruction = request.system.as_ref().map(|s| SystemInstruction {
            parts: vec![Part { text: s.clone() }],
        });

        let generation_config =
            if request.temperature.is_some() || request.max_tokens.is_some() {
                Some(GenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_tokens,
                })
            } else {
                None
            };

        (
            model,
            GenerateContentRequest {
                contents,
                system_instruction,
                generation_config,
            },
        )
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let (model, body) = self.build_request(request);

        tracing::Span::current().record("model", model.as_str());
        debug!("gemini request: model={model}");

        let response = self
            .client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Answer(format!("gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Answer(format!(
                "gemini API error: status={status}, body={body}"
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Answer(format!("failed to parse gemini response: {e}")))?;

        from_gemini_response(api_response, model)
    }

    async fn health_check(&self) -> Result<bool> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "ping".to_string(),
            }],
            system: None,
            max_tokens: Some(1),
            temperature: None,
        };

        match self.complete(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                info!("gemini health check failed: {e}");
                Ok(false)
            }
        }
    }
}

/// Google Generative Language embedding provider.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request_body(&self, texts: &[String]) -> BatchEmbedRequest {
        let model_path = format!("models/{}", self.model);
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedContentRequest {
                    model: model_path.clone(),
                    content: EmbedContent {
                        parts: vec![Part { text: t.clone() }],
                    },
                })
                .collect(),
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&self.build_request_body(texts))
            .send()
            .await
            .map_err(|e| Error::Indexing(format!("gemini embed request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Indexing(format!(
                "gemini embed API error: status={status}, body={body}"
            )));
        }

        let payload: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Indexing(format!("failed to parse gemini embed response: {e}")))?;

        Ok(payload.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let mut embeddings = self.embed(&texts).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Indexing("gemini returned no embedding for query".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.embed_query("health check").await.is_ok())
    }
}

// --- Gemini Wire Types (private) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn from_message(message: &ChatMessage) -> Self {
        // Gemini's assistant role is "model".
        let role = match message.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "model",
        };
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: message.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

// --- Conversion ---

fn from_gemini_response(response: GenerateContentResponse, model: String) -> Result<LlmResponse> {
    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(Error::Answer("gemini returned no candidates".into()));
    }

    let usage = response.usage_metadata.map(|u| Usage {
        input_tokens: u.prompt_token_count.unwrap_or(0),
        output_tokens: u.candidates_token_count.unwrap_or(0),
    });

    Ok(LlmResponse { text, model, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_with_default_model() {
        let provider = GeminiProvider::new("test-key", None, None);
        let request = LlmRequest {
            model: String::new(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "hello".to_string(),
            }],
            system: Some("You answer questions about a document".to_string()),
            max_tokens: None,
            temperature: Some(0.3),
        };

        let (model, body) = provider.build_request(&request);
        assert_eq!(model, DEFAULT_MODEL);
        assert_eq!(body.contents.len(), 1);
        assert_eq!(body.contents[0].role, "user");
        assert!(body.system_instruction.is_some());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["temperature"], 0.3);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn assistant_messages_use_model_role() {
        let provider = GeminiProvider::new("test-key", None, None);
        let request = LlmRequest {
            model: String::new(),
            messages: vec![
                ChatMessage {
                    role: ChatRole::User,
                    content: "q".to_string(),
                },
                ChatMessage {
                    role: ChatRole::Assistant,
                    content: "a".to_string(),
                },
            ],
            system: None,
            max_tokens: None,
            temperature: None,
        };

        let (_, body) = provider.build_request(&request);
        assert_eq!(body.contents[1].role, "model");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn deserializes_text_response() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "The paper is about owls."}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 7,
                "totalTokenCount": 19
            }
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let llm_response =
            from_gemini_response(response, "gemini-1.5-flash".to_string()).unwrap();

        assert_eq!(llm_response.text, "The paper is about owls.");
        assert_eq!(llm_response.usage.as_ref().unwrap().input_tokens, 12);
        assert_eq!(llm_response.usage.as_ref().unwrap().output_tokens, 7);
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let result = from_gemini_response(response, "gemini-1.5-flash".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = GeminiProvider::new(
            "key",
            None,
            Some("https://example.com/".to_string()),
        );
        assert_eq!(
            provider.endpoint("gemini-1.5-flash"),
            "https://example.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn embed_request_prefixes_model_path() {
        let provider = GeminiEmbeddingProvider::new("test-key", None, None);
        let body = provider.build_request_body(&["hello".to_string(), "world".to_string()]);

        assert_eq!(body.requests.len(), 2);
        assert_eq!(body.requests[0].model, "models/embedding-001");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "world");
    }

    #[test]
    fn parses_batch_embed_response() {
        let payload: BatchEmbedResponse = serde_json::from_str(
            r#"{
                "embeddings": [
                    {"values": [0.1, 0.2, 0.3]},
                    {"values": [0.9, 0.1, 0.0]}
                ]
            }"#,
        )
        .expect("json should parse");

        let vectors: Vec<Vec<f32>> = payload.embeddings.into_iter().map(|e| e.values).collect();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn embed_endpoint_names_batch_method() {
        let provider = GeminiEmbeddingProvider::new("test-key", None, None);
        assert_eq!(
            provider.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:batchEmbedContents"
        );
    }
}
