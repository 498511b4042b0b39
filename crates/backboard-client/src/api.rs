//! REST client for the hosted Backboard assistant API.

use async_trait::async_trait;
use tracing::debug;

use backboard_common::{
    ApiError, Assistant, ChatMessage, DocumentStatusResponse, MemoryMode, MessageResponse,
    ModelConfig, Thread,
};

use crate::config::BackboardConfig;
use crate::indexing::DocumentStatusSource;

const API_KEY_HEADER: &str = "X-API-Key";

/// One file to attach to an outgoing message.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A send-message request: text, streaming preference, memory mode, model
/// routing, and optional file attachments.
#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub content: String,
    pub stream: bool,
    pub memory: MemoryMode,
    pub model: ModelConfig,
    pub files: Vec<FileUpload>,
}

impl SendMessageRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stream: true,
            memory: MemoryMode::default(),
            model: ModelConfig::default(),
            files: Vec::new(),
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_memory(mut self, memory: MemoryMode) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }
}

/// Reply to a send-message request. The upstream answers either with a
/// complete JSON body or, when streaming was granted, with an SSE response
/// whose body is consumed by the streaming pipeline.
pub enum SendReply {
    Complete(Box<MessageResponse>),
    Streaming(reqwest::Response),
}

/// Typed HTTP client over the Backboard REST API.
pub struct BackboardClient {
    config: BackboardConfig,
    http: reqwest::Client,
}

impl BackboardClient {
    pub fn new(config: BackboardConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, ApiError> {
        self.get_json("/assistants").await
    }

    pub async fn list_threads(&self, assistant_id: &str) -> Result<Vec<Thread>, ApiError> {
        self.get_json(&format!("/assistants/{assistant_id}/threads?skip=0&limit=100"))
            .await
    }

    pub async fn create_thread(&self, assistant_id: &str) -> Result<Thread, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/assistants/{assistant_id}/threads")))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/threads/{thread_id}")))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }

    pub async fn thread_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.get_json(&format!("/threads/{thread_id}/messages")).await
    }

    /// Send a chat turn as a multipart form, with any file attachments.
    /// Sniffs the reply content-type to decide between the streaming and
    /// complete paths — the upstream may decline to stream.
    pub async fn send_message(
        &self,
        thread_id: &str,
        request: SendMessageRequest,
    ) -> Result<SendReply, ApiError> {
        debug!(
            thread_id,
            stream = request.stream,
            provider = %request.model.llm_provider,
            model = %request.model.model_name,
            files = request.files.len(),
            "sending message"
        );

        let mut form = reqwest::multipart::Form::new()
            .text("content", request.content)
            .text("stream", if request.stream { "true" } else { "false" })
            .text("memory", request.memory.as_str())
            .text("llm_provider", request.model.llm_provider)
            .text("model_name", request.model.model_name)
            .text("send_to_llm", "true");

        for file in request.files {
            let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.filename);
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(self.url(&format!("/threads/{thread_id}/messages")))
            .header(API_KEY_HEADER, &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.contains("text/event-stream") {
            return Ok(SendReply::Streaming(response));
        }

        let body: MessageResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(SendReply::Complete(Box::new(body)))
    }
}

#[async_trait]
impl DocumentStatusSource for BackboardClient {
    async fn document_status(
        &self,
        document_id: &str,
    ) -> Result<DocumentStatusResponse, ApiError> {
        self.get_json(&format!("/documents/{document_id}/status")).await
    }
}

/// Map a non-2xx response to `ApiError::Status` with a truncated body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = body.chars().take(200).collect::<String>();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_request_builder() {
        let request = SendMessageRequest::new("hello")
            .with_stream(false)
            .with_memory(MemoryMode::Readonly)
            .with_model(ModelConfig {
                llm_provider: "anthropic".into(),
                model_name: "claude-sonnet-4".into(),
            })
            .with_file(FileUpload {
                filename: "a.pdf".into(),
                bytes: vec![1, 2, 3],
            });

        assert_eq!(request.content, "hello");
        assert!(!request.stream);
        assert_eq!(request.memory, MemoryMode::Readonly);
        assert_eq!(request.model.llm_provider, "anthropic");
        assert_eq!(request.files.len(), 1);
    }

    #[test]
    fn request_defaults() {
        let request = SendMessageRequest::new("hi");
        assert!(request.stream);
        assert_eq!(request.memory, MemoryMode::Auto);
        assert_eq!(request.model, ModelConfig::default());
        assert!(request.files.is_empty());
    }

    #[test]
    fn url_joins_base_and_path() {
        let client = BackboardClient::new(
            BackboardConfig::new("key").with_base_url("http://localhost:9000/api"),
        );
        assert_eq!(
            client.url("/threads/t1/messages"),
            "http://localhost:9000/api/threads/t1/messages"
        );
    }
}
