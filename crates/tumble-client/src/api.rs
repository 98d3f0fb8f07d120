use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::error::ClientError;
use crate::transport::{ChatTransport, StreamHandle};
use crate::types::{
    ChatStreamRequest, DocumentCreateRequest, DocumentRecord, DocumentStatus, FeedbackRequest,
    IngestionStatus, SessionDetail, SessionRecord,
};

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:8000/api/v1`.
    pub api_base: String,
    pub connect_timeout_ms: u64,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/api/v1".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Typed client for the backend's chat, session, feedback, and document
/// endpoints.
///
/// Only `open_turn` streams; everything else is plain request/response. No
/// total request timeout is set because a streaming body is read for as long
/// as the backend keeps generating.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub async fn create_session(&self) -> Result<SessionRecord, ClientError> {
        let response = self.http.post(self.url("/sessions")).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn list_sessions(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<SessionRecord>, ClientError> {
        let mut request = self.http.get(self.url("/sessions"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionDetail, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/feedback"))
            .json(request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Uploads a Markdown or PDF file for ingestion. The backend derives
    /// the title and source type from the file name.
    pub async fn upload_document(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<DocumentRecord, ClientError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/documents/upload"))
            .multipart(form)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn create_document(
        &self,
        request: &DocumentCreateRequest,
    ) -> Result<DocumentRecord, ClientError> {
        let response = self
            .http
            .post(self.url("/documents"))
            .json(request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn list_documents(
        &self,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<DocumentRecord>, ClientError> {
        let mut request = self.http.get(self.url("/documents"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        let response = request.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn get_document(&self, document_id: &str) -> Result<DocumentRecord, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/documents/{document_id}")))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn ingestion_status(
        &self,
        document_id: &str,
    ) -> Result<IngestionStatus, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/documents/{document_id}/status")))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/documents/{document_id}")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

struct HttpStreamHandle {
    stream: ChunkStream,
}

#[async_trait]
impl StreamHandle for HttpStreamHandle {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
        match self.stream.next().await {
            Some(chunk) => Ok(Some(chunk?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn open_turn(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<Box<dyn StreamHandle>, ClientError> {
        tracing::debug!(
            has_session = request.session_id.is_some(),
            "opening chat stream"
        );
        let response = self
            .http
            .post(self.url("/chat/stream"))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()));
        Ok(Box::new(HttpStreamHandle {
            stream: Box::pin(stream),
        }))
    }
}
