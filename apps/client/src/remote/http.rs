//! HTTP client for the quiz record service.

use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::types::{Chapter, DeviceId, ExamHistoryEntry, ProgressPatch, ProgressRecord, Question};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CatalogSource, RemoteError, RemoteStore, Result};

/// Header carrying the device partition key.
pub const DEVICE_HEADER: &str = "X-Device-Id";

// === API Request/Response Types ===

#[derive(Debug, Deserialize)]
struct ProgressListResponse {
    records: Vec<ProgressRecord>,
}

#[derive(Debug, Serialize)]
struct ResetChapterRequest<'a> {
    chapter_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpdatedResponse {
    updated: u64,
}

#[derive(Debug, Deserialize)]
struct DeletedResponse {
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct ExamHistoryResponse {
    entries: Vec<ExamHistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct ChapterListResponse {
    chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
struct QuestionListResponse {
    questions: Vec<Question>,
}

/// Inner state shared across clones.
struct HttpRemoteInner {
    client: Client,
    backend_url: String,
    admin_token: Option<String>,
}

/// Record service client.
///
/// Clone-able; every clone shares one connection pool.
#[derive(Clone)]
pub struct HttpRemote {
    inner: Arc<HttpRemoteInner>,
}

impl HttpRemote {
    /// Create a client for the service at `backend_url`.
    pub fn new(backend_url: &str, admin_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(HttpRemoteInner {
                client: Client::new(),
                backend_url: backend_url.trim_end_matches('/').to_string(),
                admin_token,
            }),
        }
    }

    pub fn backend_url(&self) -> &str {
        &self.inner.backend_url
    }

    /// Check if the backend is reachable.
    pub async fn check_connectivity(&self) -> Result<bool> {
        let url = self.url("/health");
        match self.inner.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => Err(RemoteError::Network(e.to_string())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.backend_url, path)
    }

    /// URL of one item of `collection`. The id becomes a single
    /// percent-encoded path segment.
    fn item_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(collection))
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(format!("{} cannot be a base", self.backend_url())))?
            .push(id);
        Ok(url)
    }

    fn device_request(&self, builder: RequestBuilder, device: &DeviceId) -> RequestBuilder {
        builder.header(DEVICE_HEADER, device.as_str())
    }

    fn admin_request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.inner.admin_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Backend { status, message });
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch_progress(&self, device: &DeviceId) -> Result<Vec<ProgressRecord>> {
        let req = self.device_request(self.inner.client.get(self.url("/api/progress")), device);
        let response: ProgressListResponse = self.send_json(req).await?;
        Ok(response.records)
    }

    async fn upsert_progress(&self, device: &DeviceId, patch: &ProgressPatch) -> Result<()> {
        let req = self
            .device_request(self.inner.client.put(self.url("/api/progress")), device)
            .json(patch);
        self.send(req).await?;
        Ok(())
    }

    async fn reset_chapter(&self, device: &DeviceId, chapter_id: &str) -> Result<u64> {
        let req = self
            .device_request(
                self.inner.client.post(self.url("/api/progress/reset-chapter")),
                device,
            )
            .json(&ResetChapterRequest { chapter_id });
        let response: UpdatedResponse = self.send_json(req).await?;
        Ok(response.updated)
    }

    async fn delete_progress(&self, device: &DeviceId) -> Result<u64> {
        let req = self.device_request(self.inner.client.delete(self.url("/api/progress")), device);
        let response: DeletedResponse = self.send_json(req).await?;
        Ok(response.deleted)
    }

    async fn fetch_exam_history(
        &self,
        device: &DeviceId,
        limit: usize,
    ) -> Result<Vec<ExamHistoryEntry>> {
        let req = self
            .device_request(self.inner.client.get(self.url("/api/exam-history")), device)
            .query(&[("limit", limit)]);
        let response: ExamHistoryResponse = self.send_json(req).await?;
        Ok(response.entries)
    }

    async fn insert_exam_result(&self, device: &DeviceId, entry: &ExamHistoryEntry) -> Result<()> {
        let req = self
            .device_request(self.inner.client.post(self.url("/api/exam-history")), device)
            .json(entry);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_exam_history(&self, device: &DeviceId) -> Result<u64> {
        let req = self.device_request(
            self.inner.client.delete(self.url("/api/exam-history")),
            device,
        );
        let response: DeletedResponse = self.send_json(req).await?;
        Ok(response.deleted)
    }
}

#[async_trait]
impl CatalogSource for HttpRemote {
    async fn fetch_chapters(&self) -> Result<Vec<Chapter>> {
        let req = self.inner.client.get(self.url("/api/chapters"));
        let response: ChapterListResponse = self.send_json(req).await?;
        Ok(response.chapters)
    }

    async fn fetch_questions(&self) -> Result<Vec<Question>> {
        let req = self.inner.client.get(self.url("/api/questions"));
        let response: QuestionListResponse = self.send_json(req).await?;
        Ok(response.questions)
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        let req = self
            .admin_request(self.inner.client.post(self.url("/api/chapters")))
            .json(chapter);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: &str) -> Result<()> {
        let url = self.item_url("/api/chapters", chapter_id)?;
        let req = self.admin_request(self.inner.client.delete(url));
        self.send(req).await?;
        Ok(())
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        let req = self
            .admin_request(self.inner.client.post(self.url("/api/questions")))
            .json(question);
        self.send(req).await?;
        Ok(())
    }

    async fn update_question(&self, question: &Question) -> Result<()> {
        let url = self.item_url("/api/questions", &question.id)?;
        let req = self
            .admin_request(self.inner.client.put(url))
            .json(question);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_question(&self, question_id: &str) -> Result<()> {
        let url = self.item_url("/api/questions", question_id)?;
        let req = self.admin_request(self.inner.client.delete(url));
        self.send(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let remote = HttpRemote::new("http://localhost:3000/", None);
        assert_eq!(remote.backend_url(), "http://localhost:3000");
        assert_eq!(remote.url("/health"), "http://localhost:3000/health");
    }

    #[test]
    fn item_ids_are_one_encoded_segment() {
        let remote = HttpRemote::new("http://localhost:3000", None);

        let url = remote.item_url("/api/questions", "a/b?c#d").unwrap();
        assert_eq!(url.path(), "/api/questions/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = remote.item_url("/api/chapters", "ch1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/chapters/ch1");
    }

    #[test]
    fn unparsable_backend_url_is_rejected() {
        let remote = HttpRemote::new("not a url", None);
        let err = remote.item_url("/api/chapters", "ch1").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn connectivity_check_reports_unreachable_backend() {
        let remote = HttpRemote::new("http://127.0.0.1:9", None);
        let err = remote.check_connectivity().await.unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let remote = HttpRemote::new("http://127.0.0.1:9", None);
        let device = DeviceId::parse("dev").unwrap();
        let err = remote.fetch_progress(&device).await.unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));
    }
}
