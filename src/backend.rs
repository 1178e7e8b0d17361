use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://guthealthchat.onrender.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub user_query: String,
    pub session_id: String,
}

/// The parts of a `/query` reply the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReply {
    pub response: Option<String>,
    pub session_id: Option<String>,
}

impl QueryReply {
    /// Extract the reply from a JSON body. A `response` that is missing,
    /// `null`, `""`, `0` or `false` counts as absent. Other numbers and `true`
    /// are shown as their text.
    pub fn from_value(body: &Value) -> Self {
        let response = match body.get("response") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
            Some(Value::Bool(true)) => Some("true".to_string()),
            _ => None,
        };
        let session_id = body
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self { response, session_id }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub created_at: Option<String>,
    #[serde(default)]
    pub query_count: u64,
    pub last_query: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend returned status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response body was null")]
    NullBody,
    #[error("request task ended early: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The call the chat makes for every submitted message
#[async_trait]
pub trait Backend: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryReply, BackendError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Health, BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo, BackendError> {
        let url = format!("{}/session/{}", self.base_url, session_id);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), BackendError> {
        let url = format!("{}/session/{}", self.base_url, session_id);
        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<QueryReply, BackendError> {
        let url = format!("{}/query", self.base_url);

        // .json() sets Content-Type: application/json
        let response = self.client.post(&url).json(request).send().await?;

        let body: Value = decode(response).await?;
        if body.is_null() {
            return Err(BackendError::NullBody);
        }
        Ok(QueryReply::from_value(&body))
    }
}

/// Reject non-2xx statuses, then parse the body as JSON
async fn decode<T>(response: reqwest::Response) -> Result<T, BackendError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status(status));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn request() -> QueryRequest {
        QueryRequest {
            user_query: "Should I take probiotics?".to_string(),
            session_id: "abc123".to_string(),
        }
    }

    #[test]
    fn test_reply_reads_response_field() {
        let reply = QueryReply::from_value(&json!({
            "response": "Fiber-rich foods such as...",
            "session_id": "abc123",
            "status": "success"
        }));
        assert_eq!(reply.response.as_deref(), Some("Fiber-rich foods such as..."));
        assert_eq!(reply.session_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_reply_treats_falsy_response_as_absent() {
        assert_eq!(QueryReply::from_value(&json!({ "response": "" })).response, None);
        assert_eq!(QueryReply::from_value(&json!({ "response": null })).response, None);
        assert_eq!(QueryReply::from_value(&json!({ "answer": "x" })).response, None);
        assert_eq!(QueryReply::from_value(&json!(["x"])).response, None);
        assert_eq!(QueryReply::from_value(&json!({ "response": 0 })).response, None);
        assert_eq!(QueryReply::from_value(&json!({ "response": false })).response, None);
    }

    #[test]
    fn test_reply_shows_truthy_scalars_as_text() {
        assert_eq!(QueryReply::from_value(&json!({ "response": 42 })).response.as_deref(), Some("42"));
        assert_eq!(QueryReply::from_value(&json!({ "response": -1.5 })).response.as_deref(), Some("-1.5"));
        assert_eq!(QueryReply::from_value(&json!({ "response": true })).response.as_deref(), Some("true"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:7860/");
        assert_eq!(backend.base_url(), "http://localhost:7860");
    }

    #[tokio::test]
    async fn test_query_posts_json_body() {
        let (url, server) = serve_once("200 OK", r#"{"response":"Eat more fiber."}"#).await;
        let backend = HttpBackend::new(&url);

        let reply = backend.query(&request()).await.unwrap();
        assert_eq!(reply.response.as_deref(), Some("Eat more fiber."));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /query "));
        assert!(raw.to_lowercase().contains("content-type: application/json"));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let sent: Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            sent,
            json!({ "user_query": "Should I take probiotics?", "session_id": "abc123" })
        );
    }

    #[tokio::test]
    async fn test_query_non_success_status_is_error() {
        let (url, server) = serve_once(
            "503 Service Unavailable",
            r#"{"detail":"Service temporarily unavailable."}"#,
        )
        .await;
        let backend = HttpBackend::new(&url);

        let err = backend.query(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_malformed_body_is_decode_error() {
        let (url, server) = serve_once("200 OK", "<html>oops</html>").await;
        let backend = HttpBackend::new(&url);

        let err = backend.query(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_null_body_is_error() {
        let (url, server) = serve_once("200 OK", "null").await;
        let backend = HttpBackend::new(&url);

        let err = backend.query(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::NullBody));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_numeric_response_is_shown() {
        let (url, server) = serve_once("200 OK", r#"{"response":42}"#).await;
        let backend = HttpBackend::new(&url);

        let reply = backend.query(&request()).await.unwrap();
        assert_eq!(reply.response.as_deref(), Some("42"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://{}", addr));
        let err = backend.query(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_health_parses_status() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"status":"unhealthy","message":"RAG system not initialized"}"#,
        )
        .await;
        let backend = HttpBackend::new(&url);

        let health = backend.health().await.unwrap();
        assert!(!health.is_healthy());
        assert_eq!(health.message, "RAG system not initialized");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /health "));
    }

    #[tokio::test]
    async fn test_session_info_and_delete() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"created_at":"2024-03-01T09:05:00","query_count":4,"last_query":"2024-03-01T09:30:00"}"#,
        )
        .await;
        let info = HttpBackend::new(&url).session_info("abc123").await.unwrap();
        assert_eq!(info.query_count, 4);
        assert!(server.await.unwrap().starts_with("GET /session/abc123 "));

        let (url, server) = serve_once("404 Not Found", r#"{"detail":"Session not found"}"#).await;
        let err = HttpBackend::new(&url).delete_session("abc123").await.unwrap_err();
        assert!(matches!(err, BackendError::Status(s) if s == StatusCode::NOT_FOUND));
        assert!(server.await.unwrap().starts_with("DELETE /session/abc123 "));
    }
}
