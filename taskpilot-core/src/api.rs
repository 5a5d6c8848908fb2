//! HTTP client for the task REST API
//!
//! Every request carries JSON headers and, when logged in, the current
//! bearer token from the shared [`AuthStore`]. Non-2xx answers become a
//! [`BackendError`] classified by status; a 401 also logs the session out.
//! Nothing is retried automatically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::config::BackendConfig;
use crate::error::{BackendError, Error, Result};
use crate::store::AuthStore;
use crate::types::{
    AuthToken, ContextEntry, Credentials, NewContextEntry, NewTask, Registration, Task, TaskUpdate,
    User,
};

/// Response from POST auth/login/
#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: AuthToken,
}

/// HTTP client for the task REST API
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    auth: Arc<AuthStore>,
}

impl ApiClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the base URL is missing or invalid.
    pub fn new(config: &BackendConfig, auth: Arc<AuthStore>) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .resolved_base_url()
            .ok_or_else(|| Error::Config("backend.base_url is required".to_string()))?;
        let base_url = format!("{}/", base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, returning the raw response on success.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let mut request = self.http_client.request(method.clone(), self.url(path));
        if let Some(token) = self.auth.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, path, "Backend request");
        let response = request.send().await.map_err(|e| {
            tracing::warn!(method = %method, path, error = %e, "Backend unreachable");
            BackendError::network()
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let bytes = response.bytes().await.unwrap_or_default();
        let body = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
        let error = BackendError::from_status(status.as_u16(), body.as_ref());

        if status.is_server_error() {
            tracing::error!(method = %method, path, status = status.as_u16(), error = %error, "Server error");
        } else {
            tracing::warn!(method = %method, path, status = status.as_u16(), error = %error, "Request rejected");
        }
        if status == StatusCode::UNAUTHORIZED {
            if let Err(e) = self.auth.logout() {
                tracing::warn!(error = %e, "Failed to clear session after 401");
            }
        }

        Err(error.into())
    }

    async fn fetch<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, body).await?;
        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::malformed(status, e).into())
    }

    async fn fetch_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()> {
        self.send(method, path, body).await.map(|_| ())
    }
}

/// Placeholder body type for requests without one
const NO_BODY: Option<&()> = None;

#[async_trait]
impl Backend for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        credentials.validate()?;
        let response: LoginResponse = self
            .fetch(Method::POST, "auth/login/", Some(credentials))
            .await?;
        Ok(response.data)
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        self.fetch_empty(Method::POST, "auth/register/", Some(registration))
            .await
    }

    async fn list_context(&self) -> Result<Vec<ContextEntry>> {
        self.fetch(Method::GET, "context/", NO_BODY).await
    }

    async fn create_context(&self, entry: &NewContextEntry) -> Result<ContextEntry> {
        entry.validate()?;
        self.fetch(Method::POST, "context/", Some(entry)).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.fetch(Method::GET, "tasks/", NO_BODY).await
    }

    async fn today_tasks(&self) -> Result<Vec<Task>> {
        self.fetch(Method::GET, "tasks/today/", NO_BODY).await
    }

    async fn get_task(&self, id: u64) -> Result<Task> {
        self.fetch(Method::GET, &format!("tasks/{}/", id), NO_BODY)
            .await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        task.validate()?;
        self.fetch(Method::POST, "tasks/", Some(task)).await
    }

    async fn update_task(&self, id: u64, update: &TaskUpdate) -> Result<Task> {
        self.fetch(Method::PATCH, &format!("tasks/{}/", id), Some(update))
            .await
    }

    async fn delete_task(&self, id: u64) -> Result<()> {
        self.fetch_empty(Method::DELETE, &format!("tasks/{}/", id), NO_BODY)
            .await
    }

    async fn import_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.fetch_empty(Method::POST, "tasks/", Some(tasks)).await
    }

    async fn get_user(&self) -> Result<User> {
        self.fetch(Method::GET, "user/", NO_BODY).await
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        self.fetch(Method::PUT, "user/update/", Some(user)).await
    }

    async fn delete_user(&self) -> Result<()> {
        self.fetch_empty(Method::DELETE, "user/", NO_BODY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ImportMode, TaskStore};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Read one HTTP request, headers plus content-length body.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        String::from_utf8_lossy(&received).to_string()
    }

    /// HTTP server answering one connection per canned response, in order.
    /// Returns every request it received.
    async fn serve(
        responses: Vec<(&'static str, &'static str)>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            requests
        });
        (format!("http://{}/api", addr), handle)
    }

    /// One-shot HTTP server: answers a single request and returns what it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let (url, handle) = serve(vec![(status, body)]).await;
        let request = tokio::spawn(async move { handle.await.unwrap().remove(0) });
        (url, request)
    }

    fn client(base_url: String, auth: Arc<AuthStore>) -> ApiClient {
        let config = BackendConfig {
            base_url: Some(base_url),
            timeout_secs: 5,
        };
        ApiClient::new(&config, auth).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_and_path() {
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"id":1,"title":"Q3","createdAt":"2024-05-01T09:00:00Z"}]"#,
        )
        .await;
        let auth = Arc::new(AuthStore::in_memory());
        auth.login("secret-token".to_string()).unwrap();

        let tasks = client(url, auth).list_tasks().await.unwrap();
        assert_eq!(tasks[0].title, "Q3");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/tasks/ HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer secret-token"));
        assert!(request.to_lowercase().contains("accept: application/json"));
    }

    #[tokio::test]
    async fn test_login_reads_access_token() {
        let (url, server) = serve_once("200 OK", r#"{"data":{"access":"jwt"}}"#).await;
        let api = client(url, Arc::new(AuthStore::in_memory()));
        let token = api
            .login(&Credentials {
                login: "ada@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(token.access, "jwt");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/auth/login/"));
        assert!(request.contains(r#""login":"ada@example.com""#));
    }

    #[tokio::test]
    async fn test_unauthorized_logs_out() {
        let (url, _server) = serve_once("401 Unauthorized", "{}").await;
        let auth = Arc::new(AuthStore::in_memory());
        auth.login("stale".to_string()).unwrap();

        let err = client(url, auth.clone()).get_user().await.unwrap_err();
        match err {
            Error::Backend(e) => {
                assert!(e.is_unauthorized());
                assert_eq!(e.message, "Session expired - Please login again");
                assert!(!e.retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_error_body_message_and_code() {
        let (url, _server) = serve_once(
            "429 Too Many Requests",
            r#"{"errorMessage":"Slow down","code":"RATE_LIMIT"}"#,
        )
        .await;
        let err = client(url, Arc::new(AuthStore::in_memory()))
            .delete_task(3)
            .await
            .unwrap_err();
        match err {
            Error::Backend(e) => {
                assert_eq!(e.status, Some(429));
                assert_eq!(e.message, "Slow down");
                assert_eq!(e.code, "RATE_LIMIT");
                assert!(e.retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}/", addr), Arc::new(AuthStore::in_memory()))
            .list_context()
            .await
            .unwrap_err();
        match err {
            Error::Backend(e) => {
                assert_eq!(e.status, None);
                assert_eq!(e.code, "NETWORK_ERROR");
                assert!(e.retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_base_url_normalized() {
        let api = client(
            "https://tasks.example.com/api".to_string(),
            Arc::new(AuthStore::in_memory()),
        );
        assert_eq!(api.base_url(), "https://tasks.example.com/api/");
        assert_eq!(api.url("tasks/7/"), "https://tasks.example.com/api/tasks/7/");
    }

    fn task_json(id: u64, title: &str) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": title,
            "createdAt": "2024-05-01T09:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_append_import_posts_only_imported_tasks() {
        let (url, server) = serve_once("201 Created", "{}").await;
        let mut store = TaskStore::new(Arc::new(client(url, Arc::new(AuthStore::in_memory()))));
        let ticket = store.begin_refresh();
        store
            .finish_refresh(ticket, Ok(vec![task_json(1, "Existing")]))
            .unwrap();

        let count = store
            .import(vec![task_json(9, "Imported")], ImportMode::Append)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.tasks().len(), 2);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/tasks/ HTTP/1.1"), "{request}");
        assert!(request.contains("Imported"));
        assert!(!request.contains("Existing"), "existing task sent again:\n{request}");
    }

    #[tokio::test]
    async fn test_replace_import_deletes_server_tasks_first() {
        let (url, server) = serve(vec![
            (
                "200 OK",
                r#"[{"id":1,"title":"Old one","createdAt":"2024-05-01T09:00:00Z"},{"id":2,"title":"Old two","createdAt":"2024-05-01T09:00:00Z"}]"#,
            ),
            ("204 No Content", ""),
            ("204 No Content", ""),
            ("201 Created", "{}"),
        ])
        .await;
        let mut store = TaskStore::new(Arc::new(client(url, Arc::new(AuthStore::in_memory()))));

        store
            .import(vec![task_json(9, "Imported")], ImportMode::Replace)
            .await
            .unwrap();
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "Imported");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/tasks/ "));
        assert!(requests[1].starts_with("DELETE /api/tasks/1/ "));
        assert!(requests[2].starts_with("DELETE /api/tasks/2/ "));
        assert!(requests[3].starts_with("POST /api/tasks/ "));
        assert!(!requests[3].contains("Old one"));
    }
}
