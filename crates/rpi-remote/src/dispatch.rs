//! Request dispatcher for rpi-remote.
//!
//! Routes a [`RequestEnvelope`] to exactly one operation and turns the
//! outcome into a [`ResponseEnvelope`]. Everything past the method check
//! runs inside a single failure boundary: an error at any stage becomes a
//! `{"error": ...}` response and the listener keeps going.

use crate::auth::{AllowAll, Authorizer, BearerToken};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::exec::{run_command, SystemShell, DEFAULT_CMD_TIMEOUT};
use crate::fs::{read_file, write_file, LocalFiles};
use crate::host::{FileStore, Shell};
use crate::protocol::{
    Endpoint, ErrorBody, RequestEnvelope, ResponseEnvelope, UNKNOWN_ENDPOINT,
};
use crate::status::{report_status, DEFAULT_STATUS_TIMEOUT};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Routes requests to operations. Immutable once built; share it via `Arc`.
#[derive(Clone)]
pub struct Dispatcher {
    shell: Arc<dyn Shell>,
    files: Arc<dyn FileStore>,
    authorizer: Arc<dyn Authorizer>,
    cmd_timeout: Duration,
    status_timeout: Duration,
}

impl Dispatcher {
    /// Dispatcher over the given host capabilities, open to every client,
    /// with default timeouts.
    pub fn new(shell: impl Shell + 'static, files: impl FileStore + 'static) -> Self {
        Self {
            shell: Arc::new(shell),
            files: Arc::new(files),
            authorizer: Arc::new(AllowAll),
            cmd_timeout: DEFAULT_CMD_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Production dispatcher: `sh`, the local filesystem, and a bearer-token
    /// check when the config carries a token.
    pub fn from_config(config: &AgentConfig) -> Self {
        let dispatcher = Self::new(SystemShell::new(), LocalFiles)
            .with_timeouts(config.cmd_timeout, config.status_timeout);
        match &config.token {
            Some(token) => dispatcher.with_authorizer(BearerToken::new(token.clone())),
            None => dispatcher,
        }
    }

    /// Replace the authorization hook.
    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// Set the `/cmd` budget and the per-probe `/status` budget.
    pub fn with_timeouts(mut self, cmd: Duration, status: Duration) -> Self {
        self.cmd_timeout = cmd;
        self.status_timeout = status;
        self
    }

    /// Handle one request.
    ///
    /// - GET on any path answers the liveness text without reading the body.
    /// - POST is authorized, parsed and routed.
    /// - Any other method gets a 501.
    pub async fn handle(&self, req: RequestEnvelope) -> ResponseEnvelope {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method,
            path = %req.path,
        );

        async move {
            if req.method == Method::GET {
                trace!("liveness check");
                return ResponseEnvelope::liveness();
            }
            if req.method != Method::POST {
                warn!("unsupported method");
                return ResponseEnvelope::unsupported_method(&req.method);
            }

            match self.handle_post(req).await {
                Ok(body) => {
                    debug!(len = body.len(), "request succeeded");
                    ResponseEnvelope::json(body)
                }
                Err(e) => {
                    warn!(error = %e, "request failed");
                    ResponseEnvelope::failure(e.status(), &e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The failure boundary: authorize, read, parse, route, run, serialize.
    async fn handle_post(&self, req: RequestEnvelope) -> Result<Vec<u8>> {
        self.authorizer.authorize(&req)?;

        let raw = read_body(&req.headers, req.body).await?;
        let data = parse_body(&raw)?;
        let endpoint = Endpoint::from_path(&req.path);
        debug!(?endpoint, body_len = raw.len(), "dispatching");

        match endpoint {
            Endpoint::Cmd => {
                let cmd = params(data)?;
                to_json(&run_command(self.shell.as_ref(), cmd, self.cmd_timeout).await?)
            }
            Endpoint::Read => to_json(&read_file(self.files.as_ref(), params(data)?).await?),
            Endpoint::Write => to_json(&write_file(self.files.as_ref(), params(data)?).await?),
            Endpoint::Status => {
                to_json(&report_status(self.shell.as_ref(), self.status_timeout).await?)
            }
            Endpoint::Unknown => {
                debug!("unknown endpoint");
                to_json(&ErrorBody {
                    error: UNKNOWN_ENDPOINT,
                })
            }
        }
    }
}

/// Read exactly `Content-Length` bytes; an absent or zero header means no body.
async fn read_body(headers: &HeaderMap, body: axum::body::Body) -> Result<Bytes> {
    let declared = declared_length(headers)?;
    if declared == 0 {
        return Ok(Bytes::new());
    }

    let mut bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(AgentError::ReadBody)?;
    bytes.truncate(declared);
    Ok(bytes)
}

fn declared_length(headers: &HeaderMap) -> Result<usize> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(0);
    };
    let text = value
        .to_str()
        .map_err(|_| AgentError::ContentLength(String::from_utf8_lossy(value.as_bytes()).into()))?;
    text.trim()
        .parse()
        .map_err(|_| AgentError::ContentLength(text.to_string()))
}

/// An empty body is an empty mapping; anything else must be valid JSON.
fn parse_body(raw: &[u8]) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(raw).map_err(AgentError::Body)
}

/// Extract operation parameters. Only a JSON object carries parameters.
fn params<T: DeserializeOwned>(data: Value) -> Result<T> {
    if !data.is_object() {
        return Err(AgentError::NotAnObject(json_kind(&data)));
    }
    serde_json::from_value(data).map_err(AgentError::Params)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn to_json<T: Serialize>(result: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(result).map_err(AgentError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ShellOutput;
    use crate::protocol::{JSON_CONTENT_TYPE, LIVENESS_TEXT};
    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Echoes the command back on stdout; `sleep` commands time out.
    #[derive(Default)]
    struct FakeShell {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Shell for FakeShell {
        async fn run(&self, cmd: &str, timeout: Duration) -> Result<ShellOutput> {
            self.ran.lock().unwrap().push(cmd.to_string());
            if cmd.starts_with("sleep") {
                return Err(AgentError::Timeout {
                    cmd: cmd.to_string(),
                    timeout,
                });
            }
            Ok(ShellOutput {
                stdout: format!("ran: {cmd}\n"),
                stderr: String::new(),
                code: 0,
            })
        }
    }

    #[async_trait]
    impl Shell for Arc<FakeShell> {
        async fn run(&self, cmd: &str, timeout: Duration) -> Result<ShellOutput> {
            (**self).run(cmd, timeout).await
        }
    }

    /// In-memory files; paths under `/locked` exist but cannot be read.
    #[derive(Default)]
    struct FakeFiles {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    #[async_trait]
    impl FileStore for FakeFiles {
        async fn exists(&self, path: &Path) -> bool {
            path.starts_with("/locked") || self.files.lock().unwrap().contains_key(path)
        }

        async fn read_to_string(&self, path: &Path) -> Result<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| {
                    AgentError::io(path, std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                })
        }

        async fn write(&self, path: &Path, content: &str) -> Result<()> {
            if path.as_os_str().is_empty() {
                return Err(AgentError::io(
                    path,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
            Ok(())
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<FakeShell>) {
        let shell = Arc::new(FakeShell::default());
        (Dispatcher::new(shell.clone(), FakeFiles::default()), shell)
    }

    fn post(path: &str, body: Value) -> RequestEnvelope {
        RequestEnvelope::from_bytes(Method::POST, path, body.to_string())
    }

    async fn post_json(d: &Dispatcher, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = d.handle(post(path, body)).await;
        (resp.status, resp.json_body().unwrap())
    }

    #[tokio::test]
    async fn test_get_is_liveness_on_any_path() {
        let (d, shell) = dispatcher();
        for path in ["/", "/cmd", "/anything/else"] {
            let req = RequestEnvelope::from_bytes(Method::GET, path, "{not json");
            let resp = d.handle(req).await;
            assert_eq!(resp.status, StatusCode::OK);
            assert_eq!(resp.content_type, None);
            assert_eq!(&resp.body[..], LIVENESS_TEXT.as_bytes());
        }
        assert!(shell.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cmd() {
        let (d, _) = dispatcher();
        let resp = d.handle(post("/cmd", json!({"cmd": "uptime"}))).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type, Some(JSON_CONTENT_TYPE));
        assert_eq!(
            resp.json_body().unwrap(),
            json!({"stdout": "ran: uptime\n", "stderr": "", "code": 0})
        );
    }

    #[tokio::test]
    async fn test_cmd_default_command() {
        let (d, shell) = dispatcher();
        let (status, _) = post_json(&d, "/cmd", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shell.ran.lock().unwrap().as_slice(), [r#"echo "no command""#]);
    }

    #[tokio::test]
    async fn test_cmd_without_body() {
        let (d, shell) = dispatcher();
        let resp = d
            .handle(RequestEnvelope::from_bytes(Method::POST, "/cmd", ""))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(shell.ran.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cmd_timeout_is_500() {
        let (d, _) = dispatcher();
        let (status, body) = post_json(&d, "/cmd", json!({"cmd": "sleep 400"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
        assert!(body.get("stdout").is_none());

        let (status, _) = post_json(&d, "/cmd", json!({"cmd": "true"})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cmd_uses_configured_timeout() {
        let (d, _) = dispatcher();
        let d = d.with_timeouts(Duration::from_secs(2), Duration::from_secs(1));
        let (_, body) = post_json(&d, "/cmd", json!({"cmd": "sleep 9"})).await;
        assert_eq!(body["error"], "Command 'sleep 9' timed out after 2 seconds");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (d, _) = dispatcher();
        let (status, body) =
            post_json(&d, "/write", json!({"path": "/tmp/x", "content": "hello"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (status, body) = post_json(&d, "/read", json!({"path": "/tmp/x"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"content": "hello", "ok": true}));
    }

    #[tokio::test]
    async fn test_read_missing_is_in_band() {
        let (d, _) = dispatcher();
        let (status, body) = post_json(&d, "/read", json!({"path": "/nope"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "File not found", "ok": false}));
    }

    #[tokio::test]
    async fn test_read_unreadable_is_500() {
        let (d, _) = dispatcher();
        let (status, body) = post_json(&d, "/read", json!({"path": "/locked/file"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("/locked/file"));
    }

    #[tokio::test]
    async fn test_write_failure_is_500() {
        let (d, _) = dispatcher();
        let (status, body) = post_json(&d, "/write", json!({"content": "x"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_status() {
        let (d, shell) = dispatcher();
        let (status, body) = post_json(&d, "/status", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let obj = body.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["cpu", "disk", "mem"]);
        assert_eq!(shell.ran.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_status_ignores_non_object_body() {
        let (d, _) = dispatcher();
        let (status, _) = post_json(&d, "/status", json!([1, 2, 3])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let (d, _) = dispatcher();
        for path in ["/", "/cmd/", "/exec", "/read?path=x"] {
            let (status, body) = post_json(&d, path, json!({})).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"error": "Unknown endpoint"}));
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_500() {
        let (d, shell) = dispatcher();
        let resp = d
            .handle(RequestEnvelope::from_bytes(Method::POST, "/cmd", "{\"cmd\": "))
            .await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.content_type, None);
        assert!(resp.json_body().unwrap()["error"].is_string());
        assert!(shell.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_object_params_is_500() {
        let (d, shell) = dispatcher();
        let (status, body) = post_json(&d, "/cmd", json!(["ls"])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("an array"));
        assert!(shell.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_param_type_is_500() {
        let (d, _) = dispatcher();
        let (status, _) = post_json(&d, "/read", json!({"path": 42})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_without_content_length_is_ignored() {
        let (d, shell) = dispatcher();
        let req = RequestEnvelope::new(
            Method::POST,
            "/cmd",
            HeaderMap::new(),
            axum::body::Body::from(r#"{"cmd": "reboot"}"#),
        );
        let resp = d.handle(req).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(shell.ran.lock().unwrap().as_slice(), [r#"echo "no command""#]);
    }

    #[tokio::test]
    async fn test_body_truncated_to_content_length() {
        let (d, shell) = dispatcher();
        let mut req = RequestEnvelope::from_bytes(Method::POST, "/cmd", r#"{"cmd": "ls"}trailing"#);
        req.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(r#"{"cmd": "ls"}"#.len()));
        let resp = d.handle(req).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(shell.ran.lock().unwrap().as_slice(), ["ls"]);
    }

    #[tokio::test]
    async fn test_invalid_content_length_is_500() {
        let (d, _) = dispatcher();
        let mut req = post("/cmd", json!({}));
        req.headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("ten"));
        let resp = d.handle(req).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (d, _) = dispatcher();
        let resp = d
            .handle(RequestEnvelope::from_bytes(Method::PUT, "/cmd", ""))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(&resp.body[..], b"Unsupported method ('PUT')");
    }

    #[tokio::test]
    async fn test_authorizer_rejects_post_but_not_get() {
        let (d, shell) = dispatcher();
        let d = d.with_authorizer(BearerToken::new("tok"));

        let (status, body) = post_json(&d, "/cmd", json!({"cmd": "id"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized"}));
        assert!(shell.ran.lock().unwrap().is_empty());

        let mut req = post("/cmd", json!({"cmd": "id"}));
        req.headers
            .insert("authorization", HeaderValue::from_static("Bearer tok"));
        assert_eq!(d.handle(req).await.status, StatusCode::OK);

        let resp = d
            .handle(RequestEnvelope::from_bytes(Method::GET, "/", ""))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    #[test]
    fn test_from_config_builds() {
        let config = AgentConfig {
            token: Some("tok".into()),
            ..Default::default()
        };
        let d = Dispatcher::from_config(&config);
        assert_eq!(d.cmd_timeout, config.cmd_timeout);
        assert_eq!(d.status_timeout, config.status_timeout);
    }
}
