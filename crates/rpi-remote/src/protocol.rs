//! Wire types for rpi-remote.
//!
//! Request/response envelopes exchanged between the listener and the
//! dispatcher, plus the parameter and result shapes of each operation.

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Plain-text body answered to every GET.
pub const LIVENESS_TEXT: &str = "rpi-remote ok";

/// Command run by `/cmd` when the body carries no `cmd`.
pub const DEFAULT_CMD: &str = r#"echo "no command""#;

/// Body of the in-band answer to an unrouted POST.
pub const UNKNOWN_ENDPOINT: &str = "Unknown endpoint";

/// Body of the in-band answer to `/read` on a missing path.
pub const FILE_NOT_FOUND: &str = "File not found";

/// Content type set on successful operation responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Normalized inbound request.
#[derive(Debug)]
pub struct RequestEnvelope {
    /// HTTP method.
    pub method: Method,
    /// Request target as sent, query string included.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Unread request body. Only POST handling consumes it.
    pub body: Body,
}

impl RequestEnvelope {
    /// Wrap the parts of an inbound request.
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    /// Build a request the way a client would send it, with `Content-Length`
    /// set from `body` when it is non-empty.
    pub fn from_bytes(method: Method, path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let mut headers = HeaderMap::new();
        if !body.is_empty() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        Self::new(method, path, headers, Body::from(body))
    }
}

/// Normalized outbound response, written once to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// HTTP status.
    pub status: StatusCode,
    /// `Content-Type` header, if any.
    pub content_type: Option<&'static str>,
    /// Serialized body.
    pub body: Bytes,
}

impl ResponseEnvelope {
    /// The GET health-check answer.
    pub fn liveness() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(LIVENESS_TEXT.as_bytes()),
        }
    }

    /// A 200 carrying an already serialized operation result.
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(JSON_CONTENT_TYPE),
            body: Bytes::from(body),
        }
    }

    /// A dispatcher-level failure: `{"error": message}` with no content type.
    pub fn failure(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody { error: message })
            .unwrap_or_else(|_| br#"{"error": "internal error"}"#.to_vec());
        Self {
            status,
            content_type: None,
            body: Bytes::from(body),
        }
    }

    /// Answer for methods the listener does not serve.
    pub fn unsupported_method(method: &Method) -> Self {
        Self {
            status: StatusCode::NOT_IMPLEMENTED,
            content_type: None,
            body: Bytes::from(format!("Unsupported method ('{}')", method)),
        }
    }

    /// Parse the body as JSON. Returns `None` for non-JSON bodies.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// `{"error": ...}` body.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    /// Human-readable error message.
    pub error: &'a str,
}

/// Operation selected by exact path match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `/cmd`
    Cmd,
    /// `/read`
    Read,
    /// `/write`
    Write,
    /// `/status`
    Status,
    /// Anything else.
    Unknown,
}

impl Endpoint {
    /// Route a request target. No prefix matching, no trailing-slash
    /// normalization, no query stripping.
    pub fn from_path(path: &str) -> Self {
        match path {
            "/cmd" => Self::Cmd,
            "/read" => Self::Read,
            "/write" => Self::Write,
            "/status" => Self::Status,
            _ => Self::Unknown,
        }
    }
}

// Parameter types for the operations

fn default_cmd() -> String {
    DEFAULT_CMD.to_string()
}

/// Parameters for `/cmd`.
#[derive(Debug, Deserialize)]
pub struct CmdParams {
    /// Shell command line, interpreted by `sh -c`.
    #[serde(default = "default_cmd")]
    pub cmd: String,
}

/// Parameters for `/read`.
#[derive(Debug, Deserialize)]
pub struct ReadParams {
    /// Path to read, relative to the working directory if not absolute.
    #[serde(default)]
    pub path: String,
}

/// Parameters for `/write`.
#[derive(Debug, Deserialize)]
pub struct WriteParams {
    /// Path to write.
    #[serde(default)]
    pub path: String,
    /// Text written in place of the previous content.
    #[serde(default)]
    pub content: String,
}

// Result types for the operations

/// Result of `/cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdResult {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit status; `-N` when killed by signal `N`.
    pub code: i32,
}

/// Result of `/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReadResult {
    /// File was read.
    Found {
        /// Full file contents.
        content: String,
        /// Always `true`.
        ok: bool,
    },
    /// Path does not exist.
    Missing {
        /// Always [`FILE_NOT_FOUND`].
        error: &'static str,
        /// Always `false`.
        ok: bool,
    },
}

impl ReadResult {
    /// Successful read.
    pub fn found(content: String) -> Self {
        Self::Found { content, ok: true }
    }

    /// Path does not exist.
    pub fn missing() -> Self {
        Self::Missing {
            error: FILE_NOT_FOUND,
            ok: false,
        }
    }
}

/// Result of `/write`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    /// Always `true`; failures never reach the wire as a result.
    pub ok: bool,
}

/// Result of `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Used/total memory as printed by `free`.
    pub mem: String,
    /// CPU summary line from `top`.
    pub cpu: String,
    /// Used/total on `/` as printed by `df`.
    pub disk: String,
}
