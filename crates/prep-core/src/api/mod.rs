//! HTTP plumbing shared by the chat and auth endpoints.

pub mod auth;

use std::fmt;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::session::Session;

/// Standard User-Agent header for backend requests.
pub const USER_AGENT: &str = concat!("prep/", env!("CARGO_PKG_VERSION"));

/// Backend error codes that invalidate the stored session.
const SESSION_INVALIDATED: &str = "SESSION_INVALIDATED";
const SESSION_EXPIRED: &str = "SESSION_EXPIRED";
const INVALID_TOKEN: &str = "INVALID_TOKEN";

/// Categories of backend errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Connection refused, DNS failure, or the body stopped mid-read
    Connect,
    /// Failed to parse a response body
    Parse,
    /// The backend answered `{"success": false, ...}`
    Rejected,
    /// No usable credentials for an endpoint that needs them
    Unauthenticated,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Connect => write!(f, "connect"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Rejected => write!(f, "rejected"),
            ApiErrorKind::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// HTTP status, when the backend answered at all
    pub status: Option<u16>,
    /// Machine-readable `code` from the error body
    pub code: Option<String>,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            details: None,
        }
    }

    /// Creates an HTTP status error, pulling a readable message and `code`
    /// out of a JSON body when there is one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let mut error = Self {
            kind: ApiErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            status: Some(status),
            code: None,
            details: (!body.is_empty()).then(|| body.to_string()),
        };

        if let Ok(json) = serde_json::from_str::<Value>(body) {
            error.code = json
                .get("code")
                .or_else(|| json.pointer("/error/code"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let detail = ["/error/message", "/error", "/detail", "/message"]
                .iter()
                .find_map(|pointer| json.pointer(pointer).and_then(Value::as_str));
            if let Some(msg) = detail {
                error.message = format!("HTTP {status}: {msg}");
            }
        }

        error
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthenticated, message)
    }

    /// Whether this response means the stored session is no longer valid.
    pub fn revokes_session(&self) -> bool {
        matches!(
            (self.status, self.code.as_deref()),
            (Some(401), Some(SESSION_INVALIDATED | SESSION_EXPIRED))
                | (Some(403), Some(INVALID_TOKEN))
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::new(ApiErrorKind::Timeout, format!("Request timed out: {err}"))
    } else if err.is_decode() {
        ApiError::new(ApiErrorKind::Parse, format!("Failed to decode response: {err}"))
    } else {
        ApiError::new(ApiErrorKind::Connect, format!("Request failed: {err}"))
    }
}

/// Shared HTTP client bound to one backend and one session.
#[derive(Debug, Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl Backend {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Builds a backend from config (URL precedence and connect timeout).
    pub fn from_config(config: &Config, session: Session) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.effective_backend_url()?,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.get(self.url(path))
    }

    /// Attaches the bearer token when one is stored.
    ///
    /// An expired token logs the session out and fails the request before
    /// it is sent.
    pub(crate) fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ApiResult<reqwest::RequestBuilder> {
        let Some(credentials) = self.session.credentials() else {
            return Ok(builder);
        };
        if credentials.is_expired_at(chrono::Utc::now()) {
            self.session.logout();
            return Err(ApiError::unauthenticated("Session expired"));
        }
        Ok(builder.bearer_auth(credentials.token))
    }

    /// Sends the request and turns non-2xx answers into `ApiError`s.
    ///
    /// Session-revoking answers log the session out on the way.
    pub(crate) async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ApiResult<reqwest::Response> {
        let response = builder
            .header("user-agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ApiError::http_status(status.as_u16(), &body);
        if error.revokes_session() {
            tracing::info!(code = ?error.code, "Backend revoked the session");
            self.session.logout();
        }
        Err(error)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.authorize(self.post(path).json(body))?;
        let response = self.send(builder).await?;
        decode_json(response).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let builder = self.authorize(self.get(path))?;
        let response = self.send(builder).await?;
        decode_json(response).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| classify_reqwest_error(&e))?;
    let bytes = if bytes.is_empty() {
        bytes::Bytes::from_static(b"null")
    } else {
        bytes
    };
    serde_json::from_slice(&bytes).map_err(|err| {
        ApiError::new(
            ApiErrorKind::Parse,
            format!("Failed to parse response: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_extracts_message_and_code() {
        let error = ApiError::http_status(
            401,
            r#"{"code":"SESSION_EXPIRED","error":"Your session has expired"}"#,
        );
        assert_eq!(error.kind, ApiErrorKind::HttpStatus);
        assert_eq!(error.message, "HTTP 401: Your session has expired");
        assert_eq!(error.code.as_deref(), Some("SESSION_EXPIRED"));
        assert!(error.revokes_session());
    }

    #[test]
    fn test_http_status_nested_error_object() {
        let error = ApiError::http_status(
            403,
            r#"{"error":{"code":"INVALID_TOKEN","message":"bad token"}}"#,
        );
        assert_eq!(error.message, "HTTP 403: bad token");
        assert!(error.revokes_session());
    }

    #[test]
    fn test_http_status_plain_body() {
        let error = ApiError::http_status(502, "upstream down");
        assert_eq!(error.message, "HTTP 502");
        assert_eq!(error.details.as_deref(), Some("upstream down"));
        assert!(!error.revokes_session());
    }

    #[test]
    fn test_revocation_needs_matching_status() {
        let error = ApiError::http_status(403, r#"{"code":"SESSION_EXPIRED"}"#);
        assert!(!error.revokes_session());
    }

    #[test]
    fn test_url_joins_paths() {
        let session = crate::session::tests::memory_session(None);
        let backend = Backend::new("http://localhost:8765/api/", session);
        assert_eq!(backend.url("/chat"), "http://localhost:8765/api/chat");
        assert_eq!(
            backend.url("auth/login"),
            "http://localhost:8765/api/auth/login"
        );
    }
}
