//! Phone/OTP authentication endpoints.
//!
//! Thin request/response wrappers. A successful login stores credentials in
//! the backend's [`Session`](crate::session::Session).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, ApiErrorKind, ApiResult, Backend};
use crate::session::Credentials;

/// Country prefix added to bare phone numbers.
const COUNTRY_PREFIX: &str = "+91";

/// Error code reported when another device holds the session.
pub const ACTIVE_SESSION_EXISTS: &str = "ACTIVE_SESSION_EXISTS";

/// Normalizes a phone number to include the country prefix.
pub fn format_phone_number(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with(COUNTRY_PREFIX) {
        phone.to_string()
    } else {
        format!("{COUNTRY_PREFIX}{phone}")
    }
}

/// Ten digits, with or without the country prefix.
pub fn is_valid_phone_number(phone: &str) -> bool {
    let phone = phone.trim();
    let digits = phone.strip_prefix(COUNTRY_PREFIX).unwrap_or(phone);
    digits.len() == 10 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Registration details.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub phone_number: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Generic `{success, error, message}` envelope used by the auth endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl Envelope {
    fn into_result(self, fallback: &str) -> ApiResult<Option<String>> {
        if self.success {
            Ok(self.message)
        } else {
            Err(ApiError::new(
                ApiErrorKind::Rejected,
                self.error.unwrap_or_else(|| fallback.to_string()),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "token")]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<Value>,
}

/// Parses the backend's expiry timestamp (RFC 3339, or naive ISO as UTC).
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Auth endpoint client.
#[derive(Debug, Clone)]
pub struct AuthApi {
    backend: Backend,
}

impl AuthApi {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// `POST /auth/send-verification`
    pub async fn send_otp(&self, phone: &str) -> ApiResult<Option<String>> {
        let body = serde_json::json!({ "phone_number": format_phone_number(phone) });
        let reply: Envelope = self
            .backend
            .post_json("/auth/send-verification", &body)
            .await?;
        reply.into_result("Failed to send OTP")
    }

    /// `POST /auth/verify-otp`
    pub async fn verify_otp(&self, phone: &str, code: &str) -> ApiResult<Option<String>> {
        let body = serde_json::json!({
            "phone_number": format_phone_number(phone),
            "code": code.trim(),
        });
        let reply: Envelope = self.backend.post_json("/auth/verify-otp", &body).await?;
        reply.into_result("Failed to verify OTP")
    }

    /// `POST /auth/register`
    pub async fn register(&self, registration: &Registration) -> ApiResult<Option<String>> {
        let registration = Registration {
            phone_number: format_phone_number(&registration.phone_number),
            ..registration.clone()
        };
        let reply: Envelope = self
            .backend
            .post_json("/auth/register", &registration)
            .await?;
        reply.into_result("Failed to register user")
    }

    /// `POST /auth/login`; stores the returned credentials in the session.
    pub async fn login(&self, phone: &str, otp_code: &str, force: bool) -> ApiResult<Credentials> {
        let body = serde_json::json!({
            "phone_number": format_phone_number(phone),
            "otp_code": otp_code.trim(),
            "force_login": force,
        });

        let reply: LoginReply = match self.backend.post_json("/auth/login", &body).await {
            Ok(reply) => reply,
            Err(err) => return Err(explain_login_error(err)),
        };

        if !reply.success {
            return Err(ApiError::new(
                ApiErrorKind::Rejected,
                reply.error.unwrap_or_else(|| "Login failed".to_string()),
            ));
        }

        let token = reply
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::new(ApiErrorKind::Parse, "Login reply has no access_token"))?;
        let expires_at = reply
            .expires_at
            .as_deref()
            .and_then(parse_expiry)
            .or_else(|| {
                reply
                    .expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            })
            .ok_or_else(|| ApiError::new(ApiErrorKind::Parse, "Login reply has no usable expiry"))?;

        let credentials = Credentials {
            token,
            expires_at,
            user: reply.user,
        };
        self.backend.session().login(&credentials).map_err(|err| {
            ApiError::new(
                ApiErrorKind::Parse,
                format!("Failed to store credentials: {err:#}"),
            )
        })?;
        Ok(credentials)
    }

    /// `POST /auth/logout`, then clears local credentials either way.
    pub async fn logout(&self) -> ApiResult<()> {
        let result: ApiResult<Value> = self.backend.post_json("/auth/logout", &()).await;
        self.backend.session().logout();
        result.map(|_| ())
    }

    /// `GET /auth/verify-session`
    pub async fn verify_session(&self) -> ApiResult<()> {
        let _: Value = self.backend.get_json("/auth/verify-session").await?;
        Ok(())
    }
}

fn explain_login_error(mut err: ApiError) -> ApiError {
    match err.status {
        Some(404) => {
            err.message = "User not found. Please register first.".to_string();
        }
        Some(409) => {
            let device = err
                .details
                .as_deref()
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
                .and_then(|json| json.get("deviceInfo").cloned());
            let describe = |key: &str| {
                device
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string()
            };
            err.code = Some(ACTIVE_SESSION_EXISTS.to_string());
            err.message = format!(
                "Already logged in on another device ({} on {}, last login {})",
                describe("browser"),
                describe("os"),
                describe("lastLoginTime"),
            );
        }
        _ => {}
    }
    err
}
