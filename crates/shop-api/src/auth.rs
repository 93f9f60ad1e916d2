//! # Admin Authentication
//!
//! A single shared admin credential from the environment. A successful
//! login sets an HTTP-only `admin_session` cookie holding a token derived
//! from the credential; [`RequireAdmin`] checks that cookie on admin routes.

use crate::cookies::read_cookie;
use crate::handlers::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use shop_core::secure::constant_time_eq;
use shop_core::{StoreError, StoreResult};

pub const ADMIN_SESSION_COOKIE: &str = "admin_session";

const ADMIN_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const ADMIN_LOGIN_PATH: &str = "/admin/login";

/// The shared admin credential
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    username: String,
    password: Option<SecretString>,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: None,
        }
    }
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(SecretString::from(password.into())),
        }
    }

    /// `ADMIN_USERNAME` (default `admin`) and `ADMIN_PASSWORD`
    pub fn from_env() -> Self {
        Self {
            username: std::env::var("ADMIN_USERNAME")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            password: std::env::var("ADMIN_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty())
                .map(SecretString::from),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.password.is_some()
    }

    /// Check a login attempt. Both fields are compared in constant time.
    pub fn verify(&self, username: &str, password: &str) -> StoreResult<()> {
        let expected = self
            .password
            .as_ref()
            .map(|p| p.expose_secret())
            .ok_or_else(|| StoreError::Configuration("Admin login is not configured".to_string()))?;

        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, expected);
        if user_ok && pass_ok {
            Ok(())
        } else {
            Err(StoreError::Unauthorized("Invalid credentials".to_string()))
        }
    }

    /// Session token for the current credential; `None` when unconfigured
    pub fn session_token(&self) -> Option<String> {
        let password = self.password.as_ref()?.expose_secret();
        let mut mac = Hmac::<Sha256>::new_from_slice(password.as_bytes()).ok()?;
        mac.update(ADMIN_SESSION_COOKIE.as_bytes());
        mac.update(b":");
        mac.update(self.username.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Whether the request carries a valid session cookie
    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        match (read_cookie(headers, ADMIN_SESSION_COOKIE), self.session_token()) {
            (Some(presented), Some(expected)) => constant_time_eq(&presented, &expected),
            _ => false,
        }
    }

    /// `admin_session` cookie issued on login
    pub fn session_cookie(&self, secure: bool) -> StoreResult<Cookie<'static>> {
        let token = self
            .session_token()
            .ok_or_else(|| StoreError::Configuration("Admin login is not configured".to_string()))?;
        Ok(Cookie::build((ADMIN_SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(secure)
            .max_age(Duration::seconds(ADMIN_SESSION_MAX_AGE_SECS))
            .build())
    }
}

/// Extractor that requires an admin session.
///
/// API paths get 401 JSON; anything else is redirected to the login page.
pub struct RequireAdmin;

/// Rejection for [`RequireAdmin`]
pub enum AdminAuthRejection {
    RedirectToLogin,
    Unauthorized,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(ADMIN_LOGIN_PATH).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized", 401)),
            )
                .into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.admin.is_authenticated(&parts.headers) {
            return Ok(Self);
        }

        // Nested routers see a stripped URI
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path())
            .unwrap_or_else(|| parts.uri.path());

        if path.starts_with("/api/") {
            Err(AdminAuthRejection::Unauthorized)
        } else {
            Err(AdminAuthRejection::RedirectToLogin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", ADMIN_SESSION_COOKIE, value)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_verify_credentials() {
        let admin = AdminCredentials::new("admin", "hunter2");

        assert!(admin.verify("admin", "hunter2").is_ok());
        assert!(matches!(
            admin.verify("admin", "hunter3"),
            Err(StoreError::Unauthorized(_))
        ));
        assert!(matches!(
            admin.verify("root", "hunter2"),
            Err(StoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_unconfigured_login_is_a_server_error() {
        let admin = AdminCredentials::default();

        let err = admin.verify("admin", "anything").unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(admin.session_token().is_none());
        assert!(!admin.is_authenticated(&with_cookie("authenticated")));
    }

    #[test]
    fn test_session_token_authenticates() {
        let admin = AdminCredentials::new("admin", "hunter2");
        let token = admin.session_token().unwrap();

        assert_eq!(token.len(), 64);
        assert!(admin.is_authenticated(&with_cookie(&token)));
        assert!(!admin.is_authenticated(&with_cookie("authenticated")));
        assert!(!admin.is_authenticated(&HeaderMap::new()));

        // Rotating the password invalidates old sessions
        let rotated = AdminCredentials::new("admin", "correct horse");
        assert!(!rotated.is_authenticated(&with_cookie(&token)));
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = AdminCredentials::new("admin", "hunter2")
            .session_cookie(true)
            .unwrap();

        assert_eq!(cookie.name(), ADMIN_SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", AdminCredentials::new("admin", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
