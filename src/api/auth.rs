//! Caller identity.
//!
//! The service runs behind a gateway that terminates the identity provider's
//! session and forwards the provider's user id in a header. Handlers take a
//! [`CurrentUser`] to require an identified, provisioned user.

use super::error::ApiError;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::utils::logging;
use crate::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub header: HeaderName,
    pub enable_test_auth: bool,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let header = HeaderName::from_bytes(config.auth_header.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid auth header '{}': {}", config.auth_header, e)))?;
        Ok(Self {
            header,
            enable_test_auth: config.enable_test_auth,
        })
    }
}

/// The authenticated, provisioned caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(test_user_id) = test_user_id(parts, &state.auth) {
            if let Some(user) = state.db.find_user_by_external_id(&test_user_id).await? {
                logging::log_auth_event("Test authentication", &test_user_id);
                return Ok(CurrentUser(user));
            }
        }

        let external_id = header_identity(&parts.headers, &state.auth.header)
            .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

        let user = state
            .db
            .find_user_by_external_id(&external_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(CurrentUser(user))
    }
}

fn header_identity(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `testUserId` query override, only in debug builds with test auth enabled.
#[cfg(debug_assertions)]
fn test_user_id(parts: &Parts, settings: &AuthSettings) -> Option<String> {
    if !settings.enable_test_auth {
        return None;
    }
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "testUserId")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(not(debug_assertions))]
fn test_user_id(_parts: &Parts, _settings: &AuthSettings) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn settings(enable_test_auth: bool) -> AuthSettings {
        AuthSettings {
            header: HeaderName::from_static("x-auth-user-id"),
            enable_test_auth,
        }
    }

    fn parts_for(uri: &str) -> Parts {
        let (parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_header_identity_trims_and_rejects_blank() {
        let header = HeaderName::from_static("x-auth-user-id");
        let mut headers = HeaderMap::new();
        assert_eq!(header_identity(&headers, &header), None);

        headers.insert(header.clone(), HeaderValue::from_static("  "));
        assert_eq!(header_identity(&headers, &header), None);

        headers.insert(header.clone(), HeaderValue::from_static(" user_2abc "));
        assert_eq!(header_identity(&headers, &header), Some("user_2abc".to_string()));
    }

    #[test]
    fn test_test_user_override_requires_flag() {
        let parts = parts_for("/api/meetings/upcoming?page=2&testUserId=user_test");
        assert_eq!(test_user_id(&parts, &settings(false)), None);

        if cfg!(debug_assertions) {
            assert_eq!(test_user_id(&parts, &settings(true)), Some("user_test".to_string()));
        } else {
            assert_eq!(test_user_id(&parts, &settings(true)), None);
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            auth_header: "x-forwarded-user".to_string(),
            ..Config::default()
        };
        let settings = AuthSettings::from_config(&config).unwrap();
        assert_eq!(settings.header.as_str(), "x-forwarded-user");
        assert!(!settings.enable_test_auth);
    }
}
