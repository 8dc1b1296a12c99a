// ABOUTME: Session authentication for HTTP handlers
// ABOUTME: Resolves a bearer token or session cookie to the user who owns the session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Session Authentication
//!
//! Sessions are issued by the account service outside this server. Handlers
//! only need to map the session id a client presents back to a [`User`]:
//! either as `Authorization: Bearer <session id>` for API clients or as the
//! `session_id` cookie for browsers. The header wins when both are present.

use axum::http::{header, HeaderMap};
use tracing::{debug, instrument};

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::User;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "session_id";

/// Read a cookie value from the `Cookie` headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Session id presented by the client, if any
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    bearer.or_else(|| get_cookie_value(headers, SESSION_COOKIE))
}

/// Maps presented session ids to users
#[derive(Clone)]
pub struct SessionAuth {
    database: Database,
}

impl SessionAuth {
    /// Create an authenticator over the user table
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Authenticate a request from its headers
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when no session id is presented, `AuthInvalid`
    /// when it matches no user, or a database error if the lookup fails
    #[instrument(skip_all, fields(user.id = tracing::field::Empty))]
    pub async fn authenticate(&self, headers: &HeaderMap) -> AppResult<User> {
        let Some(token) = session_token(headers) else {
            AppLogger::log_auth_rejected("missing session");
            return Err(AppError::auth_required());
        };

        let Some(user) = self.database.get_user_by_session(&token).await? else {
            AppLogger::log_auth_rejected("unknown session");
            return Err(AppError::auth_invalid("Session is not valid"));
        };

        tracing::Span::current().record("user.id", user.id.to_string());
        debug!(admin = user.is_admin, premium = user.is_premium, "Request authenticated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_preferred_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=s-123 ; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("s-123"));
        assert_eq!(get_cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_no_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(session_token(&headers), None);
    }
}
