// ABOUTME: Conversions from third-party error types into AppError
// ABOUTME: Maps storage and HTTP client failures onto the right ErrorCode family
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

use super::AppError;

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record"),
            other => Self::database(format!("Database operation failed: {other}")),
        }
    }
}

#[cfg(feature = "provider-errors")]
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        let service = error
            .url()
            .and_then(|url| url.host_str())
            .unwrap_or("upstream")
            .to_owned();

        // URLs may carry credentials in their query; only the host is kept
        let is_unavailable = error.is_timeout() || error.is_connect();
        let message = error.without_url().to_string();
        if is_unavailable {
            Self::external_unavailable(service, message)
        } else {
            Self::external_service(service, message)
        }
    }
}
