// ABOUTME: Core data models shared by storage, dispatch and HTTP layers
// ABOUTME: Defines User, ConversationTurn, TurnSender and library entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Data Models
//!
//! Plain data carried between the storage layer and the request pipeline.
//! Quota counters live on the `users` row but are only touched through
//! [`crate::quota::QuotaStore`], so they are not part of [`User`].

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Login email
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// Active session identifier issued at login
    pub session_id: Option<String>,
    /// Administrator flag
    pub is_admin: bool,
    /// Paid plan flag
    pub is_premium: bool,
    /// Email verified flag
    pub is_verified: bool,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new unprivileged, verified user
    #[must_use]
    pub fn new(email: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name,
            session_id: None,
            is_admin: false,
            is_premium: false,
            is_verified: true,
            created_at: Utc::now(),
        }
    }

    /// Premium and admin users bypass usage quotas
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        self.is_admin || self.is_premium
    }
}

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnSender {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl TurnSender {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl Display for TurnSender {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnSender {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            // Older clients stored assistant turns under "ai"
            "assistant" | "ai" => Ok(Self::Assistant),
            other => Err(AppError::database(format!("Unknown turn sender: {other}"))),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who wrote the turn
    pub sender: TurnSender,
    /// Turn text
    pub text: String,
}

impl ConversationTurn {
    /// A user turn
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: TurnSender::User,
            text: text.into(),
        }
    }

    /// An assistant turn
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: TurnSender::Assistant,
            text: text.into(),
        }
    }
}

/// A document stored in a user's private library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    /// Item identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Original file name shown as the snippet source
    pub filename: String,
    /// Plain text extracted at upload time
    pub extracted_text: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_flags() {
        let mut user = User::new("a@example.com", None);
        assert!(!user.is_privileged());
        user.is_premium = true;
        assert!(user.is_privileged());
        user.is_premium = false;
        user.is_admin = true;
        assert!(user.is_privileged());
    }

    #[test]
    fn test_turn_sender_parsing() {
        assert_eq!("user".parse::<TurnSender>().unwrap(), TurnSender::User);
        assert_eq!("ai".parse::<TurnSender>().unwrap(), TurnSender::Assistant);
        assert!("robot".parse::<TurnSender>().is_err());
    }
}
