// ABOUTME: Per-user, per-period usage quotas with reset-on-rollover semantics
// ABOUTME: Gates messages, web searches, document reads and voice commands for free accounts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Quota Tracker
//!
//! Each consumable action has a counter and a period marker on the user record.
//! A check first rolls the counter over when the stored marker is not the current
//! period, then asks the store for a conditional increment. The store performs
//! the comparison and the increment in one statement, so concurrent requests for
//! the same user can never push a counter past its limit.
//!
//! Privileged users (premium or admin) bypass every check without touching
//! their counters.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::constants::{env_config, quotas};
use crate::errors::AppResult;
use crate::logging::AppLogger;

/// Reset granularity of a quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    /// Resets at the start of every UTC day
    Daily,
    /// Resets at the start of every UTC month
    Monthly,
}

impl QuotaPeriod {
    /// Identifier of the period containing `now` (`YYYY-MM-DD` or `YYYY-MM`)
    #[must_use]
    pub fn identifier(self, now: DateTime<Utc>) -> String {
        match self {
            Self::Daily => now.format("%Y-%m-%d").to_string(),
            Self::Monthly => now.format("%Y-%m").to_string(),
        }
    }
}

/// An action that consumes quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaAction {
    /// A chat message
    Message,
    /// A web search run while gathering context
    WebSearch,
    /// An uploaded document read by the model
    DocumentRead,
    /// A voice command
    VoiceCommand,
}

impl QuotaAction {
    /// All actions, in display order
    pub const ALL: [Self; 4] = [
        Self::Message,
        Self::WebSearch,
        Self::DocumentRead,
        Self::VoiceCommand,
    ];

    /// Reset granularity of this action
    #[must_use]
    pub const fn period(self) -> QuotaPeriod {
        match self {
            Self::Message | Self::DocumentRead => QuotaPeriod::Monthly,
            Self::WebSearch | Self::VoiceCommand => QuotaPeriod::Daily,
        }
    }

    /// Stable name used in logs and API payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::WebSearch => "web_search",
            Self::DocumentRead => "document_read",
            Self::VoiceCommand => "voice_command",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Message => "messages",
            Self::WebSearch => "web searches",
            Self::DocumentRead => "document reads",
            Self::VoiceCommand => "voice commands",
        }
    }
}

impl Display for QuotaAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Limits applied to non-privileged users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Messages per month
    pub messages_per_month: u32,
    /// Web searches per day
    pub web_searches_per_day: u32,
    /// Document reads per month
    pub document_reads_per_month: u32,
    /// Cumulative document pages per month
    pub document_pages_per_month: u32,
    /// Voice commands per day
    pub voice_commands_per_day: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            messages_per_month: quotas::MESSAGES_PER_MONTH,
            web_searches_per_day: quotas::WEB_SEARCHES_PER_DAY,
            document_reads_per_month: quotas::DOCUMENT_READS_PER_MONTH,
            document_pages_per_month: quotas::DOCUMENT_PAGES_PER_MONTH,
            voice_commands_per_day: quotas::VOICE_COMMANDS_PER_DAY,
        }
    }
}

impl QuotaPolicy {
    /// Load limits from environment variables, falling back to the defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            messages_per_month: env_u32(
                env_config::QUOTA_MESSAGES_PER_MONTH,
                defaults.messages_per_month,
            ),
            web_searches_per_day: env_u32(
                env_config::QUOTA_WEB_SEARCHES_PER_DAY,
                defaults.web_searches_per_day,
            ),
            document_reads_per_month: env_u32(
                env_config::QUOTA_DOCUMENT_READS_PER_MONTH,
                defaults.document_reads_per_month,
            ),
            document_pages_per_month: env_u32(
                env_config::QUOTA_DOCUMENT_PAGES_PER_MONTH,
                defaults.document_pages_per_month,
            ),
            voice_commands_per_day: env_u32(
                env_config::QUOTA_VOICE_COMMANDS_PER_DAY,
                defaults.voice_commands_per_day,
            ),
        }
    }

    /// Limit for a single action
    #[must_use]
    pub const fn limit_for(&self, action: QuotaAction) -> u32 {
        match action {
            QuotaAction::Message => self.messages_per_month,
            QuotaAction::WebSearch => self.web_searches_per_day,
            QuotaAction::DocumentRead => self.document_reads_per_month,
            QuotaAction::VoiceCommand => self.voice_commands_per_day,
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Why a quota check refused the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDenial {
    /// Action that was refused
    pub action: QuotaAction,
    /// Human-readable reason
    pub reason: String,
    /// Usage recorded for the current period
    pub current_usage: u32,
    /// Limit for the current period
    pub limit: u32,
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The action was admitted and its counter incremented (unless privileged)
    Allowed,
    /// The action was refused and nothing was consumed
    Denied(QuotaDenial),
}

impl QuotaDecision {
    /// Whether the action may proceed
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Snapshot of every counter on a user record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Messages used this month
    pub messages_used: u32,
    /// Marker of the stored message period
    pub message_reset_month: Option<String>,
    /// Web searches used today
    pub web_searches_used: u32,
    /// Marker of the stored web search period
    pub web_search_reset_day: Option<String>,
    /// Document reads used this month
    pub document_reads_used: u32,
    /// Document pages read this month
    pub document_pages_read: u32,
    /// Marker of the stored document period
    pub document_reset_month: Option<String>,
    /// Voice commands used today
    pub voice_commands_used: u32,
    /// Marker of the stored voice command period
    pub voice_command_reset_day: Option<String>,
}

/// Persistence for quota counters
///
/// Implementations must make `reset_if_stale` idempotent and make every
/// `try_*` method a single conditional update.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Zero the action's counters and store `period_id` if the stored marker differs
    async fn reset_if_stale(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        period_id: &str,
    ) -> AppResult<()>;

    /// Increment the action's counter if it is below `limit`
    ///
    /// Returns the new value, or `None` when the limit was already reached.
    async fn try_increment(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        limit: u32,
    ) -> AppResult<Option<u32>>;

    /// Consume one document read and `pages` pages if both stay within bounds
    async fn try_consume_document(
        &self,
        user_id: Uuid,
        pages: u32,
        read_limit: u32,
        page_limit: u32,
    ) -> AppResult<bool>;

    /// Give back one unit of the action's counter, never going below zero
    async fn release(&self, user_id: Uuid, action: QuotaAction) -> AppResult<()>;

    /// Read every counter for display
    async fn usage_snapshot(&self, user_id: Uuid) -> AppResult<UsageSnapshot>;
}

/// Per-action usage with its limit, for the usage endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionUsage {
    /// Action
    pub action: QuotaAction,
    /// Reset granularity
    pub period: QuotaPeriod,
    /// Usage in the current period
    pub used: u32,
    /// Limit, `None` for privileged users
    pub limit: Option<u32>,
}

/// Usage report for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Whether limits apply
    pub unlimited: bool,
    /// One entry per action
    pub actions: Vec<ActionUsage>,
    /// Document pages read this month
    pub document_pages_read: u32,
    /// Monthly document page limit, `None` for privileged users
    pub document_pages_limit: Option<u32>,
}

/// Gatekeeper for consumable actions
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
    policy: QuotaPolicy,
}

impl QuotaTracker {
    /// Create a tracker over a store with the given limits
    #[must_use]
    pub fn new(store: Arc<dyn QuotaStore>, policy: QuotaPolicy) -> Self {
        Self { store, policy }
    }

    /// Limits in force
    #[must_use]
    pub const fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Check and consume one unit of `action` for the current period
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn check_and_consume(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        is_privileged: bool,
    ) -> AppResult<QuotaDecision> {
        self.check_and_consume_at(user_id, action, is_privileged, Utc::now())
            .await
    }

    /// Same as [`Self::check_and_consume`] with an explicit clock reading
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn check_and_consume_at(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        is_privileged: bool,
        now: DateTime<Utc>,
    ) -> AppResult<QuotaDecision> {
        if is_privileged {
            return Ok(QuotaDecision::Allowed);
        }

        let period_id = action.period().identifier(now);
        self.store
            .reset_if_stale(user_id, action, &period_id)
            .await?;

        let limit = self.policy.limit_for(action);
        if let Some(used) = self.store.try_increment(user_id, action, limit).await? {
            debug!(user.id = %user_id, quota.action = %action, quota.used = used, "Quota consumed");
            return Ok(QuotaDecision::Allowed);
        }

        let snapshot = self.store.usage_snapshot(user_id).await?;
        let current_usage = Self::used_for(&snapshot, action);
        AppLogger::log_quota_denied(user_id, action.as_str(), current_usage, limit);

        Ok(QuotaDecision::Denied(QuotaDenial {
            action,
            reason: format!(
                "You have used all {limit} {} for this {}.",
                action.label(),
                Self::period_noun(action.period())
            ),
            current_usage,
            limit,
        }))
    }

    /// Return one unit consumed by [`Self::check_and_consume`]
    ///
    /// Used when a later gate refuses the request, so nothing was dispatched.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn release(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        is_privileged: bool,
    ) -> AppResult<()> {
        if is_privileged {
            return Ok(());
        }
        self.store.release(user_id, action).await?;
        debug!(user.id = %user_id, quota.action = %action, "Quota released");
        Ok(())
    }

    /// Check and consume one document read covering `pages` pages
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn check_and_consume_document(
        &self,
        user_id: Uuid,
        pages: u32,
        is_privileged: bool,
    ) -> AppResult<QuotaDecision> {
        self.check_and_consume_document_at(user_id, pages, is_privileged, Utc::now())
            .await
    }

    /// Same as [`Self::check_and_consume_document`] with an explicit clock reading
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn check_and_consume_document_at(
        &self,
        user_id: Uuid,
        pages: u32,
        is_privileged: bool,
        now: DateTime<Utc>,
    ) -> AppResult<QuotaDecision> {
        if is_privileged {
            return Ok(QuotaDecision::Allowed);
        }

        let action = QuotaAction::DocumentRead;
        let period_id = action.period().identifier(now);
        self.store
            .reset_if_stale(user_id, action, &period_id)
            .await?;

        let read_limit = self.policy.document_reads_per_month;
        let page_limit = self.policy.document_pages_per_month;
        if self
            .store
            .try_consume_document(user_id, pages, read_limit, page_limit)
            .await?
        {
            return Ok(QuotaDecision::Allowed);
        }

        let snapshot = self.store.usage_snapshot(user_id).await?;
        let denial = if snapshot.document_reads_used >= read_limit {
            QuotaDenial {
                action,
                reason: format!("You have used all {read_limit} document reads for this month."),
                current_usage: snapshot.document_reads_used,
                limit: read_limit,
            }
        } else {
            QuotaDenial {
                action,
                reason: format!(
                    "This document has {pages} pages but only {} of your {page_limit} monthly pages remain.",
                    page_limit.saturating_sub(snapshot.document_pages_read)
                ),
                current_usage: snapshot.document_pages_read,
                limit: page_limit,
            }
        };
        AppLogger::log_quota_denied(user_id, action.as_str(), denial.current_usage, denial.limit);

        Ok(QuotaDecision::Denied(denial))
    }

    /// Current usage for display
    ///
    /// Counters whose stored period is not the current one are reported as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store fails
    pub async fn usage_report(
        &self,
        user_id: Uuid,
        is_privileged: bool,
    ) -> AppResult<UsageReport> {
        let snapshot = self.store.usage_snapshot(user_id).await?;
        let now = Utc::now();

        let actions = QuotaAction::ALL
            .iter()
            .map(|&action| {
                let current = action.period().identifier(now);
                let used = if Self::marker_for(&snapshot, action) == Some(current.as_str()) {
                    Self::used_for(&snapshot, action)
                } else {
                    0
                };
                ActionUsage {
                    action,
                    period: action.period(),
                    used,
                    limit: (!is_privileged).then(|| self.policy.limit_for(action)),
                }
            })
            .collect();

        let document_period = QuotaPeriod::Monthly.identifier(now);
        let document_pages_read =
            if snapshot.document_reset_month.as_deref() == Some(document_period.as_str()) {
                snapshot.document_pages_read
            } else {
                0
            };

        Ok(UsageReport {
            unlimited: is_privileged,
            actions,
            document_pages_read,
            document_pages_limit: (!is_privileged).then_some(self.policy.document_pages_per_month),
        })
    }

    const fn used_for(snapshot: &UsageSnapshot, action: QuotaAction) -> u32 {
        match action {
            QuotaAction::Message => snapshot.messages_used,
            QuotaAction::WebSearch => snapshot.web_searches_used,
            QuotaAction::DocumentRead => snapshot.document_reads_used,
            QuotaAction::VoiceCommand => snapshot.voice_commands_used,
        }
    }

    fn marker_for(snapshot: &UsageSnapshot, action: QuotaAction) -> Option<&str> {
        match action {
            QuotaAction::Message => snapshot.message_reset_month.as_deref(),
            QuotaAction::WebSearch => snapshot.web_search_reset_day.as_deref(),
            QuotaAction::DocumentRead => snapshot.document_reset_month.as_deref(),
            QuotaAction::VoiceCommand => snapshot.voice_command_reset_day.as_deref(),
        }
    }

    const fn period_noun(period: QuotaPeriod) -> &'static str {
        match period {
            QuotaPeriod::Daily => "day",
            QuotaPeriod::Monthly => "month",
        }
    }
}
