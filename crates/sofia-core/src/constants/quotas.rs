// ABOUTME: Default per-user usage limits for non-privileged accounts
// ABOUTME: Premium and admin users bypass every limit in this module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

/// Chat messages per calendar month
pub const MESSAGES_PER_MONTH: u32 = 500;

/// Web searches per calendar day
pub const WEB_SEARCHES_PER_DAY: u32 = 1;

/// Document uploads read per calendar month
pub const DOCUMENT_READS_PER_MONTH: u32 = 1;

/// Cumulative document pages read per calendar month
pub const DOCUMENT_PAGES_PER_MONTH: u32 = 5;

/// Voice commands per calendar day
pub const VOICE_COMMANDS_PER_DAY: u32 = 5;
