// ABOUTME: Configuration module for the Sofia AI server
// ABOUTME: Environment-driven settings composed into a single ServerConfig
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Configuration is read once at startup from environment variables. Each
//! component owns the struct for its own settings (`LlmConfig`,
//! `QuotaPolicy`, `DispatchConfig`, `SerperConfig`); this module composes them.

/// Environment and server configuration
pub mod environment;

pub use environment::{Environment, ServerConfig, DEFAULT_DATABASE_URL};
