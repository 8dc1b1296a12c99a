// ABOUTME: Core types and constants for the Sofia AI chat backend
// ABOUTME: Foundation crate with error handling, quota limits, and user-facing messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

#![deny(unsafe_code)]

//! # Sofia Core
//!
//! Foundation crate shared by the server crate. It changes rarely, which keeps
//! incremental builds of the server fast.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Quota limits, retry defaults and fixed user-facing messages

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
