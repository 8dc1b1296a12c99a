// ABOUTME: Re-exports the unified error types from sofia-core
// ABOUTME: Keeps `crate::errors::*` paths stable for every server module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Unified Error Handling System
//!
//! The error types live in the `sofia-core` crate so that they change rarely
//! and compile once. This module re-exports them for the server crate.

pub use sofia_core::errors::{AppError, AppResult, ErrorCode, ErrorResponse, ErrorResponseDetails};
