// ABOUTME: Shared server resources injected into every HTTP handler
// ABOUTME: Wires storage, quota tracking, context gathering, dispatch and interaction logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Server Resources
//!
//! Every collaborator of the request pipeline is created once at startup and
//! handed to handlers as `State<Arc<ServerResources>>`. Tests build the same
//! struct with [`ServerResources::with_backends`] to swap in scripted providers
//! and search backends.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::SessionAuth;
use crate::config::ServerConfig;
use crate::context::{ContextGatherer, LibrarySearch, WebSearch};
use crate::database::Database;
use crate::dispatch::ModelDispatcher;
use crate::external::{DisabledWebSearch, SerperClient, TranscriptFetcher, YouTubeTranscripts};
use crate::interaction_log::{InteractionSink, ResponseLogger};
use crate::llm::ProviderSet;
use crate::quota::{QuotaStore, QuotaTracker};

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Storage for users, conversations and logs
    pub database: Database,
    /// Session authentication
    pub auth: SessionAuth,
    /// Quota gate
    pub quotas: Arc<QuotaTracker>,
    /// Retrieval context
    pub gatherer: ContextGatherer,
    /// Model dispatch
    pub dispatcher: ModelDispatcher,
    /// Fire-and-forget interaction log
    pub logger: ResponseLogger,
    /// Effective configuration
    pub config: Arc<ServerConfig>,
}

/// External backends the pipeline talks to
pub struct Backends {
    /// Primary and secondary providers
    pub providers: ProviderSet,
    /// Web search backend
    pub web: Arc<dyn WebSearch>,
    /// Video transcript backend
    pub transcripts: Arc<dyn TranscriptFetcher>,
}

impl Backends {
    /// Real backends for every configured service
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let web: Arc<dyn WebSearch> = match &config.web_search {
            Some(serper) => Arc::new(SerperClient::new(serper.clone())),
            None => Arc::new(DisabledWebSearch),
        };

        Self {
            providers: ProviderSet::from_config(&config.llm),
            web,
            transcripts: Arc::new(YouTubeTranscripts::new()),
        }
    }
}

impl ServerResources {
    /// Build resources with the real external backends
    ///
    /// Returns the interaction log worker handle alongside; it finishes once
    /// every clone of the resources is dropped.
    #[must_use]
    pub fn new(database: Database, config: ServerConfig) -> (Self, JoinHandle<()>) {
        let backends = Backends::from_config(&config);
        Self::with_backends(database, config, backends)
    }

    /// Build resources around explicit backends
    #[must_use]
    pub fn with_backends(
        database: Database,
        config: ServerConfig,
        backends: Backends,
    ) -> (Self, JoinHandle<()>) {
        let quota_store: Arc<dyn QuotaStore> = Arc::new(database.clone());
        let quotas = Arc::new(QuotaTracker::new(quota_store, config.quotas));

        let library: Arc<dyn LibrarySearch> = Arc::new(database.clone());
        let gatherer = ContextGatherer::new(backends.web, library, Arc::clone(&quotas));

        let dispatcher =
            ModelDispatcher::new(backends.providers, backends.transcripts, config.dispatch);

        let sink: Arc<dyn InteractionSink> = Arc::new(database.clone());
        let (logger, worker) = ResponseLogger::spawn(sink, config.interaction_log_capacity);

        let resources = Self {
            auth: SessionAuth::new(database.clone()),
            database,
            quotas,
            gatherer,
            dispatcher,
            logger,
            config: Arc::new(config),
        };
        (resources, worker)
    }
}
