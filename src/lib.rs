pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    backend_client::{HttpResultsBackend, ResultsBackend},
    results_service::ResultsService,
};
use tokio_util::sync::CancellationToken;

/// Everything a request handler needs. Built once at startup and handed to
/// the router; `shutdown` is the root of every per-request cancellation token.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub results_service: ResultsService,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let backend = HttpResultsBackend::new(
            &config.backend_base_url,
            config.backend_api_token.clone(),
            config.request_timeout,
        )?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn ResultsBackend>) -> Self {
        let results_service =
            ResultsService::new(backend, config.walk_concurrency, config.request_timeout);

        Self {
            config: Arc::new(config),
            results_service,
            shutdown: CancellationToken::new(),
        }
    }
}
