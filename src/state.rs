//! # Application State
//!
//! State shared by every HTTP handler. Configuration and the clients built from it
//! are immutable after startup; the only mutable part is the request metrics
//! table, which lives behind an `RwLock`.
//!
//! ## Sharing pattern:
//! - **Arc<AppConfig>**: read-only config, cloned cheaply into every worker
//! - **BackendClient / TranscriptionPipeline**: `Clone` wrappers around a shared
//!   `reqwest::Client`, so every worker uses one connection pool
//! - **Arc<RwLock<AppMetrics>>**: many readers (`/metrics`), one writer at a time
//!   (the metrics middleware)
//!
//! No per-request data is stored here; each request's scratch artifacts stay
//! private to that request.

use crate::backend::BackendClient;
use crate::config::AppConfig;
use crate::transcription::TranscriptionPipeline;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: BackendClient,
    pub pipeline: TranscriptionPipeline,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Request counters collected by the metrics middleware.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Requests that ended with a 4xx or 5xx status
    pub error_count: u64,

    /// Key: endpoint name (e.g., "POST /transcribe")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the state from a validated configuration.
    ///
    /// The backend client is created once here and handed to the pipeline, so
    /// nothing downstream reads configuration from anywhere but this object.
    pub fn new(config: AppConfig) -> Result<Self> {
        let backend = BackendClient::new(&config.backends)?;
        let pipeline = TranscriptionPipeline::new(&config, backend.clone());

        Ok(Self {
            config: Arc::new(config),
            backend,
            pipeline,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        })
    }

    /// Record one finished request.
    ///
    /// A poisoned lock only means another writer panicked mid-update; the counters
    /// are still usable, so we keep counting instead of propagating the panic.
    pub fn record_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        metrics.request_count += 1;
        if is_error {
            metrics.error_count += 1;
        }

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Copy of the current counters, taken under the read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, from 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
