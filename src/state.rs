//! Application state management for the aggregator.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::auth::AuthenticationEnricher;
use crate::config::Config;
use crate::discovery::InstanceDiscovery;
use crate::telemetry::Telemetry;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub config: Arc<Config>,
    /// Shared outbound client, built once with the scrape budget as request
    /// timeout and the configured forward proxy.
    pub client: reqwest::Client,
    /// The one authentication strategy, shared read-mostly by all tasks.
    pub auth: Arc<AuthenticationEnricher>,
    pub discovery: Arc<dyn InstanceDiscovery>,
    /// Process-wide bound on concurrently running scrape tasks.
    pub scrape_pool: Arc<Semaphore>,
    pub telemetry: Telemetry,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
