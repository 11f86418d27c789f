//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler. Its payload is
//! assembled per request: every running instance of the configured targets
//! is scraped concurrently within the shared budget, and whatever came back
//! in time is merged and serialized. Partial and even empty results are a
//! success for the caller; the endpoint always answers HTTP 200.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::header, response::IntoResponse};
use tracing::{debug, instrument};

use crate::exposition::{self, render_text};
use crate::merge;
use crate::orchestrator::ScrapeOrchestrator;
use crate::state::SharedState;

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let start = Instant::now();
    debug!("Processing /metrics request");

    state.telemetry.requests_total.inc();
    state.telemetry.requests_in_flight.inc();

    let orchestrator = ScrapeOrchestrator::new(
        state.client.clone(),
        Arc::clone(&state.auth),
        Arc::clone(&state.discovery),
        Arc::clone(&state.scrape_pool),
        state.config.targets.clone(),
        state.config.max_processing_time(),
    );
    let result = orchestrator.aggregate().await;

    state.telemetry.record_summary(&result.summary);
    state.telemetry.requests_in_flight.dec();
    state
        .telemetry
        .scrape_duration
        .set(start.elapsed().as_secs_f64());

    let mut families = result.families;
    if state.config.enable_telemetry.unwrap_or(false) {
        merge::merge(&mut families, state.telemetry.registry_families());
    }

    let body = render_text(&families);

    debug!(
        "Aggregation request completed: {} scrapes merged, {} families, {} bytes, {:.3}ms",
        result.summary.succeeded,
        families.len(),
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE_004)], body)
}
