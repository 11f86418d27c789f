//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! aggregator liveness and request/scrape statistics as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let outcome = |name: &str| {
        state
            .telemetry
            .scrapes_total
            .with_label_values(&[name])
            .get()
    };

    let mut out = String::new();
    writeln!(out, "OK").ok();
    writeln!(out).ok();
    writeln!(out, "Uptime:              {}s", uptime_secs).ok();
    writeln!(out, "Configured targets:  {}", state.config.targets.len()).ok();
    writeln!(
        out,
        "Requests served:     {}",
        state.telemetry.requests_total.get()
    )
    .ok();
    writeln!(out, "Scrapes succeeded:   {}", outcome("success")).ok();
    writeln!(out, "Scrapes failed:      {}", outcome("failure")).ok();
    writeln!(out, "Scrapes abandoned:   {}", outcome("abandoned")).ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
