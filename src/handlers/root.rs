//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let health_row = if state.config.enable_health.unwrap_or(true) {
        "<tr><td><a href=\"/health\">/health</a></td><td>Aggregator health and scrape statistics</td></tr>"
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>CF Metrics Aggregator</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; line-height: 1.6; }}
        table {{ border-collapse: collapse; }}
        td {{ padding: 4px 16px 4px 0; }}
        .meta {{ color: #666; }}
    </style>
</head>
<body>
    <h1>CF Metrics Aggregator</h1>
    <p class="meta">Version {version} &middot; Uptime {uptime_str} &middot; {targets} configured targets</p>
    <table>
        <tr><td><a href="/metrics">/metrics</a></td><td>Aggregated metrics of all target instances (Prometheus text format)</td></tr>
        {health_row}
        <tr><td><a href="/config">/config</a></td><td>Effective configuration (credentials masked)</td></tr>
    </table>
</body>
</html>"#,
        version = version,
        uptime_str = uptime_str,
        targets = state.config.targets.len(),
        health_row = health_row,
    );

    Html(html)
}
