//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays the
//! effective aggregator configuration. Credential values are masked.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");

    let body = match serde_yaml::to_string(&state.config.redacted()) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Failed to render configuration: {}", e);
            "failed to render configuration".to_string()
        }
    };

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        body,
    )
}
