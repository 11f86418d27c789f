//! One scrape task: fetch, decode, enrich.
//!
//! A `MetricsFetcher` is built per (target, instance) pair and executed on
//! the worker pool. Every failure path comes back as a [`ScrapeError`] value;
//! nothing escapes to the collection loop as a fault.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::auth::AuthenticationEnricher;
use crate::enrich::LabelEnricher;
use crate::exposition::{self, ParseError};
use crate::model::MetricFamilyMapping;

/// Header carrying the instance id so the platform router dispatches the
/// request to that specific instance instead of round-robining.
pub const INSTANCE_HEADER: &str = "X-CF-APP-INSTANCE";

/// Typed failure of one scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to decode metrics from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: ParseError,
    },
}

impl ScrapeError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ScrapeError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScrapeError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Result of one scrape task: an enriched family mapping or a typed failure.
pub type ScrapeOutcome = Result<MetricFamilyMapping, ScrapeError>;

/// Fetches one instance's metrics endpoint.
pub struct MetricsFetcher {
    access_url: String,
    instance_id: String,
    auth: Arc<AuthenticationEnricher>,
    enricher: LabelEnricher,
}

impl MetricsFetcher {
    pub fn new(
        access_url: String,
        instance_id: String,
        auth: Arc<AuthenticationEnricher>,
        enricher: LabelEnricher,
    ) -> Self {
        Self {
            access_url,
            instance_id,
            auth,
            enricher,
        }
    }

    pub fn access_url(&self) -> &str {
        &self.access_url
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Performs the remote fetch, decodes the body and applies label
    /// enrichment. All failures are returned as data.
    pub async fn fetch(&self, client: &Client) -> ScrapeOutcome {
        debug!(
            "Scraping {} (instance {})",
            self.access_url, self.instance_id
        );

        let request = client
            .get(&self.access_url)
            .header(reqwest::header::ACCEPT, exposition::CONTENT_TYPE_004)
            .header(INSTANCE_HEADER, self.instance_id.as_str());
        let request = self.auth.enrich(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(&self.access_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: self.access_url.clone(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::from_reqwest(&self.access_url, e))?;

        let families = exposition::parse_text(&body).map_err(|e| ScrapeError::Decode {
            url: self.access_url.clone(),
            source: e,
        })?;

        Ok(self.enricher.enrich(families))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_errors_render_their_cause() {
        let err = ScrapeError::Status {
            url: "https://app.example.com/metrics".into(),
            status: StatusCode::UNAUTHORIZED,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("https://app.example.com/metrics"));
        assert!(rendered.contains("401"));
    }

    #[test]
    fn timeout_error_is_distinguishable() {
        let err = ScrapeError::Timeout {
            url: "https://slow.example.com/metrics".into(),
        };
        assert!(matches!(err, ScrapeError::Timeout { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
