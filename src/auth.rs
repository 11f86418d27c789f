//! Authentication enrichment for outbound scrape requests.
//!
//! One strategy is selected from configuration at startup and shared by all
//! scrape tasks. A strategy that cannot produce credentials (for example an
//! unreachable token endpoint) lets the request go out unmodified; the scrape
//! then fails downstream with an authentication-class error instead of
//! aborting the whole aggregation.

use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{AuthenticatorConfig, OAuth2Config};

/// Seconds subtracted from a token's lifetime so it is refreshed before the
/// issuer actually expires it.
const TOKEN_EXPIRY_SLACK_SECS: u64 = 30;

/// Request-mutation strategy applied to every outbound scrape.
pub enum AuthenticationEnricher {
    /// Send requests unmodified.
    None,
    /// Inject a fixed username/password as an HTTP Basic credential.
    Basic { username: String, password: String },
    /// Inject a cached OAuth2 client-credentials bearer token.
    OAuth2(OAuth2ClientCredentials),
}

impl AuthenticationEnricher {
    /// Constructs the strategy selected by the configuration discriminator.
    /// Unknown or incomplete configurations log a warning and fall back to
    /// no authentication.
    pub fn from_config(cfg: &AuthenticatorConfig) -> Self {
        match cfg.kind.to_ascii_lowercase().as_str() {
            "none" | "null" => AuthenticationEnricher::None,
            "basic" => match &cfg.basic {
                Some(basic) => AuthenticationEnricher::Basic {
                    username: basic.username.clone(),
                    password: basic.password.clone(),
                },
                None => {
                    warn!("Authenticator type basic is configured without a basic credentials block; skipping");
                    AuthenticationEnricher::None
                }
            },
            "oauth2" => match &cfg.oauth2 {
                Some(oauth2) => {
                    AuthenticationEnricher::OAuth2(OAuth2ClientCredentials::new(oauth2))
                }
                None => {
                    warn!("Authenticator type oauth2 is configured without an oauth2 block; skipping");
                    AuthenticationEnricher::None
                }
            },
            other => {
                warn!("Authenticator type {} is unknown; skipping", other);
                AuthenticationEnricher::None
            }
        }
    }

    /// Applies the strategy to an outgoing request.
    pub async fn enrich(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthenticationEnricher::None => request,
            AuthenticationEnricher::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            AuthenticationEnricher::OAuth2(oauth2) => match oauth2.bearer_token().await {
                Some(token) => request.bearer_auth(token),
                // The scrape goes out unauthenticated and fails downstream.
                None => request,
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    // RFC 6749 leaves expires_in optional; assume a short-lived token.
    300
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// OAuth2 client-credentials flow with an internally synchronized token
/// cache. Many scrape tasks read the cache concurrently; the mutex also
/// serializes refreshes so one expired token triggers one token request.
pub struct OAuth2ClientCredentials {
    token_service_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuth2ClientCredentials {
    pub fn new(cfg: &OAuth2Config) -> Self {
        Self {
            token_service_url: cfg.token_service_url.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, refreshing the cache if needed, or
    /// `None` if the token endpoint cannot provide one.
    async fn bearer_token(&self) -> Option<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Some(token.access_token.clone());
            }
            debug!("Cached OAuth2 token expired, requesting a new one");
        }

        match self.fetch_token().await {
            Ok(response) => {
                let lifetime = response
                    .expires_in
                    .saturating_sub(TOKEN_EXPIRY_SLACK_SECS)
                    .max(1);
                let token = response.access_token.clone();
                *cached = Some(CachedToken {
                    access_token: response.access_token,
                    expires_at: Instant::now() + Duration::from_secs(lifetime),
                });
                Some(token)
            }
            Err(e) => {
                warn!(
                    "Failed to obtain OAuth2 token from {}: {}",
                    self.token_service_url, e
                );
                None
            }
        }
    }

    async fn fetch_token(&self) -> Result<TokenResponse, reqwest::Error> {
        self.client
            .post(&self.token_service_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await
    }
}
