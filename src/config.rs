//! Configuration management for cf-metrics-aggregator.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_PROCESSING_TIME_MS: u64 = 5000;
pub const DEFAULT_FETCHER_POOL_SIZE: usize = 8;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// One logical deployable unit to scrape. Every running instance of the
/// application is discovered and fetched on each aggregation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    #[serde(alias = "orgName")]
    pub org_name: String,
    #[serde(alias = "spaceName")]
    pub space_name: String,
    #[serde(alias = "applicationName")]
    pub application_name: String,
    /// Path of the metrics endpoint on the application.
    pub path: Option<String>,
}

impl Target {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }
}

/// Credentials for the `basic` authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

/// Client-credentials settings for the `oauth2` authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    #[serde(alias = "tokenServiceURL", alias = "token-service-url")]
    pub token_service_url: String,
    #[serde(alias = "clientId", alias = "client-id")]
    pub client_id: String,
    #[serde(alias = "clientSecret", alias = "client-secret")]
    pub client_secret: String,
}

/// Selects how outbound scrape requests are authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorConfig {
    /// Discriminator: "none"/"null", "basic" or "oauth2" (case-insensitive).
    /// An unknown value logs a warning at startup and behaves like "none".
    #[serde(rename = "type", default = "default_authenticator_type")]
    pub kind: String,
    pub basic: Option<BasicAuthConfig>,
    pub oauth2: Option<OAuth2Config>,
}

fn default_authenticator_type() -> String {
    "none".to_string()
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            kind: default_authenticator_type(),
            basic: None,
            oauth2: None,
        }
    }
}

/// Static discovery data for one target: the hostname its route resolves to
/// and the ids of its currently running instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEntry {
    #[serde(alias = "orgName")]
    pub org_name: String,
    #[serde(alias = "spaceName")]
    pub space_name: String,
    #[serde(alias = "applicationName")]
    pub application_name: String,
    pub hostname: String,
    #[serde(alias = "instanceIds", default)]
    pub instance_ids: Vec<String>,
}

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Scrape targets and discovery
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub discovery: Vec<DiscoveryEntry>,

    // Outbound scraping
    #[serde(default)]
    pub authenticator: AuthenticatorConfig,
    #[serde(alias = "proxy-host")]
    pub proxy_host: Option<String>,
    #[serde(alias = "proxy-port")]
    pub proxy_port: Option<u16>,
    /// Shared wall-clock budget for all scrapes of one request, in ms.
    #[serde(alias = "max-processing-time-ms")]
    pub max_processing_time_ms: Option<u64>,
    /// Upper bound on concurrently running scrape tasks.
    #[serde(alias = "fetcher-pool-size")]
    pub fetcher_pool_size: Option<usize>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,
    /// Embed the aggregator's own metrics into the merged payload.
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            targets: Vec::new(),
            discovery: Vec::new(),
            authenticator: AuthenticatorConfig::default(),
            proxy_host: None,
            proxy_port: None,
            max_processing_time_ms: Some(DEFAULT_MAX_PROCESSING_TIME_MS),
            fetcher_pool_size: Some(DEFAULT_FETCHER_POOL_SIZE),
            enable_health: Some(true),
            enable_telemetry: Some(false),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn max_processing_time(&self) -> Duration {
        Duration::from_millis(
            self.max_processing_time_ms
                .unwrap_or(DEFAULT_MAX_PROCESSING_TIME_MS),
        )
    }

    pub fn pool_size(&self) -> usize {
        self.fetcher_pool_size.unwrap_or(DEFAULT_FETCHER_POOL_SIZE)
    }

    /// Copy with credential values masked, for display endpoints and
    /// --show-config output.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        if let Some(basic) = cfg.authenticator.basic.as_mut() {
            basic.password = "<redacted>".to_string();
        }
        if let Some(oauth2) = cfg.authenticator.oauth2.as_mut() {
            oauth2.client_secret = "<redacted>".to_string();
        }
        cfg
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.max_processing_time_ms == Some(0) {
        return Err("max_processing_time_ms must be greater than zero".into());
    }
    if cfg.fetcher_pool_size == Some(0) {
        return Err("fetcher_pool_size must be greater than zero".into());
    }

    for target in &cfg.targets {
        if target.org_name.is_empty()
            || target.space_name.is_empty()
            || target.application_name.is_empty()
        {
            return Err("targets must set org_name, space_name and application_name".into());
        }
        if !target.path().starts_with('/') {
            return Err(format!("target path '{}' must start with '/'", target.path()).into());
        }
    }

    // Proxy host and port only make sense together
    match (cfg.proxy_host.as_deref(), cfg.proxy_port) {
        (Some(_), None) => {
            return Err("proxy_host is set but proxy_port is not".into());
        }
        (None, Some(_)) => {
            return Err("proxy_port is set but proxy_host is not".into());
        }
        _ => {}
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                for (label, path) in [("certificate", cert), ("private key", key)] {
                    match fs::metadata(path) {
                        Ok(meta) if meta.len() == 0 => {
                            return Err(format!("TLS {} file is empty: {}", label, path).into());
                        }
                        Err(e) => {
                            return Err(format!(
                                "TLS {} file is not readable: {} ({})",
                                label, path, e
                            )
                            .into());
                        }
                        Ok(_) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(budget_ms) = args.max_processing_time_ms {
        config.max_processing_time_ms = Some(budget_ms);
    }
    if let Some(pool_size) = args.fetcher_pool_size {
        config.fetcher_pool_size = Some(pool_size);
    }

    if let Some(proxy_host) = &args.proxy_host {
        config.proxy_host = Some(proxy_host.clone());
    }
    if let Some(proxy_port) = args.proxy_port {
        config.proxy_port = Some(proxy_port);
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.enable_telemetry {
        config.enable_telemetry = Some(true);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/cf-metrics-aggregator/config.yaml",
            "/etc/cf-metrics-aggregator/config.yml",
            "/etc/cf-metrics-aggregator/config.json",
            "./cf-metrics-aggregator.yaml",
            "./cf-metrics-aggregator.yml",
            "./cf-metrics-aggregator.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format, credential values masked.
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let redacted = config.redacted();
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&redacted)?,
        ConfigFormat::Toml => toml::to_string_pretty(&redacted)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&redacted)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.port, Some(DEFAULT_PORT));
        assert_eq!(cfg.max_processing_time(), Duration::from_millis(5000));
        assert_eq!(cfg.pool_size(), DEFAULT_FETCHER_POOL_SIZE);
        assert!(cfg.targets.is_empty());
        assert_eq!(cfg.authenticator.kind, "none");
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn yaml_with_camel_case_aliases() {
        let cfg: Config = serde_yaml::from_str(
            r#"
targets:
  - orgName: myorg
    spaceName: dev
    applicationName: billing
authenticator:
  type: basic
  basic:
    username: scraper
    password: secret
discovery:
  - orgName: myorg
    spaceName: dev
    applicationName: billing
    hostname: billing.apps.example.com
    instanceIds: ["0", "1"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].org_name, "myorg");
        assert_eq!(cfg.targets[0].path(), DEFAULT_METRICS_PATH);
        assert_eq!(cfg.authenticator.kind, "basic");
        assert_eq!(cfg.discovery[0].instance_ids, vec!["0", "1"]);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let cfg = Config {
            max_processing_time_ms: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let cfg = Config {
            fetcher_pool_size: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn proxy_host_without_port_is_rejected() {
        let cfg = Config {
            proxy_host: Some("proxy.internal".to_string()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn target_path_must_be_absolute() {
        let cfg = Config {
            targets: vec![Target {
                org_name: "o".into(),
                space_name: "s".into(),
                application_name: "a".into(),
                path: Some("metrics".into()),
            }],
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn redacted_masks_credentials() {
        let cfg = Config {
            authenticator: AuthenticatorConfig {
                kind: "oauth2".into(),
                basic: Some(BasicAuthConfig {
                    username: "u".into(),
                    password: "p".into(),
                }),
                oauth2: Some(OAuth2Config {
                    token_service_url: "https://uaa.example.com/oauth/token".into(),
                    client_id: "id".into(),
                    client_secret: "shh".into(),
                }),
            },
            ..Config::default()
        };
        let redacted = cfg.redacted();
        assert_eq!(redacted.authenticator.basic.unwrap().password, "<redacted>");
        assert_eq!(
            redacted.authenticator.oauth2.unwrap().client_secret,
            "<redacted>"
        );
        // Original is untouched
        assert_eq!(cfg.authenticator.basic.unwrap().password, "p");
    }
}
