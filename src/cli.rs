//! CLI arguments for cf-metrics-aggregator.
//!
//! This module defines the command-line interface structure using the clap
//! library.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "cf-metrics-aggregator",
    about = "Prometheus aggregation endpoint for Cloud Foundry apps",
    long_about = "Prometheus aggregation endpoint for Cloud Foundry apps.\n\n\
                  Serves a single /metrics endpoint whose payload is assembled per request \
                  by concurrently scraping every running instance of the configured \
                  org/space/app targets, labeling each instance's samples with its origin \
                  and merging everything into one text-exposition document.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Total wall-clock budget for the scrapes of one request (ms)
    #[arg(long)]
    pub max_processing_time_ms: Option<u64>,

    /// Maximum number of concurrently running scrape tasks
    #[arg(long)]
    pub fetcher_pool_size: Option<usize>,

    /// Forward proxy host for outbound scrapes
    #[arg(long)]
    pub proxy_host: Option<String>,

    /// Forward proxy port for outbound scrapes
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Embed aggregator self-metrics into the merged payload
    #[arg(long)]
    pub enable_telemetry: bool,

    /// Enable TLS for the HTTP endpoint
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_overrides() {
        let args =
            Args::try_parse_from(["cf-metrics-aggregator", "-p", "9090", "--no-config"]).unwrap();
        assert_eq!(args.port, Some(9090));
        assert!(args.no_config);
        assert!(args.config.is_none());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Args::try_parse_from(["cf-metrics-aggregator", "--bogus"]).is_err());
    }
}
