//! cf-metrics-aggregator - version 0.1.0
//!
//! Aggregating Prometheus endpoint for Cloud Foundry applications.
//! This is the main entry point that initializes the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::{net::TcpListener, signal, sync::Semaphore};
use tracing::{error, info, Level};

use cf_metrics_aggregator::auth::AuthenticationEnricher;
use cf_metrics_aggregator::cli::{Args, LogLevel};
use cf_metrics_aggregator::config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use cf_metrics_aggregator::discovery::StaticDiscovery;
use cf_metrics_aggregator::handlers::{
    config_handler, health_handler, metrics_handler, root_handler,
};
use cf_metrics_aggregator::state::AppState;
use cf_metrics_aggregator::telemetry::Telemetry;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Builds the shared outbound HTTP client: the scrape budget doubles as the
/// per-request timeout, so abandoned scrapes cannot run much longer than the
/// budget they missed.
fn build_http_client(config: &Config) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut builder = reqwest::Client::builder().timeout(config.max_processing_time());

    if let (Some(host), Some(port)) = (config.proxy_host.as_deref(), config.proxy_port) {
        let proxy_url = format!("http://{}:{}", host, port);
        info!("Using forward proxy {} for outbound scrapes", proxy_url);
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&args);

    info!("Starting cf-metrics-aggregator");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // The one authentication strategy, selected from configuration and
    // shared by every scrape task.
    let auth = Arc::new(AuthenticationEnricher::from_config(&config.authenticator));
    let client = build_http_client(&config)?;
    let discovery = Arc::new(StaticDiscovery::new(config.discovery.clone()));
    let telemetry = Telemetry::new()?;
    let scrape_pool = Arc::new(Semaphore::new(config.pool_size()));

    info!(
        "Serving {} targets with scrape budget {:?} and pool size {}",
        config.targets.len(),
        config.max_processing_time(),
        config.pool_size()
    );
    if config.targets.is_empty() {
        info!("No targets configured; /metrics will serve an empty payload");
    }

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        client,
        auth,
        discovery,
        scrape_pool,
        telemetry,
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app = app.route("/config", get(config_handler));

    let app = app.with_state(state.clone());

    // Check if TLS is enabled
    let enable_tls = config.enable_tls.unwrap_or(false);

    if enable_tls {
        // TLS is enabled - use axum_server with rustls
        // These paths are guaranteed to exist since validate_effective_config() was called earlier
        let cert_path = config
            .tls_cert_path
            .as_ref()
            .expect("tls_cert_path should be set when enable_tls is true (validated at startup)");
        let key_path = config
            .tls_key_path
            .as_ref()
            .expect("tls_key_path should be set when enable_tls is true (validated at startup)");

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "cf-metrics-aggregator listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        // TLS is disabled - use standard TCP listener
        let listener = TcpListener::bind(addr).await?;
        info!(
            "cf-metrics-aggregator listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    info!("cf-metrics-aggregator stopped gracefully");
    Ok(())
}
