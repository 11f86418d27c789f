//! CF Metrics Aggregator Library
//!
//! Scrape orchestration and aggregation engine behind the single merged
//! `/metrics` endpoint: per-instance scraping with a bounded worker pool and
//! a shared wall-clock budget, label enrichment, structural merge and text
//! exposition serialization.
//!
//! The binary in `main.rs` wires these modules to an axum server; the
//! library surface exists so integration tests can drive the engine
//! directly.

pub mod auth;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod enrich;
pub mod exposition;
pub mod fetcher;
pub mod handlers;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod state;
pub mod telemetry;
