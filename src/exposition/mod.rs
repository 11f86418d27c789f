//! Prometheus text exposition format (version 0.0.4).
//!
//! `parse` decodes a scraped body into the crate's metric model, `render`
//! serializes an aggregated mapping back to the wire format.

pub mod parse;
pub mod render;

pub use parse::{parse_text, ParseError};
pub use render::render_text;

/// Content type of the text exposition format, sent on the aggregation
/// response and as the `Accept` header of outbound scrapes.
pub const CONTENT_TYPE_004: &str = "text/plain; version=0.0.4; charset=utf-8";
