//! Core data model for scraped metrics.
//!
//! These types are the exchange currency between the scraper, the label
//! enricher, the merge engine and the exposition serializer: a `Sample` is one
//! labeled observation, a `MetricFamily` groups samples under one name/type,
//! and a `MetricFamilyMapping` keys families by name.

use ahash::AHashMap;

use crate::config::Target;

/// Mapping from metric-family name to family. One of these is produced per
/// scraped instance and folded into the request's accumulator by the merge
/// engine.
pub type MetricFamilyMapping = AHashMap<String, MetricFamily>;

/// Declared type of a metric family in the text exposition format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricType {
    /// The keyword used on `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Untyped => "untyped",
        }
    }

    /// Parses a `# TYPE` keyword. Unrecognized keywords map to `Untyped`
    /// rather than failing, matching how scrapers treat unknown metadata.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "counter" => MetricType::Counter,
            "gauge" => MetricType::Gauge,
            "histogram" => MetricType::Histogram,
            "summary" => MetricType::Summary,
            _ => MetricType::Untyped,
        }
    }
}

/// One observed value: metric name, ordered label pairs and the value itself.
///
/// Label names are unique within a sample and keep their insertion order, so
/// enrichment appends deterministically and serialization is stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
    /// Millisecond timestamp if the producer emitted one.
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn new(name: impl Into<String>, labels: Vec<(String, String)>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels,
            value,
            timestamp_ms: None,
        }
    }
}

/// A named group of samples sharing a declared type and help string.
///
/// A family with zero samples is valid; it still serializes its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub family_type: MetricType,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, family_type: MetricType, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            family_type,
            samples: Vec::new(),
        }
    }

    /// An empty family with no metadata yet, used by the parser when a sample
    /// line arrives without preceding `# HELP`/`# TYPE` lines.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, MetricType::Untyped, "")
    }
}

/// One running replica of a target, produced transiently per request by the
/// discovery collaborator.
#[derive(Debug, Clone)]
pub struct Instance {
    pub target: Target,
    pub instance_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_type_keyword_round_trip() {
        for t in [
            MetricType::Counter,
            MetricType::Gauge,
            MetricType::Histogram,
            MetricType::Summary,
            MetricType::Untyped,
        ] {
            assert_eq!(MetricType::from_keyword(t.as_str()), t);
        }
    }

    #[test]
    fn unknown_type_keyword_is_untyped() {
        assert_eq!(MetricType::from_keyword("info"), MetricType::Untyped);
    }

    #[test]
    fn empty_family_is_valid() {
        let family = MetricFamily::new("queue_depth", MetricType::Gauge, "Depth of the queue");
        assert!(family.samples.is_empty());
        assert_eq!(family.family_type, MetricType::Gauge);
    }
}
