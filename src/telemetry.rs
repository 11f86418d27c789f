//! Aggregator self-instrumentation.
//!
//! A small prometheus registry tracks how the aggregation endpoint itself is
//! doing. When telemetry is enabled, the gathered registry is converted into
//! the crate's own family mapping and merged into the outgoing payload, so
//! the aggregator's metrics travel next to the scraped ones.

use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::debug;

use crate::model::{MetricFamily, MetricFamilyMapping, MetricType, Sample};
use crate::orchestrator::ScrapeSummary;

pub struct Telemetry {
    registry: Registry,
    pub requests_total: IntCounter,
    pub scrape_duration: Gauge,
    pub scrapes_total: IntCounterVec,
    pub requests_in_flight: IntGauge,
}

impl Telemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounter::new(
            "cf_aggregator_requests_total",
            "Number of aggregation requests served",
        )?;
        let scrape_duration = Gauge::new(
            "cf_aggregator_scrape_duration_seconds",
            "Time spent assembling the most recent aggregation response",
        )?;
        let scrapes_total = IntCounterVec::new(
            Opts::new(
                "cf_aggregator_scrapes_total",
                "Instance scrapes by outcome",
            ),
            &["outcome"],
        )?;
        let requests_in_flight = IntGauge::new(
            "cf_aggregator_requests_in_flight",
            "Aggregation requests currently being served",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(requests_in_flight.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            scrape_duration,
            scrapes_total,
            requests_in_flight,
        })
    }

    pub fn record_summary(&self, summary: &ScrapeSummary) {
        self.scrapes_total
            .with_label_values(&["success"])
            .inc_by(summary.succeeded as u64);
        self.scrapes_total
            .with_label_values(&["failure"])
            .inc_by(summary.failed as u64);
        self.scrapes_total
            .with_label_values(&["abandoned"])
            .inc_by(summary.abandoned as u64);
    }

    /// The gathered registry converted into the crate's model, so the
    /// aggregator's own metrics ride the regular merge + serialize path.
    pub fn registry_families(&self) -> MetricFamilyMapping {
        let mut mapping = MetricFamilyMapping::default();

        for proto_family in self.registry.gather() {
            let family_type = match proto_family.get_field_type() {
                prometheus::proto::MetricType::COUNTER => MetricType::Counter,
                prometheus::proto::MetricType::GAUGE => MetricType::Gauge,
                other => {
                    debug!(
                        "Skipping self-metric family {} with unsupported type {:?}",
                        proto_family.get_name(),
                        other
                    );
                    continue;
                }
            };

            let mut family = MetricFamily::new(
                proto_family.get_name(),
                family_type,
                proto_family.get_help(),
            );
            for metric in proto_family.get_metric() {
                let labels = metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                    .collect();
                let value = if family_type == MetricType::Counter {
                    metric.get_counter().value()
                } else {
                    metric.get_gauge().value()
                };
                family
                    .samples
                    .push(Sample::new(proto_family.get_name(), labels, value));
            }
            mapping.insert(family.name.clone(), family);
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_converts_to_family_mapping() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.requests_total.inc();
        telemetry.requests_total.inc();
        telemetry.scrape_duration.set(0.25);
        telemetry.record_summary(&ScrapeSummary {
            tasks: 3,
            succeeded: 2,
            failed: 1,
            abandoned: 0,
        });

        let families = telemetry.registry_families();

        let requests = &families["cf_aggregator_requests_total"];
        assert_eq!(requests.family_type, MetricType::Counter);
        assert_eq!(requests.samples[0].value, 2.0);

        let duration = &families["cf_aggregator_scrape_duration_seconds"];
        assert_eq!(duration.family_type, MetricType::Gauge);
        assert_eq!(duration.samples[0].value, 0.25);

        let scrapes = &families["cf_aggregator_scrapes_total"];
        let outcome = |name: &str| {
            scrapes
                .samples
                .iter()
                .find(|s| s.labels.contains(&("outcome".to_string(), name.to_string())))
                .map(|s| s.value)
        };
        assert_eq!(outcome("success"), Some(2.0));
        assert_eq!(outcome("failure"), Some(1.0));
    }

    #[test]
    fn help_strings_survive_conversion() {
        let telemetry = Telemetry::new().unwrap();
        let families = telemetry.registry_families();
        assert_eq!(
            families["cf_aggregator_requests_total"].help,
            "Number of aggregation requests served"
        );
    }
}
