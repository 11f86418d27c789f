//! Label enrichment for scraped samples.
//!
//! Every sample coming back from an instance gets the four identifying
//! labels of its origin appended, so merged samples stay distinguishable
//! across instances. The reserved names are not user-assignable: a scraped
//! label with one of these names is replaced by the enricher's value.

use crate::model::MetricFamilyMapping;

pub const LABEL_ORG_NAME: &str = "org_name";
pub const LABEL_SPACE_NAME: &str = "space_name";
pub const LABEL_APP_NAME: &str = "app_name";
pub const LABEL_INSTANCE_ID: &str = "instance_id";

const RESERVED_LABELS: [&str; 4] = [
    LABEL_ORG_NAME,
    LABEL_SPACE_NAME,
    LABEL_APP_NAME,
    LABEL_INSTANCE_ID,
];

/// Decorates a family mapping with one instance's identifying tuple.
/// Pure: no side effects, no failure mode.
#[derive(Debug, Clone)]
pub struct LabelEnricher {
    org_name: String,
    space_name: String,
    app_name: String,
    instance_id: String,
}

impl LabelEnricher {
    pub fn new(
        org_name: impl Into<String>,
        space_name: impl Into<String>,
        app_name: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            org_name: org_name.into(),
            space_name: space_name.into(),
            app_name: app_name.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Returns the mapping with the identifying labels appended to every
    /// sample of every family, dropping any scraped label that collides with
    /// a reserved name.
    pub fn enrich(&self, mut families: MetricFamilyMapping) -> MetricFamilyMapping {
        for family in families.values_mut() {
            for sample in &mut family.samples {
                sample
                    .labels
                    .retain(|(name, _)| !RESERVED_LABELS.contains(&name.as_str()));
                sample.labels.push((LABEL_ORG_NAME.into(), self.org_name.clone()));
                sample
                    .labels
                    .push((LABEL_SPACE_NAME.into(), self.space_name.clone()));
                sample.labels.push((LABEL_APP_NAME.into(), self.app_name.clone()));
                sample
                    .labels
                    .push((LABEL_INSTANCE_ID.into(), self.instance_id.clone()));
            }
        }
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetricFamily, MetricFamilyMapping, MetricType, Sample};

    fn single_sample_mapping(labels: Vec<(String, String)>) -> MetricFamilyMapping {
        let mut family = MetricFamily::new("requests_total", MetricType::Counter, "Requests.");
        family.samples.push(Sample::new("requests_total", labels, 7.0));
        let mut mapping = MetricFamilyMapping::default();
        mapping.insert(family.name.clone(), family);
        mapping
    }

    #[test]
    fn appends_identifying_labels_as_superset() {
        let enricher = LabelEnricher::new("myorg", "dev", "billing", "0");
        let original = vec![("method".to_string(), "GET".to_string())];
        let enriched = enricher.enrich(single_sample_mapping(original.clone()));

        let labels = &enriched["requests_total"].samples[0].labels;
        for pair in &original {
            assert!(labels.contains(pair));
        }
        assert!(labels.contains(&(LABEL_ORG_NAME.to_string(), "myorg".to_string())));
        assert!(labels.contains(&(LABEL_SPACE_NAME.to_string(), "dev".to_string())));
        assert!(labels.contains(&(LABEL_APP_NAME.to_string(), "billing".to_string())));
        assert!(labels.contains(&(LABEL_INSTANCE_ID.to_string(), "0".to_string())));
        assert_eq!(labels.len(), original.len() + 4);
    }

    #[test]
    fn reserved_label_collision_is_overridden() {
        let enricher = LabelEnricher::new("real-org", "real-space", "real-app", "1");
        let enriched = enricher.enrich(single_sample_mapping(vec![
            ("org_name".to_string(), "spoofed".to_string()),
            ("method".to_string(), "GET".to_string()),
        ]));

        let labels = &enriched["requests_total"].samples[0].labels;
        let org_values: Vec<&str> = labels
            .iter()
            .filter(|(name, _)| name == LABEL_ORG_NAME)
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(org_values, vec!["real-org"]);
    }

    #[test]
    fn empty_mapping_passes_through() {
        let enricher = LabelEnricher::new("o", "s", "a", "0");
        assert!(enricher.enrich(MetricFamilyMapping::default()).is_empty());
    }
}
