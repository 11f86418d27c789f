//! Structural merge of per-instance metric family mappings.
//!
//! The aggregation endpoint folds every collected scrape result into one
//! accumulator with [`merge`]. The fold is a pure union: instance labels
//! already make sample identities disjoint across sources, so no
//! deduplication or statistical reduction happens here.

use std::collections::hash_map::Entry;

use tracing::warn;

use crate::model::MetricFamilyMapping;

/// Folds `incoming` into `accumulator`.
///
/// Families new to the accumulator are inserted verbatim; for families that
/// already exist, the incoming samples are appended and the accumulator's
/// type and help are kept (first writer wins). A type disagreement between
/// producers is logged but does not fail the merge.
pub fn merge(accumulator: &mut MetricFamilyMapping, incoming: MetricFamilyMapping) {
    for (name, family) in incoming {
        match accumulator.entry(name) {
            Entry::Occupied(mut existing) => {
                if existing.get().family_type != family.family_type {
                    warn!(
                        "Metric family {} reported as {} by one instance and {} by another; keeping {}",
                        existing.key(),
                        existing.get().family_type.as_str(),
                        family.family_type.as_str(),
                        existing.get().family_type.as_str()
                    );
                }
                existing.get_mut().samples.extend(family.samples);
            }
            Entry::Vacant(slot) => {
                slot.insert(family);
            }
        }
    }
}
