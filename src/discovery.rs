//! Instance discovery boundary.
//!
//! The orchestrator only needs two lookups per target: where its route
//! resolves to and which instance ids are currently running. Both return
//! `None` for "unknown", which makes the orchestrator skip the target
//! without failing the request.

use ahash::AHashMap;

use crate::config::DiscoveryEntry;

/// Resolves targets to scrapeable instances. Implementations must be safe to
/// share across concurrent requests.
pub trait InstanceDiscovery: Send + Sync {
    /// A representative base URL (scheme + authority) for the application,
    /// or `None` if the route is unknown.
    fn resolve_base_url(
        &self,
        org_name: &str,
        space_name: &str,
        application_name: &str,
    ) -> Option<String>;

    /// The ids of the currently running instances, or `None` if the
    /// application is unknown.
    fn list_instance_ids(
        &self,
        org_name: &str,
        space_name: &str,
        application_name: &str,
    ) -> Option<Vec<String>>;
}

/// Discovery backed by static configuration entries: each entry pins the
/// hostname and instance ids for one org/space/app tuple.
pub struct StaticDiscovery {
    entries: AHashMap<(String, String, String), DiscoveryEntry>,
}

impl StaticDiscovery {
    pub fn new(entries: Vec<DiscoveryEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| {
                    (
                        (
                            e.org_name.clone(),
                            e.space_name.clone(),
                            e.application_name.clone(),
                        ),
                        e,
                    )
                })
                .collect(),
        }
    }

    fn entry(&self, org: &str, space: &str, app: &str) -> Option<&DiscoveryEntry> {
        self.entries
            .get(&(org.to_string(), space.to_string(), app.to_string()))
    }
}

impl InstanceDiscovery for StaticDiscovery {
    fn resolve_base_url(&self, org: &str, space: &str, app: &str) -> Option<String> {
        let entry = self.entry(org, space, app)?;
        if entry.hostname.contains("://") {
            Some(entry.hostname.clone())
        } else {
            Some(format!("https://{}", entry.hostname))
        }
    }

    fn list_instance_ids(&self, org: &str, space: &str, app: &str) -> Option<Vec<String>> {
        self.entry(org, space, app)
            .map(|entry| entry.instance_ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> StaticDiscovery {
        StaticDiscovery::new(vec![
            DiscoveryEntry {
                org_name: "org".into(),
                space_name: "space".into(),
                application_name: "app".into(),
                hostname: "app.apps.example.com".into(),
                instance_ids: vec!["0".into(), "1".into()],
            },
            DiscoveryEntry {
                org_name: "org".into(),
                space_name: "space".into(),
                application_name: "local".into(),
                hostname: "http://127.0.0.1:9090".into(),
                instance_ids: vec![],
            },
        ])
    }

    #[test]
    fn known_target_resolves() {
        let d = discovery();
        assert_eq!(
            d.resolve_base_url("org", "space", "app").as_deref(),
            Some("https://app.apps.example.com")
        );
        assert_eq!(
            d.list_instance_ids("org", "space", "app").unwrap(),
            vec!["0", "1"]
        );
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let d = discovery();
        assert_eq!(
            d.resolve_base_url("org", "space", "local").as_deref(),
            Some("http://127.0.0.1:9090")
        );
    }

    #[test]
    fn unknown_target_is_none() {
        let d = discovery();
        assert!(d.resolve_base_url("org", "space", "ghost").is_none());
        assert!(d.list_instance_ids("nope", "space", "app").is_none());
    }

    #[test]
    fn zero_instances_is_known_but_empty() {
        let d = discovery();
        assert_eq!(d.list_instance_ids("org", "space", "local").unwrap().len(), 0);
    }
}
