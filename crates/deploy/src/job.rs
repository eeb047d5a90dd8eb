//! Deploy job payload.

use dshop_core::ResourceSelection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One queued deploy, as submitted by the admin API or the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployJob {
    pub network_id: i64,
    /// Label under the network's DNS zone to point at the build.
    #[serde(default)]
    pub subdomain: Option<String>,
    pub shop_id: i64,
    /// Provider tags gating which providers may run.
    #[serde(default)]
    pub resource_selection: ResourceSelection,
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
}

impl DeployJob {
    pub fn new(network_id: i64, shop_id: i64) -> Self {
        Self {
            network_id,
            subdomain: None,
            shop_id,
            resource_selection: ResourceSelection::default(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_resources(mut self, resource_selection: ResourceSelection) -> Self {
        self.resource_selection = resource_selection;
        self
    }

    /// The requested subdomain; blank counts as none.
    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dshop_core::ResourceTag;
    use serde_json::json;

    #[test]
    fn test_parse_job_payload() {
        let job: DeployJob = serde_json::from_value(json!({
            "networkId": 999,
            "subdomain": "myshop",
            "shopId": 7,
            "resourceSelection": ["aws-files", "cloudflare-dns", "made-up"],
            "uuid": "9b2f0c52-2f53-4bb4-8d0e-36b5a6c3a8e1"
        }))
        .unwrap();
        assert_eq!(job.network_id, 999);
        assert_eq!(job.shop_id, 7);
        assert_eq!(job.subdomain(), Some("myshop"));
        assert!(job.resource_selection.contains(ResourceTag::AwsFiles));
        assert_eq!(
            job.resource_selection.dns_provider(),
            Some(ResourceTag::CloudflareDns)
        );
        assert_eq!(job.resource_selection.unknown(), ["made-up".to_string()]);
    }

    #[test]
    fn test_minimal_payload() {
        let job: DeployJob =
            serde_json::from_value(json!({"networkId": 1, "shopId": 2, "subdomain": " "}))
                .unwrap();
        assert_eq!(job.subdomain(), None);
        assert!(job.resource_selection.is_empty());
    }
}
