use async_trait::async_trait;
use dshop_cdn::error::{CdnError, CdnResult};
use dshop_cdn::{CdnProvider, CdnRequest, configure_cdn_providers, default_cdn_providers};
use dshop_cloud::CloudClients;
use dshop_core::config::GcpConfig;
use dshop_core::{
    CdnConfiguration, Network, NetworkConfig, ResourceSelection, ResourceTag, Shop,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct StaticCdn {
    name: &'static str,
    tag: ResourceTag,
    result: Option<CdnConfiguration>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    hits: AtomicUsize,
}

impl StaticCdn {
    fn new(
        name: &'static str,
        tag: ResourceTag,
        result: Option<CdnConfiguration>,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Self {
        Self {
            name,
            tag,
            result,
            calls: Arc::clone(calls),
            hits: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CdnProvider for StaticCdn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self, _config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(self.tag)
    }

    async fn configure_cdn(
        &self,
        _config: &NetworkConfig,
        _request: &CdnRequest<'_>,
    ) -> CdnResult<CdnConfiguration> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(self.name);
        self.result.clone().ok_or(CdnError::NoDomains)
    }
}

fn network() -> Network {
    Network {
        network_id: 999,
        name: "localhost".to_string(),
        ipfs_gateway: None,
        ipfs_api: None,
        config: NetworkConfig::default(),
    }
}

fn shop() -> Shop {
    Shop {
        shop_id: 1,
        name: "Shop".to_string(),
        auth_token: "token1".to_string(),
        network_id: 999,
        has_changes: false,
    }
}

#[test]
fn test_default_providers_sorted_by_name() {
    let providers = default_cdn_providers(&CloudClients::new(), &GcpConfig::default());
    let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["aws", "gcp"]);
}

#[test]
fn test_default_providers_need_credentials() {
    let providers = default_cdn_providers(&CloudClients::new(), &GcpConfig::default());
    let selection = ResourceSelection::new([ResourceTag::AwsCdn, ResourceTag::GcpCdn]);
    assert!(
        providers
            .iter()
            .all(|p| !p.is_available(&NetworkConfig::default(), &selection))
    );
}

#[tokio::test]
async fn test_configures_available_providers_in_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let aws = Arc::new(StaticCdn::new(
        "aws",
        ResourceTag::AwsCdn,
        Some(CdnConfiguration::Cname {
            cname: "d1.cloudfront.net".to_string(),
        }),
        &calls,
    ));
    let gcp = Arc::new(StaticCdn::new(
        "gcp",
        ResourceTag::GcpCdn,
        Some(CdnConfiguration::IpAddress {
            ip_address: "34.1.2.3".to_string(),
        }),
        &calls,
    ));
    let providers: Vec<Arc<dyn CdnProvider>> = vec![aws.clone(), gcp.clone()];
    let (network, shop) = (network(), shop());
    let bucket_urls = vec!["s3://b".to_string()];
    let domains = vec!["shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };

    let selection = ResourceSelection::new([ResourceTag::GcpCdn]);
    let only_gcp = configure_cdn_providers(&providers, &network.config, &selection, &request)
        .await
        .unwrap();
    assert_eq!(only_gcp.len(), 1);
    assert_eq!(aws.hits.load(Ordering::SeqCst), 0);

    let selection = ResourceSelection::new([ResourceTag::GcpCdn, ResourceTag::AwsCdn]);
    let both = configure_cdn_providers(&providers, &network.config, &selection, &request)
        .await
        .unwrap();
    assert_eq!(both.len(), 2);
    assert_eq!(*calls.lock().unwrap(), vec!["gcp", "aws", "gcp"]);
}

#[tokio::test]
async fn test_first_failure_aborts() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let failing = Arc::new(StaticCdn::new("aws", ResourceTag::AwsCdn, None, &calls));
    let never = Arc::new(StaticCdn::new(
        "gcp",
        ResourceTag::GcpCdn,
        Some(CdnConfiguration::IpAddress {
            ip_address: "34.1.2.3".to_string(),
        }),
        &calls,
    ));
    let providers: Vec<Arc<dyn CdnProvider>> = vec![failing, never.clone()];
    let (network, shop) = (network(), shop());
    let bucket_urls = vec!["s3://b".to_string()];
    let domains = vec!["shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };
    let selection = ResourceSelection::new([ResourceTag::AwsCdn, ResourceTag::GcpCdn]);

    let err = configure_cdn_providers(&providers, &network.config, &selection, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, CdnError::NoDomains));
    assert_eq!(never.hits.load(Ordering::SeqCst), 0);
}
