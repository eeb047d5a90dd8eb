use dshop_cdn::CdnRequest;
use dshop_cdn::error::CdnError;
use dshop_cdn::gcp::configure_cloud_cdn;
use dshop_cloud::{GcpClient, GcpEndpoints};
use dshop_core::config::GcpConfig;
use dshop_core::{CdnConfiguration, Network, NetworkConfig, Shop};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

const GLOBAL: &str = "/compute/v1/projects/proj-1/global";
const BASE: &str = "dshop-localhost-token1";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client(base_url: &str) -> GcpClient {
    GcpClient::with_token(
        "proj-1",
        "tok",
        GcpEndpoints::single(base_url),
        &GcpConfig::default(),
    )
}

fn test_network() -> Network {
    Network {
        network_id: 999,
        name: "localhost".to_string(),
        ipfs_gateway: None,
        ipfs_api: None,
        config: NetworkConfig::default(),
    }
}

fn test_shop() -> Shop {
    Shop {
        shop_id: 1,
        name: "Shop".to_string(),
        auth_token: "token1".to_string(),
        network_id: 999,
        has_changes: false,
    }
}

fn done(name: &str) -> serde_json::Value {
    json!({"name": name, "status": "DONE"})
}

fn mock_existing(server: &MockServer, resource: &str, body: serde_json::Value) {
    let path = format!("{GLOBAL}/{resource}");
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200).json_body(body);
    });
}

#[tokio::test]
async fn test_existing_setup_is_reused_and_invalidated() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    mock_existing(&server, &format!("backendBuckets/{BASE}-backend"), json!({"name": "b"}));
    mock_existing(&server, &format!("urlMaps/{BASE}-url-map"), json!({"name": "u"}));
    let invalidate = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/urlMaps/{BASE}-url-map/invalidateCache"))
            .json_body(json!({"path": "/*"}));
        then.status(200).json_body(done("op-invalidate"));
    });
    mock_existing(
        &server,
        "sslCertificates",
        json!({"items": [
            {"name": format!("{BASE}-cert"), "managed": {"domains": ["shop.ogn.app"]}}
        ]}),
    );
    mock_existing(
        &server,
        &format!("targetHttpsProxies/{BASE}-https-proxy"),
        json!({
            "name": format!("{BASE}-https-proxy"),
            "sslCertificates": [format!("https://compute.googleapis.com{GLOBAL}/sslCertificates/{BASE}-cert")]
        }),
    );
    mock_existing(&server, &format!("targetHttpProxies/{BASE}-http-proxy"), json!({"name": "p"}));
    mock_existing(
        &server,
        &format!("addresses/{BASE}-address"),
        json!({"name": format!("{BASE}-address"), "address": "34.1.2.3"}),
    );
    mock_existing(&server, &format!("forwardingRules/{BASE}-https-rule"), json!({"name": "r"}));
    mock_existing(&server, &format!("forwardingRules/{BASE}-http-rule"), json!({"name": "r"}));
    let inserts: Vec<_> = [
        "backendBuckets",
        "urlMaps",
        "sslCertificates",
        "targetHttpsProxies",
        "targetHttpProxies",
        "addresses",
        "forwardingRules",
    ]
    .into_iter()
    .map(|collection| {
        server.mock(|when, then| {
            when.method(POST).path(format!("{GLOBAL}/{collection}"));
            then.status(200).json_body(done("op-unexpected"));
        })
    })
    .collect();

    let client = client(&server.base_url());
    let (network, shop) = (test_network(), test_shop());
    let bucket_urls = vec![format!("gs://{BASE}"), format!("s3://{BASE}")];
    let domains = vec!["shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };

    let result = configure_cloud_cdn(&client, &request).await.unwrap();

    assert_eq!(
        result,
        CdnConfiguration::IpAddress {
            ip_address: "34.1.2.3".to_string()
        }
    );
    invalidate.assert_hits(1);
    for insert in &inserts {
        insert.assert_hits(0);
    }
}

#[tokio::test]
async fn test_domain_change_rolls_certificate_and_recreates_proxy() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    mock_existing(&server, &format!("backendBuckets/{BASE}-backend"), json!({"name": "b"}));
    mock_existing(&server, &format!("urlMaps/{BASE}-url-map"), json!({"name": "u"}));
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/urlMaps/{BASE}-url-map/invalidateCache"));
        then.status(200).json_body(done("op-invalidate"));
    });
    mock_existing(
        &server,
        "sslCertificates",
        json!({"items": [
            {"name": format!("{BASE}-cert"), "managed": {"domains": ["old.ogn.app"]}},
            {"name": format!("{BASE}-cert-1"), "managed": {"domains": ["shop.ogn.app"]}},
            {"name": "unrelated-cert", "managed": {"domains": ["x.com"]}}
        ]}),
    );
    let insert_cert = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/sslCertificates"))
            .json_body_partial(
                json!({
                    "name": format!("{BASE}-cert-2"),
                    "type": "MANAGED",
                    "managed": {"domains": ["shop.ogn.app", "www.shop.ogn.app"]}
                })
                .to_string(),
            );
        then.status(200).json_body(done("op-cert"));
    });
    let prune = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("{GLOBAL}/sslCertificates/{BASE}-cert"));
        then.status(200).json_body(done("op-prune"));
    });
    mock_existing(
        &server,
        &format!("targetHttpsProxies/{BASE}-https-proxy"),
        json!({
            "name": format!("{BASE}-https-proxy"),
            "sslCertificates": [format!("https://compute.googleapis.com{GLOBAL}/sslCertificates/{BASE}-cert-1")]
        }),
    );
    mock_existing(&server, &format!("forwardingRules/{BASE}-https-rule"), json!({"name": "r"}));
    let delete_rule = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("{GLOBAL}/forwardingRules/{BASE}-https-rule"));
        then.status(200).json_body(done("op-delete-rule"));
    });
    let delete_proxy = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("{GLOBAL}/targetHttpsProxies/{BASE}-https-proxy"));
        then.status(200).json_body(done("op-delete-proxy"));
    });
    let insert_proxy = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/targetHttpsProxies"))
            .body_contains(format!("sslCertificates/{BASE}-cert-2"));
        then.status(200).json_body(done("op-proxy"));
    });
    mock_existing(&server, &format!("targetHttpProxies/{BASE}-http-proxy"), json!({"name": "p"}));
    mock_existing(
        &server,
        &format!("addresses/{BASE}-address"),
        json!({"address": "34.9.9.9"}),
    );
    let insert_rule = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/forwardingRules"))
            .json_body_partial(
                json!({
                    "name": format!("{BASE}-https-rule"),
                    "IPAddress": "34.9.9.9",
                    "portRange": "443"
                })
                .to_string(),
            );
        then.status(200).json_body(done("op-rule"));
    });
    mock_existing(&server, &format!("forwardingRules/{BASE}-http-rule"), json!({"name": "r"}));

    let client = client(&server.base_url());
    let (network, shop) = (test_network(), test_shop());
    let bucket_urls = vec![format!("gs://{BASE}")];
    let domains = vec!["shop.ogn.app".to_string(), "www.shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };

    let result = configure_cloud_cdn(&client, &request).await.unwrap();

    assert_eq!(
        result,
        CdnConfiguration::IpAddress {
            ip_address: "34.9.9.9".to_string()
        }
    );
    insert_cert.assert_hits(1);
    prune.assert_hits(1);
    delete_rule.assert_hits(1);
    delete_proxy.assert_hits(1);
    insert_proxy.assert_hits(1);
    insert_rule.assert_hits(1);
}

#[tokio::test]
async fn test_missing_gcs_bucket_is_rejected() {
    let client = client("http://127.0.0.1:9");
    let (network, shop) = (test_network(), test_shop());
    let bucket_urls = vec![format!("s3://{BASE}")];
    let domains = vec!["shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };

    let err = configure_cloud_cdn(&client, &request).await.unwrap_err();
    assert!(matches!(err, CdnError::MissingBucket { scheme: "gs" }));
}

#[tokio::test]
async fn test_failed_managed_certificate_is_fatal() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    mock_existing(&server, &format!("backendBuckets/{BASE}-backend"), json!({"name": "b"}));
    mock_existing(&server, &format!("urlMaps/{BASE}-url-map"), json!({"name": "u"}));
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{GLOBAL}/urlMaps/{BASE}-url-map/invalidateCache"));
        then.status(200).json_body(done("op-invalidate"));
    });
    mock_existing(
        &server,
        "sslCertificates",
        json!({"items": [
            {
                "name": format!("{BASE}-cert"),
                "managed": {"domains": ["shop.ogn.app"], "status": "PROVISIONING_FAILED"}
            }
        ]}),
    );
    let insert_cert = server.mock(|when, then| {
        when.method(POST).path(format!("{GLOBAL}/sslCertificates"));
        then.status(200).json_body(done("op-cert"));
    });
    let insert_proxy = server.mock(|when, then| {
        when.method(POST).path(format!("{GLOBAL}/targetHttpsProxies"));
        then.status(200).json_body(done("op-proxy"));
    });

    let client = client(&server.base_url());
    let (network, shop) = (test_network(), test_shop());
    let bucket_urls = vec![format!("gs://{BASE}")];
    let domains = vec!["shop.ogn.app".to_string()];
    let request = CdnRequest {
        network: &network,
        shop: &shop,
        bucket_urls: &bucket_urls,
        domains: &domains,
    };

    let err = configure_cloud_cdn(&client, &request).await.unwrap_err();

    match err {
        CdnError::CertificateFailed { name } => assert_eq!(name, format!("{BASE}-cert")),
        other => panic!("expected CertificateFailed, got {other:?}"),
    }
    insert_cert.assert_hits(0);
    insert_proxy.assert_hits(0);
}
