use dshop_cloud::{GcpClient, GcpEndpoints};
use dshop_core::config::GcpConfig;
use dshop_dns::DnsRequest;
use dshop_dns::clouddns::set_cloud_dns_records;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client(server: &MockServer) -> GcpClient {
    GcpClient::with_token(
        "proj-1",
        "tok",
        GcpEndpoints::single(&server.base_url()),
        &GcpConfig::default(),
    )
}

fn request() -> DnsRequest {
    DnsRequest::new(
        "ogn.app",
        "myshop",
        None,
        vec!["34.1.2.3".to_string()],
        Some("QmHash".to_string()),
    )
    .unwrap()
}

fn mock_zone(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET)
            .path("/dns/v1/projects/proj-1/managedZones")
            .query_param("dnsName", "ogn.app.");
        then.status(200).json_body(json!({
            "managedZones": [{"name": "ogn-app", "dnsName": "ogn.app."}]
        }));
    });
}

#[tokio::test]
async fn test_cloud_dns_replaces_cname_with_a_records_in_one_change() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    mock_zone(&server);
    server.mock(|when, then| {
        when.method(GET)
            .path("/dns/v1/projects/proj-1/managedZones/ogn-app/rrsets")
            .query_param("name", "myshop.ogn.app.");
        then.status(200).json_body(json!({"rrsets": [
            {"name": "myshop.ogn.app.", "type": "CNAME", "ttl": 300, "rrdatas": ["ipfs.ogn.app."]}
        ]}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/dns/v1/projects/proj-1/managedZones/ogn-app/rrsets")
            .query_param("name", "_dnslink.myshop.ogn.app.");
        then.status(200).json_body(json!({"rrsets": []}));
    });
    let change = server.mock(|when, then| {
        when.method(POST)
            .path("/dns/v1/projects/proj-1/managedZones/ogn-app/changes")
            .header("authorization", "Bearer tok")
            .json_body(json!({
                "additions": [
                    {"name": "myshop.ogn.app.", "type": "A", "ttl": 300, "rrdatas": ["34.1.2.3"]},
                    {"name": "_dnslink.myshop.ogn.app.", "type": "TXT", "ttl": 300, "rrdatas": ["\"dnslink=/ipfs/QmHash\""]}
                ],
                "deletions": [
                    {"name": "myshop.ogn.app.", "type": "CNAME", "ttl": 300, "rrdatas": ["ipfs.ogn.app."]}
                ]
            }));
        then.status(200).json_body(json!({"id": "1", "status": "pending"}));
    });

    let changes = set_cloud_dns_records(&client(&server), &request())
        .await
        .unwrap();

    change.assert_hits(1);
    assert_eq!(changes.len(), 3);
}

#[tokio::test]
async fn test_cloud_dns_skips_change_when_up_to_date() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    mock_zone(&server);
    server.mock(|when, then| {
        when.method(GET)
            .path("/dns/v1/projects/proj-1/managedZones/ogn-app/rrsets")
            .query_param("name", "myshop.ogn.app.");
        then.status(200).json_body(json!({"rrsets": [
            {"name": "myshop.ogn.app.", "type": "A", "ttl": 300, "rrdatas": ["34.1.2.3"]}
        ]}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/dns/v1/projects/proj-1/managedZones/ogn-app/rrsets")
            .query_param("name", "_dnslink.myshop.ogn.app.");
        then.status(200).json_body(json!({"rrsets": [
            {"name": "_dnslink.myshop.ogn.app.", "type": "TXT", "ttl": 300, "rrdatas": ["\"dnslink=/ipfs/QmHash\""]}
        ]}));
    });
    let change = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({}));
    });

    for _ in 0..2 {
        let changes = set_cloud_dns_records(&client(&server), &request())
            .await
            .unwrap();
        assert!(changes.is_empty());
    }
    change.assert_hits(0);
}
