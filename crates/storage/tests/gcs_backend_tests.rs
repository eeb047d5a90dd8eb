use bytes::Bytes;
use dshop_cloud::{GcpClient, GcpEndpoints};
use dshop_core::config::GcpConfig;
use dshop_storage::backends::gcs::GcsBucketClient;
use dshop_storage::traits::{BucketClient, BucketState};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;
use std::sync::Arc;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client_for(server: &MockServer) -> GcsBucketClient {
    let gcp = GcpClient::with_token(
        "proj-1",
        "tok",
        GcpEndpoints::single(&server.base_url()),
        &GcpConfig::default(),
    );
    GcsBucketClient::new(Arc::new(gcp))
}

#[tokio::test]
async fn test_gcs_bucket_state_maps_statuses() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let exists = server.mock(|when, then| {
        when.method(GET).path("/storage/v1/b/mine");
        then.status(200).json_body(json!({"name": "mine"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/storage/v1/b/missing");
        then.status(404).json_body(json!({"error": {"code": 404}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/storage/v1/b/taken");
        then.status(403).json_body(json!({"error": {"code": 403}}));
    });
    let client = client_for(&server);

    assert_eq!(client.bucket_state("mine").await.unwrap(), BucketState::Exists);
    assert_eq!(
        client.bucket_state("missing").await.unwrap(),
        BucketState::Missing
    );
    assert_eq!(
        client.bucket_state("taken").await.unwrap(),
        BucketState::Forbidden
    );
    exists.assert_hits(1);
}

#[tokio::test]
async fn test_gcs_create_bucket_sets_website_and_public_acls() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/v1/b")
            .query_param("project", "proj-1")
            .query_param("predefinedAcl", "publicRead")
            .header("authorization", "Bearer tok")
            .json_body_partial(r#"{"name": "dshop-site", "website": {"mainPageSuffix": "index.html"}}"#);
        then.status(200).json_body(json!({"name": "dshop-site"}));
    });
    let acl = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/v1/b/dshop-site/acl")
            .json_body(json!({"entity": "allUsers", "role": "READER"}));
        then.status(200).json_body(json!({}));
    });
    let default_acl = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/v1/b/dshop-site/defaultObjectAcl")
            .json_body(json!({"entity": "allUsers", "role": "READER"}));
        then.status(200).json_body(json!({}));
    });

    client_for(&server)
        .create_public_bucket("dshop-site")
        .await
        .unwrap();

    create.assert_hits(1);
    acl.assert_hits(1);
    default_acl.assert_hits(1);
}

#[tokio::test]
async fn test_gcs_put_object_uses_media_upload_and_keeps_status() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let ok = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/site/o")
            .query_param("uploadType", "media")
            .query_param("name", "css/app.css")
            .header("content-type", "text/css")
            .body("body{}");
        then.status(200).json_body(json!({"name": "css/app.css"}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/site/o")
            .query_param("name", "flaky.html");
        then.status(502).body("bad gateway");
    });
    let client = client_for(&server);

    client
        .put_object("site", "css/app.css", Bytes::from_static(b"body{}"), "text/css")
        .await
        .unwrap();
    ok.assert_hits(1);

    let err = client
        .put_object("site", "flaky.html", Bytes::from_static(b"x"), "text/html")
        .await
        .unwrap_err();
    assert!(err.is_bad_gateway());
}

#[test]
fn test_gcs_urls() {
    let gcp = GcpClient::with_token(
        "proj-1",
        "tok",
        GcpEndpoints::single("http://unused"),
        &GcpConfig::default(),
    );
    let client = GcsBucketClient::new(Arc::new(gcp));
    assert_eq!(client.bucket_url("site"), "gs://site");
    assert_eq!(
        client.http_url("site"),
        "https://storage.googleapis.com/site"
    );
}
