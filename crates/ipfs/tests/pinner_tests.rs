use dshop_ipfs::{ClusterPinner, DirectoryUpload, IpfsError, LocalNodePinner, PinataPinner, Pinner};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;
use std::path::Path;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

async fn sample_upload(root: &Path) -> DirectoryUpload {
    let public = root.join("public");
    std::fs::create_dir_all(public.join("token1")).unwrap();
    std::fs::write(public.join("index.html"), "<html></html>").unwrap();
    std::fs::write(public.join("token1/config.json"), "{}").unwrap();
    DirectoryUpload::read(&public).await.unwrap()
}

#[tokio::test]
async fn test_read_directory() {
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;
    assert_eq!(upload.root, "public");
    assert_eq!(
        upload.keys().collect::<Vec<_>>(),
        vec!["index.html", "token1/config.json"]
    );
    assert_eq!(upload.files[0].content_type, "text/html");
}

#[tokio::test]
async fn test_cluster_add_uses_basic_auth_and_returns_root() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/add")
            .header("authorization", "Basic YWRtaW46c2VjcmV0")
            .body_contains("public/token1/config.json");
        then.status(200).body(concat!(
            "{\"name\":\"public/index.html\",\"cid\":{\"/\":\"QmIndex\"}}\n",
            "{\"name\":\"public\",\"cid\":{\"/\":\"QmRoot\"}}\n"
        ));
    });
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;

    let pinner =
        ClusterPinner::new(reqwest::Client::new(), &server.base_url(), "admin", "secret").unwrap();
    assert!(pinner.identity().starts_with("/ip4/127.0.0.1/tcp/"));
    assert!(pinner.identity().ends_with("/http"));

    let hash = pinner.add_directory(&upload).await.unwrap();
    assert_eq!(hash, "QmRoot");
    add.assert_hits(1);
}

#[tokio::test]
async fn test_cluster_error_status() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/add");
        then.status(401).body("unauthorized");
    });
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;

    let pinner =
        ClusterPinner::new(reqwest::Client::new(), &server.base_url(), "admin", "wrong").unwrap();
    let err = pinner.add_directory(&upload).await.unwrap_err();
    assert!(matches!(err, IpfsError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_pinata_pin_file_to_ipfs() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let pin = server.mock(|when, then| {
        when.method(POST)
            .path("/pinning/pinFileToIPFS")
            .header("pinata_api_key", "key")
            .header("pinata_secret_api_key", "secret")
            .body_contains("public/index.html");
        then.status(200)
            .json_body(json!({"IpfsHash": "QmPinata", "PinSize": 42}));
    });
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;

    let pinner =
        PinataPinner::with_api_url(reqwest::Client::new(), &server.base_url(), "key", "secret");
    assert_eq!(pinner.add_directory(&upload).await.unwrap(), "QmPinata");
    pin.assert_hits(1);
}

#[tokio::test]
async fn test_pinata_without_hash_is_fatal() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/pinning/pinFileToIPFS");
        then.status(200).json_body(json!({"PinSize": 0}));
    });
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;

    let pinner =
        PinataPinner::with_api_url(reqwest::Client::new(), &server.base_url(), "key", "secret");
    let err = pinner.add_directory(&upload).await.unwrap_err();
    assert!(matches!(err, IpfsError::MissingHash { pinner } if pinner == "pinata"));
}

#[tokio::test]
async fn test_local_node_add() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v0/add")
            .query_param("pin", "true")
            .body_contains("application/x-directory");
        then.status(200).body(concat!(
            "{\"Name\":\"public/index.html\",\"Hash\":\"QmIndex\",\"Size\":\"21\"}\n",
            "{\"Name\":\"public/token1\",\"Hash\":\"QmTok\",\"Size\":\"10\"}\n",
            "{\"Name\":\"public\",\"Hash\":\"QmLocalRoot\",\"Size\":\"40\"}\n"
        ));
    });
    let dir = tempfile::tempdir().unwrap();
    let upload = sample_upload(dir.path()).await;

    let pinner = LocalNodePinner::new(reqwest::Client::new(), &server.base_url());
    assert_eq!(pinner.add_directory(&upload).await.unwrap(), "QmLocalRoot");
    add.assert_hits(1);
}
