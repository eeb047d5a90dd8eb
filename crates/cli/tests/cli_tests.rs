#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path) -> PathBuf {
    let config_path = dir.join("dshop.toml");
    let contents = format!(
        r#"
[paths]
cache_dir = "{cache}"

[metadata]
type = "sqlite"
path = "{db}"
"#,
        cache = dir.join("cache").display(),
        db = dir.join("dshop.db").display(),
    );
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

fn dshopctl(config_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dshopctl").unwrap();
    cmd.arg("--config").arg(config_path);
    cmd
}

#[test]
fn migrate_creates_database() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path());

    dshopctl(&config_path)
        .arg("migrate")
        .assert()
        .success()
        .stdout(contains("up to date"));

    assert!(temp.path().join("dshop.db").exists());
}

#[test]
fn history_on_empty_database() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path());

    dshopctl(&config_path)
        .args(["history", "--shop-id", "1"])
        .assert()
        .success()
        .stdout(contains("No deployments found."));
}

#[test]
fn deploy_unknown_shop_reports_general_error() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path());

    dshopctl(&config_path)
        .args(["deploy", "--shop-id", "42", "--network-id", "999"])
        .assert()
        .failure()
        .stdout(contains("\"id\": 1000"))
        .stderr(contains("deployment failed (1000)"));
}

#[test]
fn deploy_reads_job_file() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path());
    let job_path = temp.path().join("job.json");
    std::fs::write(
        &job_path,
        r#"{"networkId": 999, "shopId": 7, "resourceSelection": ["aws-files"]}"#,
    )
    .unwrap();

    dshopctl(&config_path)
        .arg("deploy")
        .arg("--job-file")
        .arg(&job_path)
        .assert()
        .failure()
        .stdout(contains("\"success\": false"));
}

#[test]
fn missing_configuration_is_reported() {
    let temp = TempDir::new().unwrap();

    dshopctl(&temp.path().join("missing.toml"))
        .env_remove("DSHOP_PATHS__CACHE_DIR")
        .arg("migrate")
        .assert()
        .failure()
        .stderr(contains("No configuration provided"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path());

    dshopctl(&config_path)
        .env("DSHOP_DEPLOY__GATEWAY_PRIME_CONCURRENCY", "0")
        .arg("migrate")
        .assert()
        .failure()
        .stderr(contains("gateway_prime_concurrency"));
}
