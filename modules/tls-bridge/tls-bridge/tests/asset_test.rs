#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use httpmock::prelude::*;
use serde_json::json;
use tls_bridge::{AssetConfig, AssetManager, AssetRecord, ClientError, Platform, UpdateOutcome};

const ASSET: &str = "tls-client-linux-amd64-1.7.2.so";
const UNREACHABLE: &str = "http://127.0.0.1:9/releases/latest";

fn linux() -> Platform {
    Platform {
        os: "linux".to_owned(),
        arch: "x86_64".to_owned(),
        pointer_width: 64,
        distro: None,
    }
}

fn manager(dir: &Path, release_url: impl Into<String>) -> AssetManager {
    let config = AssetConfig {
        install_dir: dir.to_path_buf(),
        release_url: release_url.into(),
        max_retries: 1,
        retry_delay_ms: 1,
        ..AssetConfig::default()
    };
    AssetManager::with_platform(config, linux()).unwrap()
}

async fn install(dir: &Path, filename: &str, version: &str) {
    tokio::fs::write(dir.join(filename), b"ENGINE").await.unwrap();
    tokio::fs::write(dir.join(".version"), format!("{filename} {version}"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_download_installs_asset_then_record() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();

    let release = server.mock(|when, then| {
        when.method(GET)
            .path("/releases/latest")
            .header("Accept", "application/vnd.github.v3+json");
        then.status(200).json_body(json!({
            "tag_name": "v1.7.2",
            "assets": [
                {"name": "tls-client-darwin-arm64-1.7.2.dylib", "browser_download_url": server.url("/dl/darwin")},
                {"name": ASSET, "browser_download_url": server.url("/dl/linux")}
            ]
        }));
    });
    let download = server.mock(|when, then| {
        when.method(GET).path("/dl/linux");
        then.status(200).body("ENGINE-BYTES");
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let record = manager.download_if_necessary().await.unwrap();

    release.assert();
    download.assert();
    assert_eq!(record, AssetRecord::new(ASSET, "1.7.2"));
    assert_eq!(
        tokio::fs::read(dir.path().join(ASSET)).await.unwrap(),
        b"ENGINE-BYTES"
    );
    assert_eq!(manager.read_version_record().await.unwrap(), Some(record));
    assert_eq!(manager.ensure_ready().await.unwrap(), dir.path().join(ASSET));
}

#[tokio::test]
async fn test_recorded_file_skips_network() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), ASSET, "1.7.2").await;

    let manager = manager(dir.path(), UNREACHABLE);

    let record = manager.download_if_necessary().await.unwrap();
    assert_eq!(record, AssetRecord::new(ASSET, "1.7.2"));
    assert_eq!(manager.ensure_ready().await.unwrap(), dir.path().join(ASSET));
}

#[tokio::test]
async fn test_existing_file_for_latest_version_is_recorded_without_download() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join(ASSET), b"ENGINE").await.unwrap();

    let release = server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({
            "tag_name": "v1.7.2",
            "assets": [{"name": ASSET, "browser_download_url": server.url("/dl/missing")}]
        }));
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let record = manager.download_if_necessary().await.unwrap();

    release.assert();
    assert_eq!(record.filename, ASSET);
    assert_eq!(manager.read_version_record().await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_missing_platform_asset_is_configuration_error() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();

    server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({
            "tag_name": "v1.7.2",
            "assets": [{"name": "tls-client-windows-64-1.7.2.dll", "browser_download_url": server.url("/dl/win")}]
        }));
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let err = manager.download_if_necessary().await.unwrap_err();

    assert!(matches!(err, ClientError::Configuration(ref msg) if msg.contains(ASSET)));
    assert_eq!(manager.read_version_record().await.unwrap(), None);
}

#[tokio::test]
async fn test_release_without_assets_is_resource_not_found() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();

    server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({"tag_name": "v1.7.2", "assets": []}));
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let err = manager.download_if_necessary().await.unwrap_err();

    assert!(matches!(err, ClientError::ResourceNotFound(_)));
}

#[tokio::test]
async fn test_release_lookup_gives_up_after_retries() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();

    let release = server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(503);
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let err = manager.latest_release().await.unwrap_err();

    assert!(matches!(err, ClientError::Network(ref msg) if msg.contains("503")));
    // One initial attempt plus `max_retries: 1`.
    release.assert_calls(2);
}

#[tokio::test]
async fn test_release_lookup_recovers_from_transient_failure() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();

    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/releases/latest");
            then.status(503);
        })
        .await;

    let config = AssetConfig {
        install_dir: dir.path().to_path_buf(),
        release_url: server.url("/releases/latest"),
        max_retries: 2,
        retry_delay_ms: 300,
        ..AssetConfig::default()
    };
    let manager = AssetManager::with_platform(config, linux()).unwrap();

    let recover = async {
        while failing.calls_async().await == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        failing.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/releases/latest");
                then.status(200).json_body(json!({
                    "tag_name": "v1.7.2",
                    "assets": [{"name": ASSET, "browser_download_url": server.url("/dl/linux")}]
                }));
            })
            .await
    };
    let (release, recovered) = tokio::join!(manager.latest_release(), recover);

    let release = release.unwrap();
    assert_eq!(release.version, "1.7.2");
    assert_eq!(release.assets.len(), 1);
    recovered.assert_calls_async(1).await;
}

#[tokio::test]
async fn test_failed_download_leaves_no_record_or_partial_file() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();

    server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({
            "tag_name": "v1.7.2",
            "assets": [{"name": ASSET, "browser_download_url": server.url("/dl/linux")}]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/dl/linux");
        then.status(500);
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let err = manager.download_if_necessary().await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert!(!dir.path().join(ASSET).exists());
    assert_eq!(manager.read_version_record().await.unwrap(), None);
}

#[tokio::test]
async fn test_update_without_record_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), UNREACHABLE);

    let err = manager.update_if_necessary().await.unwrap_err();

    assert!(matches!(err, ClientError::ResourceNotFound(_)));
}

#[tokio::test]
async fn test_update_replaces_outdated_engine() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), ASSET, "1.7.2").await;
    let newer = "tls-client-linux-amd64-1.8.0.so";

    server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({
            "tag_name": "v1.8.0",
            "assets": [{"name": newer, "browser_download_url": server.url("/dl/1.8.0")}]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/dl/1.8.0");
        then.status(200).body("NEW");
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let outcome = manager.update_if_necessary().await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            previous: "1.7.2".to_owned(),
            record: AssetRecord::new(newer, "1.8.0"),
        }
    );
    assert_eq!(manager.ensure_ready().await.unwrap(), dir.path().join(newer));
}

#[tokio::test]
async fn test_update_is_noop_when_current() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), ASSET, "1.7.2").await;

    server.mock(|when, then| {
        when.method(GET).path("/releases/latest");
        then.status(200).json_body(json!({
            "tag_name": "v1.7.2",
            "assets": [{"name": ASSET, "browser_download_url": server.url("/dl/linux")}]
        }));
    });

    let manager = manager(dir.path(), server.url("/releases/latest"));
    let outcome = manager.update_if_necessary().await.unwrap();

    assert_eq!(outcome, UpdateOutcome::UpToDate(AssetRecord::new(ASSET, "1.7.2")));
}

#[tokio::test]
async fn test_unrecorded_files_block_first_use_install() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("stray.so"), b"x").await.unwrap();
    let manager = manager(dir.path(), UNREACHABLE);

    let err = manager.ensure_ready().await.unwrap_err();

    assert!(matches!(err, ClientError::ResourceNotFound(_)));
}

#[tokio::test]
async fn test_record_naming_missing_file_is_resource_not_found() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join(".version"), format!("{ASSET} 1.7.2"))
        .await
        .unwrap();
    let manager = manager(dir.path(), UNREACHABLE);

    let err = manager.ensure_ready().await.unwrap_err();

    assert!(matches!(err, ClientError::ResourceNotFound(ref msg) if msg.contains(ASSET)));
}

#[tokio::test]
async fn test_clean_removes_every_file() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), ASSET, "1.7.2").await;
    let manager = manager(dir.path(), UNREACHABLE);

    let removed = manager.clean().await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(manager.read_version_record().await.unwrap(), None);
    assert!(!dir.path().join(ASSET).exists());
}
