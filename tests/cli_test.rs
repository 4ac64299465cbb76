use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "METADOC_CATALOG_URL",
    "METADOC_SOURCE",
    "METADOC_API_KEY",
    "METADOC_STAGING_DB",
    "METADOC_MAX_PREVIEW",
];

fn metadoc() -> Command {
    let mut cmd = Command::cargo_bin("metadoc").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_document(dir: &Path) -> String {
    let path = dir.join("source.json");
    std::fs::write(&path, r#"{"source": {"name": {"physical": "warehouse"}}}"#).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_commands() {
    let output = metadoc().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sync"));
    assert!(stdout.contains("reset"));
}

#[test]
fn test_reset_creates_staging_database() {
    let dir = TempDir::new().unwrap();
    let staging = dir.path().join("staging.db");

    let output = metadoc()
        .args(["--json", "--staging"])
        .arg(&staging)
        .arg("reset")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(staging.exists());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
}

#[test]
fn test_sync_without_catalog_url_is_config_error() {
    let dir = TempDir::new().unwrap();
    let document = write_document(dir.path());

    metadoc()
        .args(["sync", "--source", "warehouse", "--document", &document])
        .arg("--staging")
        .arg(dir.path().join("staging.db"))
        .assert()
        .code(7);
}

#[test]
fn test_sync_rejects_non_http_url() {
    let dir = TempDir::new().unwrap();
    let document = write_document(dir.path());

    metadoc()
        .args(["sync", "--url", "ftp://catalog.example.com", "--source", "warehouse"])
        .args(["--document", &document])
        .arg("--staging")
        .arg(dir.path().join("staging.db"))
        .assert()
        .code(7);
}

#[test]
fn test_sync_missing_document_is_io_error() {
    let dir = TempDir::new().unwrap();

    let output = metadoc()
        .args(["--json", "sync", "--url", "http://127.0.0.1:1", "--source", "warehouse"])
        .args(["--document", "/nonexistent/source.json"])
        .arg("--staging")
        .arg(dir.path().join("staging.db"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(8));
}

#[test]
fn test_sync_unreachable_catalog_is_transport_error() {
    let dir = TempDir::new().unwrap();
    let document = write_document(dir.path());

    metadoc()
        .args(["sync", "--dry-run", "--url", "http://127.0.0.1:1", "--source", "warehouse"])
        .args(["--document", &document])
        .arg("--staging")
        .arg(dir.path().join("staging.db"))
        .assert()
        .code(5);
}
