use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn folio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("folio");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/folio.sqlite"

[server]
bind = "127.0.0.1:7341"

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("folio.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_folio(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = folio_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run folio binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_folio(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/folio.sqlite").exists());
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_folio(&config_path, &["init"]);
    assert!(success, "first init failed: {}", stderr);
    let (_, stderr, success) = run_folio(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_bin_list_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);

    let (stdout, stderr, success) = run_folio(&config_path, &["bin", "list"]);
    assert!(success, "bin list failed: {}", stderr);
    assert!(stdout.contains("Recycle bin is empty"));
}

#[test]
fn test_restore_missing_entry_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);

    let (_, stderr, success) = run_folio(&config_path, &["bin", "restore", "no-such-entry"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_purge_missing_entry_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);

    let (_, stderr, success) = run_folio(&config_path, &["bin", "purge", "no-such-entry"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        format!(
            "[db]\npath = \"{}/x.sqlite\"\n\n[server]\nbind = \"not-an-address\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_folio(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("server.bind"), "unexpected stderr: {}", stderr);
}
