use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_bru")))
}

const REQUEST: &str = "meta {\n  name: List users\n  type: http\n  seq: 1\n}\n\nget {\n  url: {{baseUrl}}/users\n  body: none\n  auth: none\n}\n";

/// A small collection on disk.
fn collection() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(
        root.join("collection.bru"),
        "meta {\n  name: Shop\n}\n\nheaders {\n  x-tenant: acme\n}\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("users")).unwrap();
    fs::write(root.join("users/list.bru"), REQUEST).unwrap();
    fs::write(root.join("users/folder.bru"), "meta {\n  name: Users\n}\n").unwrap();
    fs::create_dir_all(root.join("environments")).unwrap();
    fs::write(
        root.join("environments/prod.bru"),
        "meta {\n  name: prod\n}\n\nvars {\n  baseUrl: https://api.example.com\n}\nvars:secret [\n  token\n]\n",
    )
    .unwrap();
    dir
}

fn config_with_cache(dir: &Path) -> std::path::PathBuf {
    let config = dir.join("bru.toml");
    let cache = dir.join("cache").join("parsed.json");
    fs::write(
        &config,
        format!("[cache]\npath = {:?}\n", cache.to_string_lossy()),
    )
    .unwrap();
    config
}

#[test]
fn cli_parse_to_json() {
    let dir = collection();
    let output = cmd()
        .arg("parse")
        .arg(dir.path().join("users/list.bru"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["kind"], "request");
    assert_eq!(json["meta"]["name"], "List users");
    assert_eq!(json["http"]["url"], "{{baseUrl}}/users");
}

#[test]
fn cli_parse_infers_environment() {
    let dir = collection();
    cmd()
        .arg("parse")
        .arg(dir.path().join("environments/prod.bru"))
        .args(["--to", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("kind: environment\n"))
        .stdout(predicate::str::contains("secret: true"));
}

#[test]
fn cli_parse_to_cbor_file() {
    let dir = collection();
    let out = dir.path().join("list.cbor");
    cmd()
        .arg("parse")
        .arg(dir.path().join("users/list.bru"))
        .args(["--to", "cbor", "-o"])
        .arg(&out)
        .assert()
        .success();
    let bytes = fs::read(out).unwrap();
    // A CBOR map.
    assert_eq!(bytes[0] >> 5, 5);
}

#[test]
fn cli_parse_error_names_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.bru");
    fs::write(&path, "get {\n  url: x\n}\n").unwrap();
    cmd()
        .arg("parse")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing meta block at 1:1 of <broken.bru>"));
}

#[test]
fn cli_fmt_writes_canonical_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("messy.bru");
    fs::write(
        &path,
        "\nmeta {\n  name:   Messy  \n}\n\n\n\nget {\n  url: https://x.test\n}\n",
    )
    .unwrap();

    cmd()
        .arg("fmt")
        .arg(&path)
        .assert()
        .success()
        .stdout("meta {\n  name: Messy\n}\n\nget {\n  url: https://x.test\n  body: none\n  auth: none\n}\n");

    cmd().arg("fmt").arg(&path).arg("--write").assert().success();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("meta {\n  name: Messy\n}\n"));
}

#[test]
fn cli_check_reports_each_failure() {
    let dir = collection();
    fs::write(dir.path().join("users/bad.bru"), "meta {\n  name: Bad\n").unwrap();

    cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("list.bru: ok"))
        .stdout(predicate::str::contains("prod.bru: ok"))
        .stderr(predicate::str::contains("bad.bru: "))
        .stderr(predicate::str::contains("list.bru").not());
}

#[test]
fn cli_check_uses_cache() {
    let dir = collection();
    let config = config_with_cache(dir.path());

    cmd()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(cached)").not());

    cmd()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("list.bru: ok (cached)"));

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalFiles\": 4"))
        .stdout(predicate::str::contains("\"totalCollections\": 1"));

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "clear"])
        .assert()
        .success();

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalFiles\": 0"));
}

#[test]
fn cli_cache_needs_a_path() {
    cmd()
        .args(["cache", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cache path configured"));
}

#[test]
fn cli_bad_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bru.toml");
    fs::write(&config, "[lanes]\nmax_queue_depth = \"deep\"\n").unwrap();
    cmd()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: "));
}
