use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn meiliscan_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_meiliscan"));
    cmd.env("HOME", home);
    cmd.env_remove("MEILISCAN_CONFIG");
    cmd.env_remove("MEILISCAN_UI_COLOR");
    cmd.env_remove("MEILISCAN_UI_MAX_TABLE_ROWS");
    cmd.env_remove("MEILISCAN_URL");
    cmd.env_remove("MEILISCAN_TIMEOUT_SECS");
    cmd.env_remove("MEILISCAN_SAMPLE_DOCUMENTS");
    cmd.env_remove("MEILISCAN_PROBE_SEARCH");
    cmd.env_remove("MEILISCAN_DETECT_SENSITIVE");
    cmd.env_remove("MEILISCAN_FAIL_ON_WARNINGS");
    cmd.env_remove("MEILI_MASTER_KEY");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    meiliscan_cmd(home)
        .args(args)
        .output()
        .expect("run meiliscan")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("meiliscan-exit-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn analyze_with_url_and_dump_exits_2() {
    let home = make_temp_home();
    let out = run(
        &home,
        &[
            "analyze",
            "--url",
            "http://localhost:7700",
            "--dump",
            "/tmp/does-not-matter",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn analyze_without_source_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["analyze"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn analyze_unsupported_format_exits_2() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("create dump dir");
    std::fs::write(dump.join("metadata.json"), br#"{"dumpVersion": "V6"}"#).expect("metadata");

    let out = run(
        &home,
        &[
            "analyze",
            "--dump",
            dump.to_str().expect("utf-8 path"),
            "--format",
            "yaml",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn analyze_missing_dump_exits_10() {
    let home = make_temp_home();
    let out = run(&home, &["analyze", "--dump", "/nonexistent/dump-dir"]);
    assert_eq!(out.status.code(), Some(10));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn analyze_empty_dump_succeeds() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("create dump dir");
    std::fs::write(dump.join("metadata.json"), br#"{"dumpVersion": "V6"}"#).expect("metadata");

    let out = run(
        &home,
        &["--json", "analyze", "--dump", dump.to_str().expect("utf-8 path")],
    );
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse report json");
    assert_eq!(v["summary"]["health_score"], 100);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn compare_missing_file_exits_10() {
    let home = make_temp_home();
    let out = run(&home, &["compare", "/nonexistent/a.json", "/nonexistent/b.json"]);
    assert_eq!(out.status.code(), Some(10));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn tasks_without_url_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["tasks"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unreachable_instance_exits_20() {
    let home = make_temp_home();
    // Port 1 on localhost refuses connections on any sane CI box.
    let out = run(
        &home,
        &["--timeout", "2", "analyze", "--url", "http://127.0.0.1:1"],
    );
    assert_eq!(out.status.code(), Some(20));
    let _ = std::fs::remove_dir_all(&home);
}
