//! Command-line binary tests
//!
//! Runs the `docchat` binary with a temp session database so nothing
//! touches the user's data directory.

use assert_cmd::Command;
use predicates::prelude::*;

use docchat::storage::{Message, SessionStore};
use docchat::ChatSession;

mod common;
use common::{create_temp_store, temp_config_file};

fn docchat() -> Command {
    let mut cmd = Command::cargo_bin("docchat").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("DOCCHAT_API_BASE_URL")
        .env_remove("DOCCHAT_SESSIONS_DB");
    cmd
}

#[test]
fn test_help_lists_commands() {
    docchat()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_history_list_empty() {
    let (store, _tmp) = create_temp_store();

    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved conversations found."));
}

#[test]
fn test_history_show_markdown_and_delete() {
    let (store, _tmp) = create_temp_store();
    store
        .put(&ChatSession::new(
            "abc",
            "report.pdf",
            vec![Message::user("What is the total?"), Message::assistant("42")],
        ))
        .expect("seed");

    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "show", "abc", "--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("### You\n\nWhat is the total?"))
        .stdout(predicate::str::contains("### AI Assistant\n\n42"));

    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "delete", "abc"])
        .assert()
        .success();

    assert!(store.get("abc").is_err());
}

#[test]
fn test_history_export_text_and_json_to_file() {
    let (store, tmp) = create_temp_store();
    store
        .put(&ChatSession::new(
            "abc",
            "report.pdf",
            vec![Message::user("What is the total?"), Message::assistant("42")],
        ))
        .expect("seed");

    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "show", "abc", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "USER: What is the total?\n\nASSISTANT: 42",
        ));

    let out = tmp.path().join("chat.json");
    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "show", "abc", "--format", "json", "--output"])
        .arg(&out)
        .assert()
        .success();

    let written = std::fs::read_to_string(&out).expect("export file");
    let messages: Vec<Message> = serde_json::from_str(&written).expect("json export");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "42");
}

#[test]
fn test_history_show_unknown_session_fails() {
    let (store, _tmp) = create_temp_store();

    docchat()
        .arg("--storage-path")
        .arg(store.db_path())
        .args(["history", "show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: missing"));
}

#[test]
fn test_health_reports_unreachable_server() {
    docchat()
        .args(["--api-url", "http://127.0.0.1:9", "health"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unhealthy"));
}

#[test]
fn test_invalid_api_url_in_config_is_rejected() {
    let (_dir, config_path) = temp_config_file(
        r#"
api:
  base_url: "ftp://files.example.com"
"#,
    );

    docchat()
        .arg("--config")
        .arg(config_path)
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("http or https"));
}

#[test]
fn test_upload_rejects_non_pdf() {
    let (dir, _config) = temp_config_file("{}");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").expect("write");

    docchat()
        .arg("upload")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only PDF files are supported."));
}
