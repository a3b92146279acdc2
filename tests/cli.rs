use std::io::Read;

use assert_cmd::Command;
use predicates::prelude::*;
use tiny_http::{Header, Response, Server};

const ANALYSIS: &str = r#"{
    "model_performance": {"tp": 9, "tn": 9, "fp": 1, "fn": 1,
        "accuracy": 0.9, "precision": 0.9, "recall": 0.9},
    "expenditure_analysis": {"total_spend": 10.0,
        "spend_by_category": {"Dining": 10.0}, "savings_plan": {}},
    "user_anomalies": []
}"#;

/// Answer one request with `body` and return the base URL.
fn serve_analysis(body: &'static str) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    std::thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let mut sink = Vec::new();
        let _ = request.as_reader().read_to_end(&mut sink);
        let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
        let _ = request.respond(Response::from_string(body).with_header(header));
    });
    format!("http://127.0.0.1:{port}")
}

fn capital_iq(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("capital-iq").unwrap();
    cmd.env("HOME", home).env_remove("CAPITAL_IQ_API_URL");
    cmd
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("confusion-matrix"));
}

#[test]
fn config_show_reports_env_override() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .env("CAPITAL_IQ_API_URL", "https://iq.example.com")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://iq.example.com (from CAPITAL_IQ_API_URL)",
        ));
}

#[test]
fn config_set_url_persists() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .args(["config", "set-url", "http://10.0.0.5:5000/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://10.0.0.5:5000"));
    capital_iq(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("API URL:     http://10.0.0.5:5000"));
}

#[test]
fn config_set_url_rejects_bare_host() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .args(["config", "set-url", "localhost:5000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: "));
}

#[test]
fn blank_question_fails_without_network() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Enter a question to ask."));
}

#[test]
fn analyze_missing_file_fails() {
    let home = tempfile::tempdir().unwrap();
    capital_iq(home.path())
        .args(["analyze", "/nonexistent/cards.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: IO error"));
}

#[test]
fn analyze_keeps_stderr_quiet_by_default() {
    let home = tempfile::tempdir().unwrap();
    let csv = home.path().join("cards.csv");
    std::fs::write(&csv, "Time,Amount,Category\n1,10.0,Dining\n").unwrap();
    capital_iq(home.path())
        .env("CAPITAL_IQ_API_URL", serve_analysis(ANALYSIS))
        .env_remove("RUST_LOG")
        .arg("analyze")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("0.9000"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn analyze_logs_progress_when_asked() {
    let home = tempfile::tempdir().unwrap();
    let csv = home.path().join("cards.csv");
    std::fs::write(&csv, "Time,Amount,Category\n1,10.0,Dining\n").unwrap();
    capital_iq(home.path())
        .env("CAPITAL_IQ_API_URL", serve_analysis(ANALYSIS))
        .env("RUST_LOG", "info")
        .arg("analyze")
        .arg(&csv)
        .assert()
        .success()
        .stderr(predicate::str::contains("analyzing"));
}
