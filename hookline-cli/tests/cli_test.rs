//! End-to-end tests for the `hookline` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const BODY: &str = r#"{"event":"user_signup","payload":{"user_id":"u1"},"timestamp":1700000000000}"#;

fn hookline() -> Command {
    let mut cmd = Command::cargo_bin("hookline").unwrap();
    cmd.arg("--no-color").env_remove("HOOKLINE_SECRET");
    cmd
}

fn signature_of(body: &str, secret: &str) -> String {
    let output = hookline()
        .args(["sign", "--secret", secret])
        .write_stdin(body)
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[test]
fn test_sign_prints_hex() {
    let sig = signature_of(BODY, "s3cr3t");
    assert_eq!(sig.len(), 64);
    assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(sig, hookline_webhooks::sign(BODY.as_bytes(), "s3cr3t"));
}

#[test]
fn test_sign_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BODY.as_bytes()).unwrap();

    hookline()
        .args(["sign", "--secret", "s3cr3t", "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(hookline_webhooks::sign(
            BODY.as_bytes(),
            "s3cr3t",
        )));
}

#[test]
fn test_verify_valid() {
    let sig = signature_of(BODY, "s3cr3t");
    hookline()
        .args(["verify", "--secret", "s3cr3t", "--signature", &sig])
        .write_stdin(BODY)
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("valid"));
}

#[test]
fn test_verify_invalid_exits_one() {
    let sig = signature_of(BODY, "s3cr3t");
    hookline()
        .args(["verify", "--secret", "wrong", "--signature", &sig])
        .write_stdin(BODY)
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("invalid"));

    hookline()
        .args(["verify", "--secret", "s3cr3t", "--signature", "not-hex"])
        .write_stdin(BODY)
        .assert()
        .code(1);
}

#[test]
fn test_send_to_unreachable_exits_two() {
    hookline()
        .args([
            "send",
            "--url",
            "http://127.0.0.1:9/hook",
            "--event",
            "user_signup",
            "--max-attempts",
            "1",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"failed\""));
}

#[test]
fn test_send_rejects_bad_url() {
    hookline()
        .args(["send", "--url", "ftp://example.com", "--event", "user_signup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid subscription"));
}

#[test]
fn test_send_rejects_bad_payload() {
    hookline()
        .args([
            "send",
            "--url",
            "http://127.0.0.1:9/hook",
            "--event",
            "user_signup",
            "--payload",
            "{not json",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("JSON error"));
}
