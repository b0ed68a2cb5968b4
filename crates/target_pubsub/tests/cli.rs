mod common;

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::serve_once;
use serde_json::Value;

const INPUT: &str = concat!(
    r#"{"type": "SCHEMA", "stream": "users", "key_properties": ["id"], "schema": {"type": "object", "properties": {"id": {"type": "integer"}}}}"#,
    "\n",
    r#"{"type": "RECORD", "stream": "users", "record": {"id": 7, "name": "Ada"}}"#,
    "\n",
);

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create config file");
    file.write_all(contents.as_bytes()).expect("write config file");
    file
}

/// Runs the binary off the async runtime so the fake broker keeps serving.
async fn run_target(config: &str, emulator_host: String, input: &'static str) -> Output {
    let config = write_config(config);
    tokio::task::spawn_blocking(move || {
        let target_bin = PathBuf::from(env!("CARGO_BIN_EXE_target-pubsub"));
        let mut child = Command::new(target_bin)
            .arg("--config")
            .arg(config.path())
            .env("PUBSUB_EMULATOR_HOST", emulator_host)
            .env_remove("GOOGLE_OAUTH_ACCESS_TOKEN")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn target-pubsub");
        // Exits without reading stdin when the config is rejected.
        let mut stdin = child.stdin.take().expect("child stdin");
        let _ = stdin.write_all(input.as_bytes());
        drop(stdin);
        child.wait_with_output().expect("wait for target-pubsub")
    })
    .await
    .expect("join target-pubsub runner")
}

#[tokio::test]
async fn publishes_records_and_prints_final_state() {
    let (endpoint, server) = serve_once("200 OK", r#"{"messageIds":["11"]}"#).await;
    let host = endpoint.trim_start_matches("http://").to_string();

    let output = run_target(
        r#"{"project_id": "xyz", "disable_collection": true}"#,
        host,
        INPUT,
    )
    .await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "{\"users\":[7]}\n");

    let captured = server.await.unwrap();
    assert!(captured
        .head
        .starts_with("POST /v1/projects/xyz/topics/users:publish "));
    let body: Value = serde_json::from_slice(&captured.body).unwrap();
    let data = STANDARD
        .decode(body["messages"][0]["data"].as_str().unwrap())
        .unwrap();
    let envelope: Value = serde_json::from_slice(&data).unwrap();
    assert_eq!(envelope["stream"], "users");
    assert_eq!(envelope["record"]["name"], "Ada");
}

#[tokio::test]
async fn malformed_input_exits_nonzero_without_state() {
    let output = run_target(
        r#"{"project_id": "xyz", "disable_collection": true}"#,
        "127.0.0.1:9".to_string(),
        "{\"type\": \"SCHEMA\",\n",
    )
    .await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 1"), "stderr: {stderr}");
}

#[tokio::test]
async fn invalid_config_exits_nonzero_without_state() {
    let output = run_target(
        r#"{"project_id": "xyz", "disable_collection": true, "publish_timeout_secs": 0}"#,
        "127.0.0.1:9".to_string(),
        INPUT,
    )
    .await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
