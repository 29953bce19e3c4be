//! Tests for the revpipe binary: exit codes and an end-to-end session

use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::time::timeout;

fn revpipe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_revpipe"));
    cmd.env_remove("RUST_LOG")
        .env_remove("REVPIPE_LOG_LEVEL")
        .env_remove("REVPIPE_CONNECT_TIMEOUT")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

async fn run(args: &[&str]) -> std::process::Output {
    timeout(Duration::from_secs(10), revpipe().args(args).output())
        .await
        .expect("revpipe did not exit in time")
        .expect("failed to run revpipe")
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_missing_arguments_is_usage_error() {
    let output = run(&["127.0.0.1", "80", "127.0.0.1"]).await;
    assert_eq!(output.status.code(), Some(30));
}

#[tokio::test]
async fn test_too_many_arguments_is_usage_error() {
    let output = run(&["127.0.0.1", "80", "127.0.0.1", "81", "extra"]).await;
    assert_eq!(output.status.code(), Some(30));
}

#[tokio::test]
async fn test_zero_port_is_configuration_error() {
    let output = run(&["127.0.0.1", "0", "127.0.0.1", "81"]).await;
    assert_eq!(output.status.code(), Some(25));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_non_numeric_port_is_configuration_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let output = run(&["127.0.0.1", &port, "127.0.0.1", "http"]).await;
    assert_eq!(output.status.code(), Some(25));

    // Validation happens before any connection is attempted.
    let accepted = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err());
}

#[tokio::test]
async fn test_unresolvable_host_is_resolution_error() {
    let output = run(&["no-such-host.invalid", "80", "127.0.0.1", "81"]).await;
    assert_eq!(output.status.code(), Some(26));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resolution error"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_refused_connection_is_connection_error() {
    let port = closed_port().await.to_string();
    let output = run(&["127.0.0.1", &port, "127.0.0.1", &port]).await;
    assert_eq!(output.status.code(), Some(28));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connection error"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_ping_scenario_end_to_end() {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port_a = listener_a.local_addr().unwrap().port().to_string();
    let port_b = listener_b.local_addr().unwrap().port().to_string();

    let child = revpipe()
        .args(["127.0.0.1", &port_a, "127.0.0.1", &port_b, "--stats-json"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let (mut peer_a, _) = timeout(Duration::from_secs(10), listener_a.accept())
        .await
        .unwrap()
        .unwrap();
    let (mut peer_b, _) = timeout(Duration::from_secs(10), listener_b.accept())
        .await
        .unwrap()
        .unwrap();

    peer_a.write_all(b"PING").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(Duration::from_secs(5), peer_b.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"PING");

    drop(peer_a);

    let output = timeout(Duration::from_secs(5), child.wait_with_output())
        .await
        .expect("relay did not exit after peer closed")
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let mut rest = Vec::new();
    let n = timeout(Duration::from_secs(5), peer_b.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stats: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(stats["bytes_first_to_second"], 4);
    assert_eq!(stats["bytes_second_to_first"], 0);
    assert_eq!(stats["ended_on_error"], false);
}
